//! Full-screen pass that writes one trail frame.
//!
//! Two pipelines share a sampler. Each recorded pass gets its own uniform
//! buffer, so several steps recorded into one encoder each keep their decay.
//!
//! - *blend* samples the current frame and the history buffer and mixes them
//!   by the decay weight.
//! - *copy* samples only the current frame. It backs the disabled state,
//!   which must not read history at all.

use wgpu::util::DeviceExt;

use crate::error::TrailResult;
use crate::gpu::GpuContext;
use crate::trail::AccumulationBuffer;

/// Uniforms shared by both trail pipelines.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct TrailUniforms {
    /// Target buffer size in pixels.
    resolution: [f32; 2],
    /// Weight of the previous frame, `exp(-decay_amount * 0.2)`.
    decay: f32,
    _pad: f32,
}

/// GPU resources for rendering trail frames.
pub struct TrailBlendPass {
    blend_pipeline: wgpu::RenderPipeline,
    copy_pipeline: wgpu::RenderPipeline,
    /// Uniforms + current texture + history texture + sampler.
    blend_bind_group_layout: wgpu::BindGroupLayout,
    /// Uniforms + current texture + sampler.
    copy_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl TrailBlendPass {
    /// Compiles both pipelines for [`AccumulationBuffer::FORMAT`] targets.
    pub fn new(gpu: &GpuContext) -> TrailResult<Self> {
        gpu.scoped(|device| {
            let blend_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Trail Blend Shader"),
                source: wgpu::ShaderSource::Wgsl(BLEND_SHADER.into()),
            });

            let copy_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Trail Copy Shader"),
                source: wgpu::ShaderSource::Wgsl(COPY_SHADER.into()),
            });

            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Trail Sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });

            let blend_bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Trail Blend Bind Group Layout"),
                    entries: &[
                        uniform_entry(0),
                        texture_entry(1),
                        texture_entry(2),
                        sampler_entry(3),
                    ],
                });

            let copy_bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Trail Copy Bind Group Layout"),
                    entries: &[uniform_entry(0), texture_entry(1), sampler_entry(2)],
                });

            let blend_pipeline = fullscreen_pipeline(
                device,
                "Trail Blend Pipeline",
                &blend_shader,
                &blend_bind_group_layout,
            );
            let copy_pipeline = fullscreen_pipeline(
                device,
                "Trail Copy Pipeline",
                &copy_shader,
                &copy_bind_group_layout,
            );

            Self {
                blend_pipeline,
                copy_pipeline,
                blend_bind_group_layout,
                copy_bind_group_layout,
                sampler,
            }
        })
    }

    /// Writes `mix(current, previous, decay)` into `target`, alpha forced to 1.
    pub fn render_blend(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &AccumulationBuffer,
        current: &wgpu::TextureView,
        previous: &wgpu::TextureView,
        decay: f32,
    ) {
        let uniform_buffer = create_uniforms(gpu, target, decay);

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Trail Blend Bind Group"),
            layout: &self.blend_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(current),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(previous),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut pass = begin_target_pass(encoder, target, "Trail Blend Pass");
        pass.set_pipeline(&self.blend_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    /// Copies `current` into `target` unchanged. History is not bound.
    pub fn render_copy(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &AccumulationBuffer,
        current: &wgpu::TextureView,
    ) {
        let uniform_buffer = create_uniforms(gpu, target, 0.0);

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Trail Copy Bind Group"),
            layout: &self.copy_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(current),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut pass = begin_target_pass(encoder, target, "Trail Copy Pass");
        pass.set_pipeline(&self.copy_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

}

/// Uniform buffer for one recorded pass, filled at creation.
fn create_uniforms(gpu: &GpuContext, target: &AccumulationBuffer, decay: f32) -> wgpu::Buffer {
    let uniforms = TrailUniforms {
        resolution: [target.width() as f32, target.height() as f32],
        decay,
        _pad: 0.0,
    };
    gpu.device
        .create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Trail Uniforms"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM,
        })
}

fn begin_target_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    target: &AccumulationBuffer,
    label: &str,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &target.view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(AccumulationBuffer::CLEAR_COLOR),
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs"),
            targets: &[Some(wgpu::ColorTargetState {
                format: AccumulationBuffer::FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

pub(crate) fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub(crate) fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Trail blend shader - decays history toward the current frame.
const BLEND_SHADER: &str = r#"
struct Uniforms {
    resolution: vec2f,
    decay: f32,
    _pad: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var current_texture: texture_2d<f32>;
@group(0) @binding(2) var previous_texture: texture_2d<f32>;
@group(0) @binding(3) var tex_sampler: sampler;

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4f {
    // One oversized triangle covering clip space
    let x = f32((vi << 1u) & 2u) * 2.0 - 1.0;
    let y = f32(vi & 2u) * 2.0 - 1.0;
    return vec4f(x, y, 0.0, 1.0);
}

@fragment
fn fs(@builtin(position) pos: vec4f) -> @location(0) vec4f {
    let uv = pos.xy / u.resolution;
    let current = textureSample(current_texture, tex_sampler, uv);
    let previous = textureSample(previous_texture, tex_sampler, uv);

    // decay = 1: all history, decay = 0: all current frame
    return vec4f(mix(current.rgb, previous.rgb, u.decay), 1.0);
}
"#;

/// Trail copy shader - passes the current frame through.
const COPY_SHADER: &str = r#"
struct Uniforms {
    resolution: vec2f,
    decay: f32, // Not used, keeps the layout shared
    _pad: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var current_texture: texture_2d<f32>;
@group(0) @binding(2) var tex_sampler: sampler;

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4f {
    let x = f32((vi << 1u) & 2u) * 2.0 - 1.0;
    let y = f32(vi & 2u) * 2.0 - 1.0;
    return vec4f(x, y, 0.0, 1.0);
}

@fragment
fn fs(@builtin(position) pos: vec4f) -> @location(0) vec4f {
    let uv = pos.xy / u.resolution;
    return textureSample(current_texture, tex_sampler, uv);
}
"#;
