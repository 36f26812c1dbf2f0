//! Host-side compositing of the trail over the scene.
//!
//! The accumulator only carries a [`BlendMode`] tag. [`CompositePass`] is one
//! host that honours it: it samples the scene and the trail output and writes
//! `mix(scene, blend(scene, trail), opacity)` to a target of any format.
//! Separable modes work per channel; hue, saturation, color and luminosity use
//! the W3C non-separable formulas.

use glam::UVec2;
use wgpu::util::DeviceExt;

use crate::blend_mode::BlendMode;
use crate::error::TrailResult;
use crate::gpu::GpuContext;
use crate::trail::{sampler_entry, texture_entry, uniform_entry};

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeUniforms {
    resolution: [f32; 2],
    mode: u32,
    opacity: f32,
}

/// Merges a trail output with the underlying scene using a [`BlendMode`].
pub struct CompositePass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    opacity: f32,
}

impl CompositePass {
    /// Builds the pipeline for targets of `format`.
    pub fn new(gpu: &GpuContext, format: wgpu::TextureFormat) -> TrailResult<Self> {
        gpu.scoped(|device| {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Trail Composite Shader"),
                source: wgpu::ShaderSource::Wgsl(COMPOSITE_SHADER.into()),
            });

            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Trail Composite Sampler"),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });

            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Trail Composite Bind Group Layout"),
                    entries: &[
                        uniform_entry(0),
                        // Scene
                        texture_entry(1),
                        // Trail
                        texture_entry(2),
                        sampler_entry(3),
                    ],
                });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Trail Composite Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Trail Composite Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
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
            });

            Self {
                pipeline,
                bind_group_layout,
                sampler,
                opacity: 1.0,
            }
        })
    }

    /// Strength of the blended result over the plain scene, clamped to `[0, 1]`.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Composites `trail` over `scene` into `target`.
    ///
    /// `resolution` is the target size in pixels.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        resolution: UVec2,
        scene: &wgpu::TextureView,
        trail: &wgpu::TextureView,
        mode: BlendMode,
    ) {
        let uniforms = CompositeUniforms {
            resolution: resolution.as_vec2().to_array(),
            mode: mode.shader_index(),
            opacity: self.opacity,
        };
        let uniform_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Trail Composite Uniforms"),
                contents: bytemuck::cast_slice(&[uniforms]),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Trail Composite Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(scene),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(trail),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Trail Composite Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Composite shader. Mode indices match [`BlendMode::shader_index`].
const COMPOSITE_SHADER: &str = r#"
struct Uniforms {
    resolution: vec2f,
    mode: u32,
    opacity: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var scene_texture: texture_2d<f32>;
@group(0) @binding(2) var trail_texture: texture_2d<f32>;
@group(0) @binding(3) var tex_sampler: sampler;

const EPS: f32 = 1e-5;

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> @builtin(position) vec4f {
    let x = f32((vi << 1u) & 2u) * 2.0 - 1.0;
    let y = f32(vi & 2u) * 2.0 - 1.0;
    return vec4f(x, y, 0.0, 1.0);
}

fn lum(c: vec3f) -> f32 {
    return dot(c, vec3f(0.3, 0.59, 0.11));
}

fn clip_color(c_in: vec3f) -> vec3f {
    var c = c_in;
    let l = lum(c);
    let n = min(min(c.r, c.g), c.b);
    let x = max(max(c.r, c.g), c.b);
    if (n < 0.0) {
        c = l + (c - l) * l / max(l - n, EPS);
    }
    if (x > 1.0) {
        c = l + (c - l) * (1.0 - l) / max(x - l, EPS);
    }
    return c;
}

fn set_lum(c: vec3f, l: f32) -> vec3f {
    return clip_color(c + (l - lum(c)));
}

fn sat(c: vec3f) -> f32 {
    return max(max(c.r, c.g), c.b) - min(min(c.r, c.g), c.b);
}

fn set_sat(c: vec3f, s: f32) -> vec3f {
    let lo = min(min(c.r, c.g), c.b);
    let range = sat(c);
    if (range <= EPS) {
        return vec3f(0.0);
    }
    return (c - lo) * s / range;
}

fn color_burn(x: vec3f, y: vec3f) -> vec3f {
    let burned = max(vec3f(1.0) - (vec3f(1.0) - x) / max(y, vec3f(EPS)), vec3f(0.0));
    return select(burned, vec3f(0.0), y <= vec3f(0.0));
}

fn color_dodge(x: vec3f, y: vec3f) -> vec3f {
    let dodged = min(x / max(vec3f(1.0) - y, vec3f(EPS)), vec3f(1.0));
    return select(dodged, vec3f(1.0), y >= vec3f(1.0));
}

fn overlay(x: vec3f, y: vec3f) -> vec3f {
    let low = 2.0 * x * y;
    let high = vec3f(1.0) - 2.0 * (vec3f(1.0) - x) * (vec3f(1.0) - y);
    return select(high, low, x < vec3f(0.5));
}

fn blend(mode: u32, x: vec3f, y: vec3f, y_alpha: f32) -> vec3f {
    switch mode {
        case 0u: { return x; }                                          // skip
        case 1u: { return y; }                                          // set
        case 2u: { return x + y; }                                      // add
        case 3u: { return mix(x, y, y_alpha); }                         // alpha
        case 4u: { return (x + y) * 0.5; }                              // average
        case 5u: { return set_lum(y, lum(x)); }                         // color
        case 6u: { return color_burn(x, y); }                           // color-burn
        case 7u: { return color_dodge(x, y); }                          // color-dodge
        case 8u: { return min(x, y); }                                  // darken
        case 9u: { return abs(x - y); }                                 // difference
        case 10u: { return x / max(y, vec3f(EPS)); }                    // divide
        case 11u: { return x + y - 2.0 * x * y; }                       // exclusion
        case 12u: { return overlay(y, x); }                             // hard-light
        case 13u: { return step(vec3f(1.0), x + y); }                   // hard-mix
        case 14u: { return set_lum(set_sat(y, sat(x)), lum(x)); }       // hue
        case 15u: { return vec3f(1.0) - y; }                            // invert
        case 16u: { return y * (vec3f(1.0) - x); }                      // invert-rgb
        case 17u: { return max(x, y); }                                 // lighten
        case 18u: { return max(x + y - 1.0, vec3f(0.0)); }              // linear-burn
        case 19u: { return min(x + y, vec3f(1.0)); }                    // linear-dodge
        case 20u: { return clamp(2.0 * y + x - 1.0, vec3f(0.0), vec3f(1.0)); } // linear-light
        case 21u: { return set_lum(x, lum(y)); }                        // luminosity
        case 22u: { return x * y; }                                     // multiply
        case 23u: { return vec3f(1.0) - abs(vec3f(1.0) - x - y); }      // negation
        case 24u: { return y; }                                         // normal
        case 25u: { return overlay(x, y); }                             // overlay
        case 26u: {                                                     // pin-light
            return select(max(x, 2.0 * y - 1.0), min(x, 2.0 * y), y < vec3f(0.5));
        }
        case 27u: {                                                     // reflect
            let r = min(x * x / max(vec3f(1.0) - y, vec3f(EPS)), vec3f(1.0));
            return select(r, vec3f(1.0), y >= vec3f(1.0));
        }
        case 28u: { return set_lum(set_sat(x, sat(y)), lum(x)); }       // saturation
        case 29u: { return x + y - x * y; }                             // screen
        case 30u: {                                                     // soft-light
            return (vec3f(1.0) - 2.0 * y) * x * x + 2.0 * x * y;
        }
        case 31u: { return max(x - y, vec3f(0.0)); }                    // subtract
        case 32u: {                                                     // vivid-light
            return select(
                color_dodge(x, 2.0 * (y - 0.5)),
                color_burn(x, 2.0 * y),
                y < vec3f(0.5),
            );
        }
        default: { return x; }
    }
}

@fragment
fn fs(@builtin(position) pos: vec4f) -> @location(0) vec4f {
    let uv = pos.xy / u.resolution;
    let scene = textureSample(scene_texture, tex_sampler, uv);
    let trail = textureSample(trail_texture, tex_sampler, uv);

    let blended = blend(u.mode, scene.rgb, trail.rgb, trail.a);
    return vec4f(mix(scene.rgb, blended, u.opacity), 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_mode_has_a_shader_case() {
        for mode in BlendMode::iter() {
            let tag = format!("case {}u:", mode.shader_index());
            assert!(COMPOSITE_SHADER.contains(&tag), "missing {tag} for {mode}");
            assert!(
                COMPOSITE_SHADER.contains(&format!("// {}", mode.name())),
                "case {tag} is not labelled {mode}"
            );
        }
    }

    #[test]
    fn uniforms_are_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<CompositeUniforms>(), 16);
    }
}
