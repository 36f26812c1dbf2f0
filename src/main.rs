//! Interactive trail demo: an orbiting ball leaves light trails.
//!
//! Keys:
//! - `Space` toggles the effect
//! - `Up` / `Down` change the decay amount by 5
//! - `1`..`4` set the resolution scale to 1, 0.5, 0.25, 0.1
//! - `B` cycles the blend mode
//! - `R` clears the trail history
//!
//! Run with `RUST_LOG=info` to see parameter changes.

use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use log::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use trailfx::{
    AccumulationBuffer, CompositePass, GpuContext, MAX_DECAY_AMOUNT, StepContext,
    TrailAccumulator, TrailOptions, TrailResult, TrailUpdate,
};

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct OrbitUniforms {
    resolution: [f32; 2],
    time: f32,
    radius: f32,
    ball: [f32; 2],
    _pad: [f32; 2],
}

/// Renders the orbiting ball into an offscreen scene target.
struct OrbitScene {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl OrbitScene {
    fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Orbit Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/orbit.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Orbit Uniforms"),
            size: std::mem::size_of::<OrbitUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Orbit Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Orbit Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Orbit Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Orbit Pipeline"),
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
        });

        Self {
            pipeline,
            uniform_buffer,
            bind_group,
        }
    }

    fn render(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &AccumulationBuffer,
        time: f32,
    ) {
        let size = target.extent().as_vec2();
        let orbit = size.min_element() * 0.3;
        let ball = size * 0.5 + Vec2::from_angle(time * 1.7) * orbit;

        let uniforms = OrbitUniforms {
            resolution: size.to_array(),
            time,
            radius: orbit * 0.12,
            ball: ball.to_array(),
            _pad: [0.0; 2],
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Orbit Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
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
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Everything that needs a live GPU context.
struct Demo {
    gpu: GpuContext,
    scene: OrbitScene,
    scene_target: AccumulationBuffer,
    trail: TrailAccumulator,
    composite: CompositePass,
    /// Clear history at the start of the next frame.
    reset_pending: bool,
}

impl Demo {
    fn new(window: Arc<Window>) -> TrailResult<Self> {
        let gpu = GpuContext::new(window)?;
        let scene = OrbitScene::new(&gpu);
        let scene_target = AccumulationBuffer::new(&gpu, "Orbit Scene", gpu.viewport())?;
        let mut trail = TrailAccumulator::new(&gpu, TrailOptions::default())?;
        trail.initialize(&gpu, gpu.viewport())?;
        let composite = CompositePass::new(&gpu, gpu.config.format)?;

        Ok(Self {
            gpu,
            scene,
            scene_target,
            trail,
            composite,
            reset_pending: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) -> TrailResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.gpu.resize(width, height);
        self.scene_target.destroy();
        self.scene_target = AccumulationBuffer::new(&self.gpu, "Orbit Scene", self.gpu.viewport())?;
        self.trail.set_size(&self.gpu, width, height)
    }

    fn render(&mut self, time: f32, dt: f32) -> TrailResult<()> {
        let Demo {
            gpu,
            scene,
            scene_target,
            trail,
            composite,
            reset_pending,
        } = self;

        let Some(surface) = gpu.surface.as_ref() else {
            return Ok(());
        };
        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(e) => {
                warn!("skipping frame: {e}");
                return Ok(());
            }
        };
        let screen_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Demo Encoder"),
            });

        scene.render(gpu, &mut encoder, scene_target, time);

        let mode = trail.blend_mode();
        let trail_view = {
            let mut ctx = StepContext::new(gpu, &mut encoder);
            if std::mem::take(reset_pending) {
                trail.reset_buffers(&mut ctx)?;
            }
            trail.step(&mut ctx, &scene_target.view, dt)?
        };

        composite.render(
            gpu,
            &mut encoder,
            &screen_view,
            gpu.viewport(),
            &scene_target.view,
            trail_view,
            mode,
        );

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode) -> TrailResult<()> {
        let state = *self.trail.state();
        let update = match key {
            KeyCode::Space => TrailUpdate::new().enabled(!state.enabled()),
            KeyCode::ArrowUp => TrailUpdate::new()
                .decay_amount((state.decay_amount() + 5.0).min(MAX_DECAY_AMOUNT)),
            KeyCode::ArrowDown => {
                TrailUpdate::new().decay_amount((state.decay_amount() - 5.0).max(0.0))
            }
            KeyCode::Digit1 => TrailUpdate::new().resolution_scale(1.0),
            KeyCode::Digit2 => TrailUpdate::new().resolution_scale(0.5),
            KeyCode::Digit3 => TrailUpdate::new().resolution_scale(0.25),
            KeyCode::Digit4 => TrailUpdate::new().resolution_scale(0.1),
            KeyCode::KeyB => TrailUpdate::new().blend_mode(state.blend_mode().next()),
            KeyCode::KeyR => {
                info!("trail history cleared");
                self.reset_pending = true;
                return Ok(());
            }
            _ => return Ok(()),
        };

        self.trail.update_options(&self.gpu, &update)?;
        let state = self.trail.state();
        info!(
            "trail: enabled={} decay_amount={:.1} (decay {:.3}) scale={} blend={}",
            state.enabled(),
            state.decay_amount(),
            state.decay(),
            state.resolution_scale(),
            state.blend_mode()
        );
        Ok(())
    }
}

struct App {
    window: Option<Arc<Window>>,
    demo: Option<Demo>,
    start_time: Instant,
    last_frame: Instant,
}

impl Default for App {
    fn default() -> Self {
        Self {
            window: None,
            demo: None,
            start_time: Instant::now(),
            last_frame: Instant::now(),
        }
    }
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: trailfx::TrailError) {
        error!("{err}");
        self.demo = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes().with_title("trailfx");
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match Demo::new(window.clone()) {
            Ok(demo) => self.demo = Some(demo),
            Err(e) => return self.fail(event_loop, e),
        }
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let result = match event {
            WindowEvent::CloseRequested => {
                if let Some(demo) = &mut self.demo {
                    demo.trail.dispose();
                }
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => match &mut self.demo {
                Some(demo) => demo.resize(size.width, size.height),
                None => Ok(()),
            },
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match &mut self.demo {
                Some(demo) => demo.handle_key(key),
                None => Ok(()),
            },
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let time = now.duration_since(self.start_time).as_secs_f32();
                let dt = now.duration_since(self.last_frame).as_secs_f32();
                self.last_frame = now;

                let result = match &mut self.demo {
                    Some(demo) => demo.render(time, dt),
                    None => Ok(()),
                };
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
                result
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            self.fail(event_loop, e);
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!("failed to create event loop: {e}");
            return;
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::default();
    if let Err(e) = event_loop.run_app(&mut app) {
        error!("event loop terminated: {e}");
    }
}
