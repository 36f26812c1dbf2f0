//! Core GPU context and device management.
//!
//! [`GpuContext`] holds the wgpu device, queue and (for windowed hosts) the
//! presentation surface. Every trail pass borrows it.
//!
//! # Windowed and headless
//!
//! - [`GpuContext::new`] configures a surface for a winit window, as the demo
//!   binary does.
//! - [`GpuContext::headless`] skips the surface and only records a nominal
//!   viewport size. Hosts that render into their own textures and the
//!   integration tests use this.
//!
//! # Example
//!
//! ```no_run
//! use trailfx::GpuContext;
//!
//! let gpu = GpuContext::headless(800, 600)?;
//! assert_eq!(gpu.viewport().x, 800);
//! # Ok::<(), trailfx::TrailError>(())
//! ```

use std::sync::Arc;

use glam::UVec2;
use log::info;
use winit::window::Window;

use crate::error::{TrailError, TrailResult};

/// Core GPU context holding wgpu resources.
///
/// All fields are public so hosts can reach the raw wgpu API.
pub struct GpuContext {
    /// The window surface, if this context presents to one.
    pub surface: Option<wgpu::Surface<'static>>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Surface configuration. For headless contexts only `format`, `width`
    /// and `height` are meaningful.
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Create a new GPU context from a winit window.
    ///
    /// Picks an sRGB surface format and Fifo presentation.
    pub fn new(window: Arc<Window>) -> TrailResult<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|_| TrailError::AdapterUnavailable)?;

        let (device, queue) = request_device(&adapter)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(TrailError::AdapterUnavailable)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            "GPU context ready: {}x{} {:?}",
            config.width, config.height, config.format
        );

        Ok(Self {
            surface: Some(surface),
            device,
            queue,
            config,
        })
    }

    /// Create a GPU context without a window.
    ///
    /// `width` and `height` become the nominal viewport size reported by
    /// [`viewport`](Self::viewport).
    pub fn headless(width: u32, height: u32) -> TrailResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|_| TrailError::AdapterUnavailable)?;

        let (device, queue) = request_device(&adapter)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        info!("headless GPU context ready: {}x{}", config.width, config.height);

        Ok(Self {
            surface: None,
            device,
            queue,
            config,
        })
    }

    /// Resize the surface to new dimensions.
    ///
    /// Ignores zero-sized dimensions, which occur while a window is minimized.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            if let Some(surface) = &self.surface {
                surface.configure(&self.device, &self.config);
            }
        }
    }

    /// Returns the current surface width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Returns the current surface height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Current surface size.
    pub fn viewport(&self) -> UVec2 {
        UVec2::new(self.config.width, self.config.height)
    }

    /// Returns the current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    /// Runs `f` inside out-of-memory and validation error scopes.
    ///
    /// Allocation failures surface as [`TrailError::OutOfMemory`] instead of
    /// reaching the device's uncaptured-error handler.
    pub fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> TrailResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        match out_of_memory.or(validation) {
            Some(err) => Err(err.into()),
            None => Ok(value),
        }
    }
}

fn request_device(adapter: &wgpu::Adapter) -> TrailResult<(wgpu::Device, wgpu::Queue)> {
    let pair = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("Trail Device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: Default::default(),
        trace: Default::default(),
        experimental_features: Default::default(),
    }))?;
    Ok(pair)
}
