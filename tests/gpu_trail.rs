//! GPU accumulator checks, including pixel readback.
//!
//! Each test needs a GPU adapter and returns early when none is available.

use trailfx::{
    AccumulationBuffer, BlendMode, GpuContext, Lifecycle, PostEffect, Slot, StepContext,
    TrailAccumulator, TrailError, TrailOptions, TrailUpdate, UVec2,
};

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
const CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

fn gpu() -> Option<GpuContext> {
    match GpuContext::headless(800, 600) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            eprintln!("skipping GPU test: {e}");
            None
        }
    }
}

/// A sampled half-float texture filled with `color`.
fn solid_input(gpu: &GpuContext, extent: UVec2, color: [f32; 4]) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: extent.x,
        height: extent.y,
        depth_or_array_layers: 1,
    };
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Test Input"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: AccumulationBuffer::FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let texel: Vec<u8> = color
        .iter()
        .flat_map(|c| half::f16::from_f32(*c).to_le_bytes())
        .collect();
    let data = texel.repeat((extent.x * extent.y) as usize);
    gpu.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(extent.x * 8),
            rows_per_image: Some(extent.y),
        },
        size,
    );
    texture
}

fn view(texture: &wgpu::Texture) -> wgpu::TextureView {
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn encoder(gpu: &GpuContext) -> wgpu::CommandEncoder {
    gpu.device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None })
}

fn step_once(gpu: &GpuContext, trail: &mut TrailAccumulator, input: &wgpu::TextureView) {
    let mut encoder = encoder(gpu);
    {
        let mut ctx = StepContext::new(gpu, &mut encoder);
        trail.step(&mut ctx, input, 1.0 / 60.0).unwrap();
    }
    gpu.queue.submit(std::iter::once(encoder.finish()));
}

fn assert_all_near(pixels: &[[f32; 4]], expected: [f32; 4]) {
    for p in pixels {
        for (got, want) in p.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 2e-3, "pixel {p:?}, expected {expected:?}");
        }
    }
}

#[test]
fn initialize_sizes_buffers_from_scale() {
    let Some(gpu) = gpu() else { return };
    let mut trail = TrailAccumulator::new(&gpu, TrailOptions::default()).unwrap();
    assert_eq!(trail.lifecycle(), Lifecycle::Uninitialized);
    assert_eq!(trail.extent(), None);

    trail.initialize(&gpu, UVec2::new(800, 600)).unwrap();
    assert_eq!(trail.lifecycle(), Lifecycle::Initialized);
    assert_eq!(trail.extent(), Some(UVec2::new(400, 300)));
    for slot in [Slot::A, Slot::B] {
        let buffer = trail.buffer(slot).unwrap();
        assert_eq!(buffer.extent(), UVec2::new(400, 300));
        assert_eq!(buffer.format(), wgpu::TextureFormat::Rgba16Float);
        assert_all_near(&buffer.read_pixels(&gpu).unwrap(), CLEAR);
    }
}

#[test]
fn first_red_frame_blends_with_cleared_history() {
    let Some(gpu) = gpu() else { return };
    let input = solid_input(&gpu, UVec2::new(800, 600), RED);
    let mut trail = TrailAccumulator::new(&gpu, TrailOptions::default()).unwrap();
    trail.initialize(&gpu, UVec2::new(800, 600)).unwrap();

    step_once(&gpu, &mut trail, &view(&input));

    let pixels = trail.output().unwrap().read_pixels(&gpu).unwrap();
    assert_eq!(pixels.len(), 400 * 300);
    let r = 1.0 - (-0.95f32 * 0.2).exp();
    assert!((r - 0.173).abs() < 0.005);
    assert_all_near(&pixels, [r, 0.0, 0.0, 1.0]);
}

#[test]
fn step_swaps_roles_and_returns_written_buffer() {
    let Some(gpu) = gpu() else { return };
    let input = solid_input(&gpu, gpu.viewport(), RED);
    let mut trail = TrailAccumulator::new(&gpu, TrailOptions::default()).unwrap();
    trail.initialize(&gpu, gpu.viewport()).unwrap();

    for _ in 0..4 {
        let written = trail.write_slot().unwrap();
        step_once(&gpu, &mut trail, &view(&input));
        assert_eq!(trail.write_slot(), Some(written.other()));
        let output = trail.output().unwrap();
        assert!(std::ptr::eq(output, trail.buffer(written).unwrap()));
    }
    assert_eq!(trail.lifecycle(), Lifecycle::Active);
}

#[test]
fn decay_changes_apply_per_step_within_one_encoder() {
    let Some(gpu) = gpu() else { return };
    let extent = UVec2::new(16, 16);
    let input = view(&solid_input(&gpu, extent, RED));
    let options = TrailOptions::new().resolution_scale(1.0);
    let mut trail = TrailAccumulator::new(&gpu, options).unwrap();
    trail.initialize(&gpu, extent).unwrap();

    let first = trail.write_slot().unwrap();
    let mut encoder = encoder(&gpu);
    {
        let mut ctx = StepContext::new(&gpu, &mut encoder);
        trail.step(&mut ctx, &input, 0.0).unwrap();
    }
    trail.set_decay_amount(&gpu, 100_000.0).unwrap();
    {
        let mut ctx = StepContext::new(&gpu, &mut encoder);
        trail.step(&mut ctx, &input, 0.0).unwrap();
    }
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let r = 1.0 - (-0.95f32 * 0.2).exp();
    let first_pixels = trail.buffer(first).unwrap().read_pixels(&gpu).unwrap();
    assert_all_near(&first_pixels, [r, 0.0, 0.0, 1.0]);
    let second_pixels = trail.buffer(first.other()).unwrap().read_pixels(&gpu).unwrap();
    assert_all_near(&second_pixels, RED);
}

#[test]
fn zero_decay_amount_repeats_previous_frame() {
    let Some(gpu) = gpu() else { return };
    let extent = UVec2::new(8, 8);
    let red = view(&solid_input(&gpu, extent, RED));
    let green = view(&solid_input(&gpu, extent, GREEN));
    let options = TrailOptions::new().resolution_scale(1.0);
    let mut trail = TrailAccumulator::new(&gpu, options).unwrap();
    trail.initialize(&gpu, extent).unwrap();

    step_once(&gpu, &mut trail, &red);
    let previous = trail.output().unwrap().read_pixels(&gpu).unwrap();

    trail.set_decay_amount(&gpu, 0.0).unwrap();
    assert_eq!(trail.decay(), 1.0);
    step_once(&gpu, &mut trail, &green);
    let pixels = trail.output().unwrap().read_pixels(&gpu).unwrap();
    assert_all_near(&pixels, previous[0]);
    assert!(previous[0][0] > 0.1 && previous[0][1] == 0.0);
}

#[test]
fn bypass_returns_input_and_copies_it_to_history() {
    let Some(gpu) = gpu() else { return };
    let input = view(&solid_input(&gpu, gpu.viewport(), RED));
    let mut trail = TrailAccumulator::new(&gpu, TrailOptions::new().enabled(false)).unwrap();
    trail.initialize(&gpu, gpu.viewport()).unwrap();

    let written = trail.write_slot().unwrap();
    let mut encoder = encoder(&gpu);
    {
        let mut ctx = StepContext::new(&gpu, &mut encoder);
        let output = trail.step(&mut ctx, &input, 0.0).unwrap();
        assert!(std::ptr::eq(output, &input));
    }
    gpu.queue.submit(std::iter::once(encoder.finish()));

    assert_eq!(trail.write_slot(), Some(written.other()));
    let copied = trail.buffer(written).unwrap().read_pixels(&gpu).unwrap();
    assert_all_near(&copied, RED);
}

#[test]
fn resolution_scale_update_resizes() {
    let Some(gpu) = gpu() else { return };
    let mut trail = TrailAccumulator::new(&gpu, TrailOptions::default()).unwrap();
    trail.initialize(&gpu, UVec2::new(800, 600)).unwrap();

    trail
        .update_options(&gpu, &TrailUpdate::new().resolution_scale(0.25))
        .unwrap();
    assert_eq!(trail.extent(), Some(UVec2::new(200, 150)));
    let pixels = trail.output().unwrap().read_pixels(&gpu).unwrap();
    assert_eq!(pixels.len(), 200 * 150);
    assert_all_near(&pixels, CLEAR);

    trail.set_blend_mode(&gpu, BlendMode::Screen).unwrap();
    assert_eq!(trail.extent(), Some(UVec2::new(200, 150)));
    assert_eq!(PostEffect::blend_mode(&trail), BlendMode::Screen);
}

#[test]
fn set_size_keeps_roles_and_clears() {
    let Some(gpu) = gpu() else { return };
    let input = view(&solid_input(&gpu, gpu.viewport(), RED));
    let mut trail = TrailAccumulator::new(&gpu, TrailOptions::default()).unwrap();
    trail.initialize(&gpu, gpu.viewport()).unwrap();
    step_once(&gpu, &mut trail, &input);
    step_once(&gpu, &mut trail, &input);
    let slot = trail.write_slot();

    trail.set_size(&gpu, 1024, 768).unwrap();
    assert_eq!(trail.extent(), Some(UVec2::new(512, 384)));
    assert_eq!(trail.viewport(), Some(UVec2::new(1024, 768)));
    assert_eq!(trail.write_slot(), slot);
    for slot in [Slot::A, Slot::B] {
        let pixels = trail.buffer(slot).unwrap().read_pixels(&gpu).unwrap();
        assert_all_near(&pixels, CLEAR);
    }
}

#[test]
fn reset_recorded_after_step_clears_its_output() {
    let Some(gpu) = gpu() else { return };
    let input = view(&solid_input(&gpu, gpu.viewport(), RED));
    let mut trail = TrailAccumulator::new(&gpu, TrailOptions::default()).unwrap();
    trail.initialize(&gpu, gpu.viewport()).unwrap();
    step_once(&gpu, &mut trail, &input);

    let mut encoder = encoder(&gpu);
    {
        let mut ctx = StepContext::new(&gpu, &mut encoder);
        trail.step(&mut ctx, &input, 0.0).unwrap();
        trail.reset_buffers(&mut ctx).unwrap();
    }
    gpu.queue.submit(std::iter::once(encoder.finish()));

    assert_eq!(trail.extent(), Some(UVec2::new(400, 300)));
    for slot in [Slot::A, Slot::B] {
        let pixels = trail.buffer(slot).unwrap().read_pixels(&gpu).unwrap();
        assert_all_near(&pixels, CLEAR);
    }
}

#[test]
fn use_before_initialize_fails() {
    let Some(gpu) = gpu() else { return };
    let input = view(&solid_input(&gpu, gpu.viewport(), RED));
    let mut trail = TrailAccumulator::new(&gpu, TrailOptions::default()).unwrap();

    let mut encoder = encoder(&gpu);
    let mut ctx = StepContext::new(&gpu, &mut encoder);
    assert!(matches!(
        trail.step(&mut ctx, &input, 0.0),
        Err(TrailError::NotInitialized)
    ));
    assert!(matches!(
        trail.reset_buffers(&mut ctx),
        Err(TrailError::NotInitialized)
    ));
    assert!(matches!(
        trail.set_size(&gpu, 10, 10),
        Err(TrailError::NotInitialized)
    ));
}

#[test]
fn dispose_twice_is_a_no_op() {
    let Some(gpu) = gpu() else { return };
    let mut trail = TrailAccumulator::new(&gpu, TrailOptions::default()).unwrap();
    trail.initialize(&gpu, gpu.viewport()).unwrap();

    trail.dispose();
    trail.dispose();
    assert_eq!(trail.lifecycle(), Lifecycle::Disposed);
    assert!(trail.output().is_none());
    assert!(matches!(
        trail.initialize(&gpu, gpu.viewport()),
        Err(TrailError::Disposed)
    ));
}
