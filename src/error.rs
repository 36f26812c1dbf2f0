//! Error type shared by every trail operation.

use thiserror::Error;

/// Errors produced by the trail accumulator and its GPU context.
#[derive(Debug, Error)]
pub enum TrailError {
    /// An operation that needs sized buffers ran before `initialize`.
    #[error("trail effect used before initialize")]
    NotInitialized,
    /// The effect was disposed and can no longer be used.
    #[error("trail effect used after dispose")]
    Disposed,
    /// No GPU adapter matched the request.
    #[error("no suitable GPU adapter found")]
    AdapterUnavailable,
    /// The adapter refused to create a device.
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    /// The window surface could not be created.
    #[error("failed to create surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// The device ran out of memory while allocating trail resources.
    #[error("out of GPU memory: {0}")]
    OutOfMemory(String),
    /// wgpu rejected a resource or pipeline descriptor.
    #[error("GPU validation error: {0}")]
    Validation(String),
    /// Copying a buffer back to the CPU failed.
    #[error("GPU readback failed: {0}")]
    Readback(String),
}

impl From<wgpu::Error> for TrailError {
    fn from(err: wgpu::Error) -> Self {
        match err {
            wgpu::Error::OutOfMemory { .. } => TrailError::OutOfMemory(err.to_string()),
            other => TrailError::Validation(other.to_string()),
        }
    }
}

/// Convenience alias used across the crate.
pub type TrailResult<T> = Result<T, TrailError>;
