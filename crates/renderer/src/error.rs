#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("layer {0:?} is already registered")]
    DuplicateLayer(String),
    #[error("surface needs to be reconfigured")]
    SurfaceLost,
    #[error("timed out acquiring the next frame")]
    Timeout,
    #[error("gpu out of memory")]
    OutOfMemory,
    #[error("no suitable gpu adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("gpu device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface creation failed: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("surface is not supported by the adapter")]
    UnsupportedSurface,
}

impl From<wgpu::SurfaceError> for RenderError {
    fn from(error: wgpu::SurfaceError) -> Self {
        match error {
            wgpu::SurfaceError::Timeout => RenderError::Timeout,
            wgpu::SurfaceError::OutOfMemory => RenderError::OutOfMemory,
            wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost => RenderError::SurfaceLost,
            _ => RenderError::SurfaceLost,
        }
    }
}
