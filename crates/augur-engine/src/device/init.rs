/// Initialization parameters for the GPU layer.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Prefer an sRGB surface format when available. Augmentation textures
    /// are sRGB encoded, so this keeps colors unchanged end to end.
    pub prefer_srgb: bool,

    /// FIFO presents at display rate, which the frame pacer then matches.
    pub present_mode: wgpu::PresentMode,

    /// Requested compositing mode; ignored when the surface does not offer it.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub power_preference: wgpu::PowerPreference,

    /// Required wgpu features. The renderer needs none.
    pub required_features: wgpu::Features,

    pub required_limits: wgpu::Limits,

    /// Frames the presentation engine may queue ahead.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}
