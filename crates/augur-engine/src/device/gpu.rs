use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::context::{
    GraphicsContext, Location, RawHandle, ResourceDescriptor, ResourceKind, UniformValue,
};
use crate::math::{SurfaceSize, Viewport};

use super::frame::{self, BoundState, FrameRecording};
use super::objects::{wgpu_format, GpuMesh, GpuObject, GpuTexture, ObjectTable, DEPTH_FORMAT};
use super::pipeline::GpuProgram;
use super::{surface, GpuInit, SurfaceErrorAction};

/// Every `Gpu` gets its own generation, so objects named by a previous
/// device are recognizably stale.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// wgpu device bound to a window surface; the production
/// [`GraphicsContext`].
///
/// This type:
/// - creates and stores Instance/Adapter/Device/Queue
/// - creates and configures the Surface (swapchain)
/// - owns every object created through the context, by name
/// - records binds and draws between `begin_frame` and `present`, then
///   encodes them into render passes and submits once per frame
pub struct Gpu<'w> {
    /// Surface bound to the window.
    ///
    /// Surface lifetime is tied to the window; the runtime keeps the window
    /// alive for as long as the `Gpu`.
    surface: wgpu::Surface<'w>,

    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,

    /// Active surface configuration.
    config: wgpu::SurfaceConfiguration,

    /// Current drawable size in physical pixels.
    size: PhysicalSize<u32>,

    generation: u64,
    lost: Arc<AtomicBool>,

    objects: ObjectTable,
    sampler: wgpu::Sampler,
    bound: BoundState,
    recording: Option<FrameRecording>,
    last_surface_action: Option<SurfaceErrorAction>,
}

impl<'w> Gpu<'w> {
    /// Creates a GPU context bound to a window.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu.
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self> {
        let size = window.inner_size();
        anyhow::ensure!(size.width > 0 && size.height > 0, "window has zero size");

        let GpuInit {
            prefer_srgb,
            present_mode,
            alpha_mode,
            power_preference,
            required_features,
            required_limits,
            desired_maximum_frame_latency,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("augur device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("GPU device lost ({reason:?}): {message}");
            lost_flag.store(true, Ordering::Release);
        });

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface::choose_surface_format(&surface_caps, prefer_srgb)
            .context("no supported surface formats")?;

        let alpha_mode = surface::choose_alpha_mode(&surface_caps, alpha_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency,
        };

        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("augur linear clamp sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let info = adapter.get_info();
        log::info!(
            "GPU context generation {generation}: {} ({:?}), surface {format:?} {}x{}",
            info.name,
            info.backend,
            size.width,
            size.height
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            generation,
            lost,
            objects: ObjectTable::default(),
            sampler,
            bound: BoundState::default(),
            recording: None,
            last_surface_action: None,
        })
    }

    /// Returns the active surface format.
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Returns the current drawable size (physical pixels).
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// True once the driver reported the device lost. The runtime replaces
    /// the `Gpu`, which starts a new generation.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Reconfigures the surface after a resize.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        surface::apply_resize(
            &self.surface,
            &self.device,
            &mut self.config,
            &mut self.size,
            new_size,
        );
    }

    /// Action chosen for the last surface acquisition failure, if any.
    /// Cleared by the call.
    pub fn take_surface_action(&mut self) -> Option<SurfaceErrorAction> {
        self.last_surface_action.take()
    }

    /// Converts a `SurfaceError` into a higher-level action.
    fn handle_surface_error(&mut self, err: &wgpu::SurfaceError) -> SurfaceErrorAction {
        surface::map_surface_error(&self.surface, &self.device, &self.config, self.size, err)
    }

    fn check_texture_size(&self, width: u32, height: u32) -> Result<(), String> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(format!("{width}x{height} exceeds the device limit of {max}"));
        }
        Ok(())
    }

    fn create_object(&self, label: &str, descriptor: &ResourceDescriptor<'_>) -> Result<GpuObject, String> {
        let object = match *descriptor {
            ResourceDescriptor::Texture { width, height, format, render_target, pixels } => {
                self.check_texture_size(width, height)?;
                let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
                if render_target {
                    usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
                }
                if format.is_depth() {
                    usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
                }
                let texture = GpuTexture::new(
                    &self.device,
                    label,
                    SurfaceSize::new(width, height),
                    wgpu_format(format),
                    usage,
                );
                if let Some(pixels) = pixels {
                    texture.upload(&self.queue, pixels);
                }
                GpuObject::Texture(texture)
            }
            ResourceDescriptor::ColorTarget { width, height } => {
                if (width, height) != (self.config.width, self.config.height) {
                    return Err(format!(
                        "color target {width}x{height} does not match the surface ({}x{})",
                        self.config.width, self.config.height
                    ));
                }
                GpuObject::ColorTarget { size: SurfaceSize::new(width, height) }
            }
            ResourceDescriptor::DepthTarget { width, height } => {
                self.check_texture_size(width, height)?;
                GpuObject::DepthTarget(GpuTexture::new(
                    &self.device,
                    label,
                    SurfaceSize::new(width, height),
                    DEPTH_FORMAT,
                    wgpu::TextureUsages::RENDER_ATTACHMENT,
                ))
            }
            ResourceDescriptor::Framebuffer { color, depth } => {
                let color_ok = self.objects.get(color).is_some_and(GpuObject::is_color_attachment);
                let depth_ok = self.objects.get(depth).is_some_and(GpuObject::is_depth_attachment);
                if !color_ok || !depth_ok {
                    return Err("framebuffer attachments must be a live color and depth target".into());
                }
                GpuObject::Framebuffer { color, depth }
            }
            ResourceDescriptor::Mesh { vertices, indices } => {
                GpuObject::Mesh(GpuMesh::new(&self.device, label, vertices, indices))
            }
            ResourceDescriptor::Program(linked) => GpuObject::Program(Box::new(GpuProgram::new(&self.device, linked))),
        };
        Ok(object)
    }
}

impl GraphicsContext for Gpu<'_> {
    fn generation(&self) -> u64 {
        self.generation
    }

    fn surface_size(&self) -> SurfaceSize {
        SurfaceSize::new(self.size.width, self.size.height)
    }

    fn create(&mut self, label: &str, descriptor: &ResourceDescriptor<'_>) -> Result<RawHandle, String> {
        if self.is_lost() {
            return Err("device lost".into());
        }
        descriptor.validate()?;
        let object = self.create_object(label, descriptor)?;
        self.objects.insert(object)
    }

    fn destroy(&mut self, _kind: ResourceKind, raw: RawHandle) {
        match self.objects.remove(raw) {
            Some(GpuObject::Texture(t) | GpuObject::DepthTarget(t)) => t.texture.destroy(),
            Some(GpuObject::Mesh(m)) => {
                m.vertices.destroy();
                m.indices.destroy();
            }
            Some(_) | None => {}
        }
    }

    fn write_texture(&mut self, raw: RawHandle, pixels: &[u8]) -> Result<(), String> {
        let texture = self.objects.texture(raw).ok_or("unknown texture")?;
        if texture.is_depth() {
            return Err("depth textures cannot be uploaded".into());
        }
        let expected = texture.size.width as usize * texture.size.height as usize * 4;
        if pixels.len() != expected {
            return Err(format!("texel payload is {} bytes, expected {expected}", pixels.len()));
        }
        texture.upload(&self.queue, pixels);
        Ok(())
    }

    fn bind(&mut self, kind: ResourceKind, raw: RawHandle) {
        match kind {
            ResourceKind::Framebuffer => self.bound.framebuffer = Some(raw),
            ResourceKind::Program => {
                self.bound.program = Some(raw);
                self.bound.uniforms.clear();
                self.bound.textures.clear();
            }
            ResourceKind::Mesh => self.bound.mesh = Some(raw),
            ResourceKind::Texture => {
                let slot = self.bound.texture_slot.unwrap_or(Location(0));
                self.bound.textures.insert(slot, raw);
            }
            ResourceKind::ColorTarget | ResourceKind::DepthTarget => {}
        }
    }

    fn framebuffer_status(&self, framebuffer: RawHandle) -> Result<(), String> {
        let (color, depth) = self.objects.attachments(framebuffer).ok_or("unknown framebuffer")?;
        let color = self.objects.get(color).ok_or("color attachment was destroyed")?;
        let depth = self.objects.get(depth).ok_or("depth attachment was destroyed")?;
        if !color.is_color_attachment() || !depth.is_depth_attachment() {
            return Err("attachment formats are swapped".into());
        }
        if color.size() != depth.size() {
            return Err(format!("attachment sizes differ: {:?} vs {:?}", color.size(), depth.size()));
        }
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<(), String> {
        // Drop an unfinished recording first: it holds the surface image.
        self.recording = None;
        self.bound = BoundState::default();

        match self.surface.get_current_texture() {
            Ok(surface_texture) => {
                self.recording = Some(FrameRecording::new(surface_texture));
                Ok(())
            }
            Err(err) => {
                let action = self.handle_surface_error(&err);
                self.last_surface_action = Some(action);
                Err(format!("{err} ({action:?})"))
            }
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.bound.viewport = Some(viewport);
    }

    fn clear(&mut self, color: [f32; 4], depth: f32) {
        if let Some(recording) = self.recording.as_mut() {
            recording.clear(&self.bound, color, depth);
        }
    }

    fn select_texture_slot(&mut self, slot: Location) {
        self.bound.texture_slot = Some(slot);
    }

    fn set_uniform(&mut self, location: Location, value: UniformValue) {
        self.bound.uniforms.insert(location, value);
    }

    fn draw(&mut self) {
        if let Some(recording) = self.recording.as_mut() {
            recording.draw(&self.bound);
        }
    }

    fn present(&mut self) -> Result<(), String> {
        let recording = self.recording.take().ok_or("present without begin_frame")?;
        frame::submit(
            &self.device,
            &self.queue,
            &mut self.objects,
            &self.sampler,
            self.config.format,
            recording,
        )
    }

    fn abandon_frame(&mut self) {
        // Dropping the surface texture without presenting discards it.
        self.recording = None;
    }

    fn live_objects(&self) -> usize {
        self.objects.len()
    }
}

impl Drop for Gpu<'_> {
    fn drop(&mut self) {
        let live = self.objects.len();
        if live > 0 {
            log::warn!("GPU context generation {} dropped with {live} live objects", self.generation);
        }
    }
}
