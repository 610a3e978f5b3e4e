use std::num::NonZeroU32;

use glam::{Mat4, Vec4};

use crate::math::{SurfaceSize, Viewport};
use crate::scene::Vertex;
use crate::shader::LinkedProgram;

/// Non-zero object name issued by a context.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RawHandle(NonZeroU32);

impl RawHandle {
    #[inline]
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// Kind of GPU object a handle refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    /// Sampled 2D texture (augmentation images, offscreen color/depth).
    Texture,
    /// Presentable color target of the default framebuffer.
    ColorTarget,
    /// Depth target of the default framebuffer.
    DepthTarget,
    /// Color + depth attachment set.
    Framebuffer,
    /// Interleaved vertex buffer plus u16 index buffer.
    Mesh,
    /// Linked shader program.
    Program,
}

/// Texel formats the core asks for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, sRGB encoded. Four bytes per texel.
    Rgba8Srgb,
    /// 32-bit float depth. Not uploadable.
    Depth32Float,
}

impl TextureFormat {
    #[inline]
    pub fn bytes_per_texel(self) -> u32 {
        4
    }

    #[inline]
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

/// Creation parameters for one GPU object.
#[derive(Debug, Clone, Copy)]
pub enum ResourceDescriptor<'a> {
    Texture {
        width: u32,
        height: u32,
        format: TextureFormat,
        /// Usable as a framebuffer attachment as well as sampled.
        render_target: bool,
        /// Initial texels, tightly packed rows.
        pixels: Option<&'a [u8]>,
    },
    ColorTarget {
        width: u32,
        height: u32,
    },
    DepthTarget {
        width: u32,
        height: u32,
    },
    Framebuffer {
        color: RawHandle,
        depth: RawHandle,
    },
    Mesh {
        vertices: &'a [Vertex],
        indices: &'a [u16],
    },
    Program(&'a LinkedProgram),
}

impl ResourceDescriptor<'_> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceDescriptor::Texture { .. } => ResourceKind::Texture,
            ResourceDescriptor::ColorTarget { .. } => ResourceKind::ColorTarget,
            ResourceDescriptor::DepthTarget { .. } => ResourceKind::DepthTarget,
            ResourceDescriptor::Framebuffer { .. } => ResourceKind::Framebuffer,
            ResourceDescriptor::Mesh { .. } => ResourceKind::Mesh,
            ResourceDescriptor::Program(_) => ResourceKind::Program,
        }
    }

    /// Checks that do not depend on the backend. Contexts run this before
    /// touching the device.
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            ResourceDescriptor::Texture { width, height, format, render_target, pixels } => {
                if width == 0 || height == 0 {
                    return Err(format!("zero-sized texture {width}x{height}"));
                }
                if let Some(pixels) = pixels {
                    if format.is_depth() {
                        return Err("depth textures cannot be uploaded".into());
                    }
                    let expected = width as usize * height as usize * format.bytes_per_texel() as usize;
                    if pixels.len() != expected {
                        return Err(format!(
                            "texel payload is {} bytes, expected {expected}",
                            pixels.len()
                        ));
                    }
                }
                if format.is_depth() && !render_target {
                    return Err("depth textures must be render targets".into());
                }
                Ok(())
            }
            ResourceDescriptor::ColorTarget { width, height }
            | ResourceDescriptor::DepthTarget { width, height } => {
                if width == 0 || height == 0 {
                    Err(format!("zero-sized render target {width}x{height}"))
                } else {
                    Ok(())
                }
            }
            ResourceDescriptor::Framebuffer { color, depth } => {
                if color == depth {
                    Err("color and depth attachments must differ".into())
                } else {
                    Ok(())
                }
            }
            ResourceDescriptor::Mesh { vertices, indices } => {
                if vertices.is_empty() || indices.is_empty() {
                    return Err("mesh has no geometry".into());
                }
                if indices.len() % 3 != 0 {
                    return Err(format!("index count {} is not a triangle list", indices.len()));
                }
                match indices.iter().find(|&&i| i as usize >= vertices.len()) {
                    Some(i) => Err(format!("index {i} out of range for {} vertices", vertices.len())),
                    None => Ok(()),
                }
            }
            ResourceDescriptor::Program(_) => Ok(()),
        }
    }
}

/// Attribute location or uniform binding slot in a linked program.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Location(pub u32);

/// Value written to a uniform slot.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec4(Vec4),
}

impl UniformValue {
    /// Raw bytes as laid out in a WGSL uniform buffer.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            UniformValue::Mat4(m) => bytemuck::bytes_of(m),
            UniformValue::Vec4(v) => bytemuck::bytes_of(v),
        }
    }
}

/// GPU context contract used by the rendering core.
///
/// The model is deliberately close to a classic bind-then-draw API: objects
/// are named by [`RawHandle`]s, `bind` makes one current, `draw` snapshots
/// the current program/mesh/framebuffer/texture/uniform state. A frame is
/// bracketed by `begin_frame` and either `present` or `abandon_frame`.
///
/// Contexts are single-threaded; every call must come from the thread that
/// owns the context.
pub trait GraphicsContext {
    /// Bumped every time the underlying device is (re)created. Objects named
    /// under an older generation no longer exist.
    fn generation(&self) -> u64;

    /// Current drawable size in physical pixels.
    fn surface_size(&self) -> SurfaceSize;

    fn create(&mut self, label: &str, descriptor: &ResourceDescriptor<'_>) -> Result<RawHandle, String>;

    /// Frees an object. Unknown names are ignored.
    fn destroy(&mut self, kind: ResourceKind, raw: RawHandle);

    /// Replaces the texels of an existing color texture.
    fn write_texture(&mut self, raw: RawHandle, pixels: &[u8]) -> Result<(), String>;

    /// Makes `raw` current for its kind. Textures bind to the slot chosen with
    /// [`GraphicsContext::select_texture_slot`].
    fn bind(&mut self, kind: ResourceKind, raw: RawHandle);

    fn framebuffer_status(&self, framebuffer: RawHandle) -> Result<(), String>;

    /// Starts recording a frame (acquires the presentable image).
    fn begin_frame(&mut self) -> Result<(), String>;

    fn set_viewport(&mut self, viewport: Viewport);

    fn clear(&mut self, color: [f32; 4], depth: f32);

    fn select_texture_slot(&mut self, slot: Location);

    fn set_uniform(&mut self, location: Location, value: UniformValue);

    /// Draws the bound mesh with the bound program into the bound framebuffer.
    fn draw(&mut self);

    /// Submits the recorded frame and presents the default color target.
    fn present(&mut self) -> Result<(), String>;

    /// Drops everything recorded since `begin_frame` without presenting.
    fn abandon_frame(&mut self);

    /// Number of live objects, for leak diagnostics.
    fn live_objects(&self) -> usize;
}
