use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::context::{RawHandle, TextureFormat};
use crate::math::SurfaceSize;
use crate::scene::Vertex;

use super::pipeline::GpuProgram;

pub(super) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub(super) fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Depth32Float => DEPTH_FORMAT,
    }
}

/// Texture plus its default view.
pub(super) struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub size: SurfaceSize,
}

impl GpuTexture {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        size: SurfaceSize,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view, format, size }
    }

    #[inline]
    pub fn is_depth(&self) -> bool {
        self.format.is_depth_stencil_format()
    }

    /// Replaces every texel. `pixels` must hold `width * height * 4` bytes.
    pub fn upload(&self, queue: &wgpu::Queue, pixels: &[u8]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.size.width * 4),
                rows_per_image: Some(self.size.height),
            },
            extent(self.size),
        );
    }
}

fn extent(size: SurfaceSize) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    }
}

pub(super) struct GpuMesh {
    pub vertices: wgpu::Buffer,
    pub indices: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, label: &str, vertices: &[Vertex], indices: &[u16]) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} vbo")),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // Index buffers must be a multiple of 4 bytes.
        let mut padded = indices.to_vec();
        if padded.len() % 2 != 0 {
            padded.push(0);
        }
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} ibo")),
            contents: bytemuck::cast_slice(&padded),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertices: vertex_buffer,
            indices: index_buffer,
            index_count: indices.len() as u32,
        }
    }
}

/// Every object a [`Gpu`](super::Gpu) can name.
pub(super) enum GpuObject {
    Texture(GpuTexture),
    /// The surface image; its view is acquired per frame.
    ColorTarget { size: SurfaceSize },
    DepthTarget(GpuTexture),
    Framebuffer { color: RawHandle, depth: RawHandle },
    Mesh(GpuMesh),
    Program(Box<GpuProgram>),
}

impl GpuObject {
    pub fn size(&self) -> Option<SurfaceSize> {
        match self {
            GpuObject::Texture(t) | GpuObject::DepthTarget(t) => Some(t.size),
            GpuObject::ColorTarget { size } => Some(*size),
            _ => None,
        }
    }

    /// Usable as the depth attachment of a framebuffer.
    pub fn is_depth_attachment(&self) -> bool {
        match self {
            GpuObject::DepthTarget(_) => true,
            GpuObject::Texture(t) => t.is_depth(),
            _ => false,
        }
    }

    /// Usable as the color attachment of a framebuffer.
    pub fn is_color_attachment(&self) -> bool {
        match self {
            GpuObject::ColorTarget { .. } => true,
            GpuObject::Texture(t) => !t.is_depth(),
            _ => false,
        }
    }
}

/// Name → object table. Names are never reused.
#[derive(Default)]
pub(super) struct ObjectTable {
    next: u32,
    objects: HashMap<RawHandle, GpuObject>,
}

impl ObjectTable {
    pub fn insert(&mut self, object: GpuObject) -> Result<RawHandle, String> {
        self.next = self.next.checked_add(1).ok_or("object names exhausted")?;
        let raw = RawHandle::new(self.next).ok_or("object names exhausted")?;
        self.objects.insert(raw, object);
        Ok(raw)
    }

    #[inline]
    pub fn get(&self, raw: RawHandle) -> Option<&GpuObject> {
        self.objects.get(&raw)
    }

    #[inline]
    pub fn remove(&mut self, raw: RawHandle) -> Option<GpuObject> {
        self.objects.remove(&raw)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn texture(&self, raw: RawHandle) -> Option<&GpuTexture> {
        match self.objects.get(&raw)? {
            GpuObject::Texture(t) => Some(t),
            _ => None,
        }
    }

    pub fn mesh(&self, raw: RawHandle) -> Option<&GpuMesh> {
        match self.objects.get(&raw)? {
            GpuObject::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn program(&self, raw: RawHandle) -> Option<&GpuProgram> {
        match self.objects.get(&raw)? {
            GpuObject::Program(p) => Some(p),
            _ => None,
        }
    }

    pub fn program_mut(&mut self, raw: RawHandle) -> Option<&mut GpuProgram> {
        match self.objects.get_mut(&raw)? {
            GpuObject::Program(p) => Some(p),
            _ => None,
        }
    }

    pub fn attachments(&self, framebuffer: RawHandle) -> Option<(RawHandle, RawHandle)> {
        match self.objects.get(&framebuffer)? {
            GpuObject::Framebuffer { color, depth } => Some((*color, *depth)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(w: u32, h: u32) -> GpuObject {
        GpuObject::ColorTarget { size: SurfaceSize::new(w, h) }
    }

    #[test]
    fn removed_names_are_not_handed_out_again() {
        let mut table = ObjectTable::default();
        let a = table.insert(color(4, 4)).unwrap();
        assert!(table.remove(a).is_some());
        let b = table.insert(color(4, 4)).unwrap();

        assert_ne!(a, b);
        assert!(table.get(a).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn typed_lookups_reject_other_kinds() {
        let mut table = ObjectTable::default();
        let c = table.insert(color(8, 2)).unwrap();
        let d = table.insert(color(8, 2)).unwrap();
        let fb = table.insert(GpuObject::Framebuffer { color: c, depth: d }).unwrap();

        assert_eq!(table.attachments(fb), Some((c, d)));
        assert_eq!(table.attachments(c), None);
        assert!(table.texture(c).is_none());
        assert!(table.program(fb).is_none());
        assert_eq!(table.get(c).and_then(GpuObject::size), Some(SurfaceSize::new(8, 2)));
        assert!(table.get(c).is_some_and(GpuObject::is_color_attachment));
        assert!(!table.get(fb).is_some_and(GpuObject::is_depth_attachment));
    }
}
