use bytemuck::{Pod, Zeroable};

/// Interleaved vertex layout shared by every mesh (32 bytes).
///
///  offset  0  position   [f32; 3]   loc 0
///  offset 12  normal     [f32; 3]   loc 1
///  offset 24  tex_coord  [f32; 2]   loc 2
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl Vertex {
    #[inline]
    pub const fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self { position, normal, tex_coord }
    }
}

/// RGBA8 image, rows tightly packed, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self { width, height, pixels }
    }

    /// Single-color image.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat(width as usize * height as usize);
        Self { width, height, pixels }
    }

    #[inline]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Indexed triangle list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u16>) -> Self {
        Self { vertices, indices }
    }

    /// Quad in the XY plane facing +Z, centered on the origin.
    pub fn quad(half_width: f32, half_height: f32) -> Self {
        let n = [0.0, 0.0, 1.0];
        let vertices = vec![
            Vertex::new([-half_width, -half_height, 0.0], n, [0.0, 1.0]),
            Vertex::new([half_width, -half_height, 0.0], n, [1.0, 1.0]),
            Vertex::new([half_width, half_height, 0.0], n, [1.0, 0.0]),
            Vertex::new([-half_width, half_height, 0.0], n, [0.0, 0.0]),
        ];
        Self { vertices, indices: vec![0, 1, 2, 0, 2, 3] }
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(std::mem::offset_of!(Vertex, tex_coord), 24);
    }

    #[test]
    fn solid_texture_has_one_texel_per_pixel() {
        let tex = TextureData::solid(3, 2, [1, 2, 3, 4]);
        assert_eq!(tex.pixels.len(), tex.expected_len());
        assert_eq!(&tex.pixels[20..24], &[1, 2, 3, 4]);
    }

    #[test]
    fn quad_is_two_counter_clockwise_triangles() {
        let quad = MeshData::quad(1.0, 0.5);
        assert_eq!(quad.triangle_count(), 2);
        let [a, b, c] = [0usize, 1, 2].map(|i| glam::Vec3::from(quad.vertices[quad.indices[i] as usize].position));
        assert!((b - a).cross(c - a).z > 0.0);
    }
}
