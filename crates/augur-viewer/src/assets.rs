use std::path::Path;

use anyhow::{Context, Result};

use augur_engine::RenderError;
use augur_engine::context::GraphicsContext;
use augur_engine::math::MarkerId;
use augur_engine::scene::{
    AR_OBJECT_SCALE, AUGMENTATION_TEXTURE_CAPACITY, DrawableObject, MeshData, Scene, TextureData,
};

/// Half extent of the augmentation quad, in marker units.
pub const AUGMENTATION_HALF_EXTENT: f32 = 1000.0;

const PALETTE: [[u8; 4]; AUGMENTATION_TEXTURE_CAPACITY] = [
    [230, 120, 40, 255],
    [60, 170, 90, 255],
    [70, 110, 220, 255],
    [200, 60, 160, 255],
];

/// Checkerboard of `cells` x `cells` squares alternating `a` and `b`.
pub fn checkerboard(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> TextureData {
    let cell = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
    for y in 0..size {
        for x in 0..size {
            let even = (x / cell + y / cell) % 2 == 0;
            pixels.extend_from_slice(if even { &a } else { &b });
        }
    }
    TextureData::new(size, size, pixels)
}

/// One procedural texture per slot.
pub fn procedural_textures() -> Vec<TextureData> {
    PALETTE
        .iter()
        .map(|&color| checkerboard(128, 8, color, [240, 240, 240, 255]))
        .collect()
}

/// Decodes a PNG or JPEG into RGBA8.
pub fn load_texture(path: &Path) -> Result<TextureData> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode texture {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    Ok(TextureData::new(width, height, image.into_raw()))
}

/// Synthetic camera image: a vertical gradient with a band scrolling down.
pub fn camera_frame(width: u32, height: u32, frame: u64) -> TextureData {
    let band = (frame % u64::from(height.max(1))) as u32;
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        let shade = (y * 160 / height.max(1)) as u8 + 40;
        let lit = y.abs_diff(band) < 4;
        for _ in 0..width {
            if lit {
                pixels.extend_from_slice(&[250, 250, 250, 255]);
            } else {
                pixels.extend_from_slice(&[shade / 2, shade / 2, shade, 255]);
            }
        }
    }
    TextureData::new(width, height, pixels)
}

/// Loads the augmentation quad and `textures`, then attaches one object to
/// each of `marker_count` markers. Returns the number of objects added.
pub fn populate_scene(
    scene: &mut Scene,
    ctx: &mut dyn GraphicsContext,
    textures: &[TextureData],
    marker_count: u32,
) -> Result<usize, RenderError> {
    let mesh = scene.load_mesh(
        ctx,
        "augmentation quad",
        &MeshData::quad(AUGMENTATION_HALF_EXTENT, AUGMENTATION_HALF_EXTENT),
    )?;

    let mut slots = Vec::with_capacity(textures.len());
    for (i, texture) in textures.iter().enumerate() {
        slots.push(scene.load_texture(ctx, &format!("augmentation texture {i}"), texture)?);
    }
    if slots.is_empty() {
        return Ok(0);
    }

    for marker in 0..marker_count {
        let slot = slots[marker as usize % slots.len()];
        scene.add_object(DrawableObject::new(MarkerId(marker), mesh, slot).with_scale(AR_OBJECT_SCALE))?;
    }
    log::info!(
        "scene populated: {} textures, {} objects",
        slots.len(),
        scene.objects().len()
    );
    Ok(scene.objects().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use augur_engine::context::HeadlessContext;
    use augur_engine::math::SurfaceSize;

    #[test]
    fn checkerboard_alternates_cells() {
        let tex = checkerboard(4, 2, [255, 0, 0, 255], [0, 0, 255, 255]);
        assert_eq!(tex.pixels.len(), tex.expected_len());
        // (0,0) and (2,0) sit in different cells.
        assert_eq!(&tex.pixels[0..4], &[255, 0, 0, 255]);
        assert_eq!(&tex.pixels[8..12], &[0, 0, 255, 255]);
    }

    #[test]
    fn camera_frame_has_expected_size() {
        let frame = camera_frame(32, 24, 5);
        assert_eq!(frame.pixels.len(), frame.expected_len());
    }

    #[test]
    fn populate_attaches_one_object_per_marker() {
        let mut ctx = HeadlessContext::new(SurfaceSize::new(64, 64));
        let mut scene = Scene::new();
        let textures = procedural_textures();

        let added = populate_scene(&mut scene, &mut ctx, &textures[..2], 4).unwrap();
        assert_eq!(added, 4);
        assert_eq!(scene.texture_count(), 2);
        assert_eq!(scene.visible_for(MarkerId(3)).count(), 1);
    }

    #[test]
    fn too_many_textures_is_rejected() {
        let mut ctx = HeadlessContext::new(SurfaceSize::new(64, 64));
        let mut scene = Scene::new();
        let mut textures = procedural_textures();
        textures.push(checkerboard(8, 2, [0, 0, 0, 255], [255; 4]));

        let err = populate_scene(&mut scene, &mut ctx, &textures, 1).unwrap_err();
        assert!(matches!(err, RenderError::CapacityExceeded { .. }));
    }

    #[test]
    fn missing_texture_file_is_reported_with_path() {
        let err = load_texture(Path::new("/nonexistent/marker.png")).unwrap_err();
        assert!(format!("{err:#}").contains("marker.png"));
    }
}
