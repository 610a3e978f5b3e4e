use glam::{Mat4, Vec3};

use crate::context::{GraphicsContext, ResourceDescriptor, ResourceKind, TextureFormat};
use crate::math::MarkerId;
use crate::resource::ResourceHandle;
use crate::RenderError;

use super::assets::{MeshData, TextureData};
use super::AUGMENTATION_TEXTURE_CAPACITY;

/// Index into the augmentation texture set.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TextureSlot(pub u8);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct MeshId(usize);

/// Position of an object in draw order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ObjectId(usize);

/// One textured mesh attached to a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawableObject {
    pub marker: MarkerId,
    pub mesh: MeshId,
    pub texture: TextureSlot,
    /// Placement relative to the marker.
    pub local_transform: Mat4,
    pub visible: bool,
}

impl DrawableObject {
    pub fn new(marker: MarkerId, mesh: MeshId, texture: TextureSlot) -> Self {
        Self {
            marker,
            mesh,
            texture,
            local_transform: Mat4::IDENTITY,
            visible: true,
        }
    }

    #[inline]
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.local_transform = transform;
        self
    }

    /// Appends a uniform scale, applied before the current local transform.
    #[inline]
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.local_transform *= Mat4::from_scale(Vec3::splat(scale));
        self
    }

    #[inline]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Ordered collection of drawables plus the GPU assets they use.
#[derive(Debug)]
pub struct Scene {
    textures: [Option<ResourceHandle>; AUGMENTATION_TEXTURE_CAPACITY],
    meshes: Vec<ResourceHandle>,
    objects: Vec<DrawableObject>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            textures: Default::default(),
            meshes: Vec::new(),
            objects: Vec::new(),
        }
    }

    /// Uploads an augmentation texture into the first free slot.
    pub fn load_texture(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        label: &str,
        data: &TextureData,
    ) -> Result<TextureSlot, RenderError> {
        let index = self
            .textures
            .iter()
            .position(Option::is_none)
            .ok_or(RenderError::CapacityExceeded { capacity: AUGMENTATION_TEXTURE_CAPACITY })?;

        let handle = ResourceHandle::allocate(
            ctx,
            label,
            &ResourceDescriptor::Texture {
                width: data.width,
                height: data.height,
                format: TextureFormat::Rgba8Srgb,
                render_target: false,
                pixels: Some(&data.pixels),
            },
        )?;
        self.textures[index] = Some(handle);
        log::debug!("texture '{label}' loaded into slot {index} ({}x{})", data.width, data.height);
        Ok(TextureSlot(index as u8))
    }

    /// Releases a texture slot. Objects still referencing it fail to draw.
    pub fn unload_texture(&mut self, ctx: &mut dyn GraphicsContext, slot: TextureSlot) {
        if let Some(mut handle) = self.textures.get_mut(slot.0 as usize).and_then(Option::take) {
            handle.release(ctx);
        }
    }

    pub fn load_mesh(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        label: &str,
        data: &MeshData,
    ) -> Result<MeshId, RenderError> {
        let handle = ResourceHandle::allocate(
            ctx,
            label,
            &ResourceDescriptor::Mesh {
                vertices: &data.vertices,
                indices: &data.indices,
            },
        )?;
        self.meshes.push(handle);
        Ok(MeshId(self.meshes.len() - 1))
    }

    /// Appends an object at the end of the draw order.
    ///
    /// The mesh must exist and the texture slot must be loaded.
    pub fn add_object(&mut self, object: DrawableObject) -> Result<ObjectId, RenderError> {
        if self.mesh(object.mesh).is_none() {
            return Err(RenderError::InvalidHandle {
                kind: ResourceKind::Mesh,
                label: format!("mesh #{}", object.mesh.0),
            });
        }
        if self.texture(object.texture).is_none() {
            return Err(RenderError::InvalidHandle {
                kind: ResourceKind::Texture,
                label: format!("texture slot {}", object.texture.0),
            });
        }
        self.objects.push(object);
        Ok(ObjectId(self.objects.len() - 1))
    }

    /// Objects in draw order.
    #[inline]
    pub fn objects(&self) -> &[DrawableObject] {
        &self.objects
    }

    /// Visible objects attached to `marker`, in draw order.
    pub fn visible_for(&self, marker: MarkerId) -> impl Iterator<Item = &DrawableObject> {
        self.objects
            .iter()
            .filter(move |o| o.visible && o.marker == marker)
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&ResourceHandle> {
        self.textures.get(slot.0 as usize).and_then(Option::as_ref)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&ResourceHandle> {
        self.meshes.get(id.0)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.meshes.is_empty() && self.texture_count() == 0
    }

    /// Releases every asset and removes all objects.
    ///
    /// Handles from a lost context are dropped without calling into `ctx`.
    pub fn clear(&mut self, ctx: &mut dyn GraphicsContext) {
        for mut handle in self.textures.iter_mut().filter_map(Option::take) {
            handle.release(ctx);
        }
        for mut handle in self.meshes.drain(..) {
            handle.release(ctx);
        }
        self.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessContext;
    use crate::math::SurfaceSize;
    use crate::scene::AR_OBJECT_SCALE;

    fn ctx() -> HeadlessContext {
        HeadlessContext::new(SurfaceSize::new(16, 16))
    }

    fn populated(ctx: &mut HeadlessContext) -> (Scene, MeshId, TextureSlot) {
        let mut scene = Scene::new();
        let tex = scene.load_texture(ctx, "red", &TextureData::solid(2, 2, [255, 0, 0, 255])).unwrap();
        let mesh = scene.load_mesh(ctx, "quad", &MeshData::quad(1.0, 1.0)).unwrap();
        (scene, mesh, tex)
    }

    #[test]
    fn fifth_texture_exceeds_capacity() {
        let mut ctx = ctx();
        let mut scene = Scene::new();
        let data = TextureData::solid(1, 1, [0; 4]);
        for i in 0..AUGMENTATION_TEXTURE_CAPACITY {
            assert_eq!(scene.load_texture(&mut ctx, "t", &data).unwrap(), TextureSlot(i as u8));
        }
        let err = scene.load_texture(&mut ctx, "t", &data).unwrap_err();
        assert_eq!(err, RenderError::CapacityExceeded { capacity: 4 });
        assert_eq!(ctx.live_count(ResourceKind::Texture), 4);
        scene.clear(&mut ctx);
    }

    #[test]
    fn unloaded_slot_is_reused() {
        let mut ctx = ctx();
        let (mut scene, _, tex) = populated(&mut ctx);
        scene.unload_texture(&mut ctx, tex);
        let again = scene.load_texture(&mut ctx, "blue", &TextureData::solid(1, 1, [0, 0, 255, 255])).unwrap();
        assert_eq!(again, tex);
        scene.clear(&mut ctx);
    }

    #[test]
    fn object_with_missing_texture_is_rejected() {
        let mut ctx = ctx();
        let (mut scene, mesh, _) = populated(&mut ctx);
        let err = scene
            .add_object(DrawableObject::new(MarkerId(0), mesh, TextureSlot(3)))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidHandle { kind: ResourceKind::Texture, .. }));
        scene.clear(&mut ctx);
    }

    #[test]
    fn visible_for_keeps_insertion_order() {
        let mut ctx = ctx();
        let (mut scene, mesh, tex) = populated(&mut ctx);
        let a = scene.add_object(DrawableObject::new(MarkerId(1), mesh, tex)).unwrap();
        scene.add_object(DrawableObject::new(MarkerId(2), mesh, tex)).unwrap();
        scene.add_object(DrawableObject::new(MarkerId(1), mesh, tex).hidden()).unwrap();
        let d = scene
            .add_object(DrawableObject::new(MarkerId(1), mesh, tex).with_scale(AR_OBJECT_SCALE))
            .unwrap();

        let drawn: Vec<_> = scene.visible_for(MarkerId(1)).collect();
        assert_eq!(drawn.len(), 2);
        assert_eq!(drawn[0], &scene.objects()[a.0]);
        assert_eq!(drawn[1], &scene.objects()[d.0]);
        scene.clear(&mut ctx);
    }

    #[test]
    fn clear_releases_everything() {
        let mut ctx = ctx();
        let (mut scene, mesh, tex) = populated(&mut ctx);
        scene.add_object(DrawableObject::new(MarkerId(0), mesh, tex)).unwrap();
        scene.clear(&mut ctx);
        assert!(scene.is_empty());
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn clear_after_context_loss_does_not_touch_new_context() {
        let mut ctx = ctx();
        let (mut scene, _, _) = populated(&mut ctx);
        ctx.lose_context();
        scene.clear(&mut ctx);
        assert_eq!(ctx.destroyed_count(), 0);
        assert!(scene.is_empty());
    }
}
