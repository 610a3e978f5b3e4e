//! Drawable objects and the augmentation assets they reference.
//!
//! Asset payloads ([`TextureData`], [`MeshData`]) come from the host and are
//! uploaded into GPU handles owned by the [`Scene`]. Objects are kept in
//! insertion order, which is also their draw order.

mod assets;
mod object;

pub use assets::{MeshData, TextureData, Vertex};
pub use object::{DrawableObject, MeshId, ObjectId, Scene, TextureSlot};

/// Maximum number of augmentation textures loaded at once.
pub const AUGMENTATION_TEXTURE_CAPACITY: usize = 4;

/// Uniform scale applied to augmentation meshes authored in tracker units.
pub const AR_OBJECT_SCALE: f32 = 0.025;
