//! Shader program management.
//!
//! WGSL stages are parsed and validated with naga on the CPU, their interfaces
//! are reflected and linked, and only then is a GPU program allocated through
//! the context. Attribute and uniform names are resolved once at startup with
//! [`ProgramManager::locate`].

mod manager;
mod program;
mod reflect;
pub mod sources;

pub use manager::{ProgramId, ProgramManager};
pub use program::{
    AttributeSlot, LinkedProgram, ProgramInterface, ProgramSource, UniformKind, UniformSlot,
    VertexSemantic,
};
pub use reflect::link_program;
