use std::fmt;

use crate::context::ResourceKind;

/// Pipeline stage a shader diagnostic refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStageKind {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStageKind::Vertex => f.write_str("vertex"),
            ShaderStageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors raised by the rendering core.
///
/// Compile, link and lookup failures happen while the renderer is being built
/// and are fatal to initialization (see [`RenderError::is_startup_fatal`]).
/// Everything else is scoped to one frame: the frame is abandoned and the next
/// one starts from a clean state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create {kind:?} '{label}': {reason}")]
    ResourceCreation {
        kind: ResourceKind,
        label: String,
        reason: String,
    },

    #[error("{kind:?} '{label}' is not bound to a live GPU object")]
    InvalidHandle { kind: ResourceKind, label: String },

    #[error("{stage} stage of program '{program}' failed to compile:\n{diagnostic}")]
    ShaderCompile {
        program: String,
        stage: ShaderStageKind,
        diagnostic: String,
    },

    #[error("program '{program}' failed to link: {reason}")]
    ShaderLink { program: String, reason: String },

    #[error("'{name}' is not an attribute or uniform of program '{program}'")]
    LocationNotFound { program: String, name: String },

    #[error("framebuffer '{label}' is incomplete: {reason}")]
    FramebufferIncomplete { label: String, reason: String },

    #[error("augmentation texture set is full ({capacity} slots)")]
    CapacityExceeded { capacity: usize },

    #[error("surface unavailable: {0}")]
    Surface(String),

    #[error("frame submission failed: {0}")]
    Submit(String),
}

impl RenderError {
    /// Returns `true` for errors that mean the shader sources and the
    /// rendering code disagree. Retrying next frame cannot fix these.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            RenderError::ShaderCompile { .. }
                | RenderError::ShaderLink { .. }
                | RenderError::LocationNotFound { .. }
        )
    }
}
