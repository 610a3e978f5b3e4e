use crate::context::Location;
use crate::scene::Vertex;

/// WGSL sources and fixed pipeline state of one program.
///
/// Each stage is its own module; entry points are `vs_main` and `fs_main`.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSource<'a> {
    pub label: &'a str,
    pub vertex: &'a str,
    pub fragment: &'a str,
    /// Depth-tested and depth-writing. Full-screen passes turn this off.
    pub depth_test: bool,
    pub alpha_blend: bool,
}

/// Meaning of a vertex attribute, derived from its name.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum VertexSemantic {
    Position,
    Normal,
    TexCoord,
}

impl VertexSemantic {
    pub fn from_attribute_name(name: &str) -> Option<Self> {
        match name {
            super::sources::VERTEX_POSITION => Some(VertexSemantic::Position),
            super::sources::VERTEX_NORMAL => Some(VertexSemantic::Normal),
            super::sources::VERTEX_TEX_COORD => Some(VertexSemantic::TexCoord),
            _ => None,
        }
    }

    /// Byte offset inside [`Vertex`].
    pub fn offset(self) -> u64 {
        let offset = match self {
            VertexSemantic::Position => std::mem::offset_of!(Vertex, position),
            VertexSemantic::Normal => std::mem::offset_of!(Vertex, normal),
            VertexSemantic::TexCoord => std::mem::offset_of!(Vertex, tex_coord),
        };
        offset as u64
    }

    pub fn components(self) -> u32 {
        match self {
            VertexSemantic::Position | VertexSemantic::Normal => 3,
            VertexSemantic::TexCoord => 2,
        }
    }
}

/// Vertex input bound to a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSlot {
    pub name: String,
    pub location: u32,
    pub semantic: VertexSemantic,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformKind {
    Mat4,
    Vec4,
    Texture,
    Sampler,
}

impl UniformKind {
    /// Size in a uniform buffer; zero for opaque handles.
    pub fn byte_size(self) -> u64 {
        match self {
            UniformKind::Mat4 => 64,
            UniformKind::Vec4 => 16,
            UniformKind::Texture | UniformKind::Sampler => 0,
        }
    }
}

/// Resource binding in group 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub binding: u32,
    pub kind: UniformKind,
    pub vertex: bool,
    pub fragment: bool,
}

/// Linked interface of a program: what the rendering code may address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    pub(crate) attributes: Vec<AttributeSlot>,
    pub(crate) uniforms: Vec<UniformSlot>,
}

impl ProgramInterface {
    pub fn attributes(&self) -> &[AttributeSlot] {
        &self.attributes
    }

    pub fn uniforms(&self) -> &[UniformSlot] {
        &self.uniforms
    }

    pub fn uniform(&self, binding: u32) -> Option<&UniformSlot> {
        self.uniforms.iter().find(|u| u.binding == binding)
    }

    /// Attribute location or uniform binding for `name`.
    pub fn find(&self, name: &str) -> Option<Location> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| Location(a.location))
            .or_else(|| {
                self.uniforms
                    .iter()
                    .find(|u| u.name == name)
                    .map(|u| Location(u.binding))
            })
    }
}

/// Program whose stages compiled and linked; the descriptor handed to the
/// context to build the GPU object.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedProgram {
    pub label: String,
    pub vertex_source: String,
    pub fragment_source: String,
    pub interface: ProgramInterface,
    pub depth_test: bool,
    pub alpha_blend: bool,
}
