//! Bundled programs and the names the renderer resolves in them.

use super::ProgramSource;

pub const VERTEX_POSITION: &str = "vertexPosition";
pub const VERTEX_NORMAL: &str = "vertexNormal";
pub const VERTEX_TEX_COORD: &str = "vertexTexCoord";

pub const MODEL_VIEW_PROJECTION: &str = "modelViewProjectionMatrix";
pub const PROJECTION: &str = "projectionMatrix";
pub const TEX_SAMPLER_2D: &str = "texSampler2D";
pub const DISTORTION_PARAMS: &str = "distortionParams";

const AUGMENTATION_VERT: &str = include_str!("shaders/augmentation.vert.wgsl");
const AUGMENTATION_FRAG: &str = include_str!("shaders/augmentation.frag.wgsl");
const FULLSCREEN_VERT: &str = include_str!("shaders/fullscreen.vert.wgsl");
const DISTORTION_FRAG: &str = include_str!("shaders/distortion.frag.wgsl");
const BACKGROUND_FRAG: &str = include_str!("shaders/background.frag.wgsl");

/// Textured augmentation meshes, depth tested.
pub const AUGMENTATION: ProgramSource<'static> = ProgramSource {
    label: "augmentation",
    vertex: AUGMENTATION_VERT,
    fragment: AUGMENTATION_FRAG,
    depth_test: true,
    alpha_blend: false,
};

/// Lens pre-warp of the offscreen image onto the default framebuffer.
pub const DISTORTION: ProgramSource<'static> = ProgramSource {
    label: "distortion",
    vertex: FULLSCREEN_VERT,
    fragment: DISTORTION_FRAG,
    depth_test: false,
    alpha_blend: false,
};

/// Camera image drawn behind the augmentation.
pub const VIDEO_BACKGROUND: ProgramSource<'static> = ProgramSource {
    label: "video-background",
    vertex: FULLSCREEN_VERT,
    fragment: BACKGROUND_FRAG,
    depth_test: false,
    alpha_blend: false,
};
