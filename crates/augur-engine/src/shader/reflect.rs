use std::collections::BTreeMap;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, Handle, Module, ShaderStage, Type, TypeInner, VectorSize};

use crate::{RenderError, ShaderStageKind};

use super::program::{
    AttributeSlot, LinkedProgram, ProgramInterface, ProgramSource, UniformKind, UniformSlot,
    VertexSemantic,
};

const VERTEX_ENTRY: &str = "vs_main";
const FRAGMENT_ENTRY: &str = "fs_main";

/// Location-bound inputs/outputs and group-0 resources of one stage.
#[derive(Debug, Default)]
struct StageInterface {
    inputs: Vec<(Option<String>, u32)>,
    outputs: Vec<u32>,
    resources: Vec<UniformSlot>,
}

/// Parses, validates and links both stages of `source`.
///
/// Compile errors carry naga's rendered diagnostic (with source excerpt).
/// Link errors describe the interface mismatch.
pub fn link_program(source: &ProgramSource<'_>) -> Result<LinkedProgram, RenderError> {
    let program = source.label;
    let vertex_module = compile_stage(program, ShaderStageKind::Vertex, source.vertex)?;
    let fragment_module = compile_stage(program, ShaderStageKind::Fragment, source.fragment)?;

    let vertex = reflect_stage(program, &vertex_module, ShaderStageKind::Vertex)?;
    let fragment = reflect_stage(program, &fragment_module, ShaderStageKind::Fragment)?;
    let interface = link(program, vertex, fragment)?;

    log::debug!(
        "linked program '{program}': {} attributes, {} uniforms",
        interface.attributes.len(),
        interface.uniforms.len()
    );

    Ok(LinkedProgram {
        label: program.to_string(),
        vertex_source: source.vertex.to_string(),
        fragment_source: source.fragment.to_string(),
        interface,
        depth_test: source.depth_test,
        alpha_blend: source.alpha_blend,
    })
}

fn compile_stage(program: &str, stage: ShaderStageKind, text: &str) -> Result<Module, RenderError> {
    let compile_error = |diagnostic: String| RenderError::ShaderCompile {
        program: program.to_string(),
        stage,
        diagnostic,
    };

    let module = naga::front::wgsl::parse_str(text).map_err(|e| compile_error(e.emit_to_string(text)))?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| compile_error(e.emit_to_string(text)))?;

    Ok(module)
}

fn link_error(program: &str, reason: String) -> RenderError {
    RenderError::ShaderLink {
        program: program.to_string(),
        reason,
    }
}

fn reflect_stage(
    program: &str,
    module: &Module,
    stage: ShaderStageKind,
) -> Result<StageInterface, RenderError> {
    let (naga_stage, entry_name) = match stage {
        ShaderStageKind::Vertex => (ShaderStage::Vertex, VERTEX_ENTRY),
        ShaderStageKind::Fragment => (ShaderStage::Fragment, FRAGMENT_ENTRY),
    };

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga_stage && ep.name == entry_name)
        .ok_or_else(|| link_error(program, format!("{stage} stage has no entry point '{entry_name}'")))?;

    let mut interface = StageInterface::default();

    for arg in &entry.function.arguments {
        collect_locations(module, arg.ty, arg.binding.as_ref(), arg.name.as_ref(), &mut interface.inputs);
    }

    if let Some(result) = &entry.function.result {
        let mut outputs = Vec::new();
        collect_locations(module, result.ty, result.binding.as_ref(), None, &mut outputs);
        interface.outputs = outputs.into_iter().map(|(_, loc)| loc).collect();
    }

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else { continue };
        let name = var.name.clone().unwrap_or_default();

        if binding.group != 0 {
            return Err(link_error(
                program,
                format!("'{name}' uses bind group {}; only group 0 is supported", binding.group),
            ));
        }

        let kind = match (&var.space, &module.types[var.ty].inner) {
            (
                AddressSpace::Uniform,
                TypeInner::Matrix { columns: VectorSize::Quad, rows: VectorSize::Quad, .. },
            ) => UniformKind::Mat4,
            (AddressSpace::Uniform, TypeInner::Vector { size: VectorSize::Quad, .. }) => UniformKind::Vec4,
            (AddressSpace::Handle, TypeInner::Image { .. }) => UniformKind::Texture,
            (AddressSpace::Handle, TypeInner::Sampler { .. }) => UniformKind::Sampler,
            _ => {
                return Err(link_error(
                    program,
                    format!("'{name}' has an unsupported resource type (use mat4x4, vec4, texture_2d or sampler)"),
                ));
            }
        };

        interface.resources.push(UniformSlot {
            name,
            binding: binding.binding,
            kind,
            vertex: stage == ShaderStageKind::Vertex,
            fragment: stage == ShaderStageKind::Fragment,
        });
    }

    Ok(interface)
}

/// Collects `@location` bindings of an argument or result, looking through
/// one level of struct.
fn collect_locations(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    name: Option<&String>,
    out: &mut Vec<(Option<String>, u32)>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push((name.cloned(), *location)),
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    if let Some(Binding::Location { location, .. }) = &member.binding {
                        out.push((member.name.clone(), *location));
                    }
                }
            }
        }
    }
}

fn link(
    program: &str,
    vertex: StageInterface,
    fragment: StageInterface,
) -> Result<ProgramInterface, RenderError> {
    let mut attributes = Vec::with_capacity(vertex.inputs.len());
    for (name, location) in vertex.inputs {
        let name = name.ok_or_else(|| link_error(program, format!("vertex input {location} is unnamed")))?;
        let semantic = VertexSemantic::from_attribute_name(&name).ok_or_else(|| {
            link_error(program, format!("vertex input '{name}' does not name a known vertex attribute"))
        })?;
        attributes.push(AttributeSlot { name, location, semantic });
    }
    attributes.sort_by_key(|a| a.location);

    for (name, location) in &fragment.inputs {
        if !vertex.outputs.contains(location) {
            return Err(link_error(
                program,
                format!(
                    "fragment input '{}' at location {location} has no matching vertex output",
                    name.as_deref().unwrap_or("?")
                ),
            ));
        }
    }

    let mut slots: BTreeMap<u32, UniformSlot> = BTreeMap::new();
    for slot in vertex.resources.into_iter().chain(fragment.resources) {
        match slots.get_mut(&slot.binding) {
            Some(existing) if existing.name != slot.name || existing.kind != slot.kind => {
                return Err(link_error(
                    program,
                    format!(
                        "binding {} is '{}' ({:?}) in one stage and '{}' ({:?}) in the other",
                        slot.binding, existing.name, existing.kind, slot.name, slot.kind
                    ),
                ));
            }
            Some(existing) => {
                existing.vertex |= slot.vertex;
                existing.fragment |= slot.fragment;
            }
            None => {
                slots.insert(slot.binding, slot);
            }
        }
    }
    let uniforms: Vec<UniformSlot> = slots.into_values().collect();

    let mut names: Vec<&str> = attributes
        .iter()
        .map(|a| a.name.as_str())
        .chain(uniforms.iter().map(|u| u.name.as_str()))
        .collect();
    names.sort_unstable();
    if let Some(pair) = names.windows(2).find(|w| w[0] == w[1]) {
        return Err(link_error(program, format!("'{}' is declared twice", pair[0])));
    }

    Ok(ProgramInterface { attributes, uniforms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::sources;

    const VERTEX: &str = r#"
        struct VertexOutput {
            @builtin(position) position: vec4<f32>,
            @location(0) texCoord: vec2<f32>,
        };
        @group(0) @binding(0) var<uniform> projectionMatrix: mat4x4<f32>;
        @vertex
        fn vs_main(@location(0) vertexPosition: vec3<f32>, @location(1) vertexTexCoord: vec2<f32>) -> VertexOutput {
            var out: VertexOutput;
            out.position = projectionMatrix * vec4<f32>(vertexPosition, 1.0);
            out.texCoord = vertexTexCoord;
            return out;
        }
    "#;

    const FRAGMENT: &str = r#"
        @fragment
        fn fs_main(@location(0) texCoord: vec2<f32>) -> @location(0) vec4<f32> {
            return vec4<f32>(texCoord, 0.0, 1.0);
        }
    "#;

    fn source<'a>(vertex: &'a str, fragment: &'a str) -> ProgramSource<'a> {
        ProgramSource { label: "test", vertex, fragment, depth_test: false, alpha_blend: false }
    }

    #[test]
    fn links_plain_arguments() {
        let linked = link_program(&source(VERTEX, FRAGMENT)).unwrap();
        let iface = &linked.interface;
        assert_eq!(iface.attributes().len(), 2);
        assert_eq!(iface.attributes()[1].semantic, VertexSemantic::TexCoord);
        assert_eq!(iface.uniforms().len(), 1);
        assert!(iface.uniforms()[0].vertex);
        assert!(!iface.uniforms()[0].fragment);
    }

    #[test]
    fn syntax_error_reports_stage_and_diagnostic() {
        let broken = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0) }";
        let err = link_program(&source(VERTEX, broken)).unwrap_err();
        match err {
            RenderError::ShaderCompile { stage, diagnostic, .. } => {
                assert_eq!(stage, ShaderStageKind::Fragment);
                assert!(!diagnostic.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn fragment_input_without_vertex_output_fails_to_link() {
        let fragment = r#"
            @fragment
            fn fs_main(@location(3) tint: vec4<f32>) -> @location(0) vec4<f32> {
                return tint;
            }
        "#;
        let err = link_program(&source(VERTEX, fragment)).unwrap_err();
        assert!(matches!(err, RenderError::ShaderLink { ref reason, .. } if reason.contains("location 3")));
    }

    #[test]
    fn conflicting_binding_fails_to_link() {
        let fragment = r#"
            @group(0) @binding(0) var<uniform> tint: vec4<f32>;
            @fragment
            fn fs_main(@location(0) texCoord: vec2<f32>) -> @location(0) vec4<f32> {
                return tint;
            }
        "#;
        let err = link_program(&source(VERTEX, fragment)).unwrap_err();
        assert!(matches!(err, RenderError::ShaderLink { ref reason, .. } if reason.contains("binding 0")));
    }

    #[test]
    fn missing_entry_point_fails_to_link() {
        let fragment = r#"
            @fragment
            fn main() -> @location(0) vec4<f32> {
                return vec4<f32>(1.0, 0.0, 0.0, 1.0);
            }
        "#;
        let err = link_program(&source(VERTEX, fragment)).unwrap_err();
        assert!(matches!(err, RenderError::ShaderLink { ref reason, .. } if reason.contains("fs_main")));
    }

    #[test]
    fn unknown_attribute_name_fails_to_link() {
        let vertex = VERTEX.replace("vertexTexCoord", "uv");
        let err = link_program(&source(&vertex, FRAGMENT)).unwrap_err();
        assert!(matches!(err, RenderError::ShaderLink { ref reason, .. } if reason.contains("'uv'")));
    }

    #[test]
    fn bundled_programs_link() {
        for program in [sources::AUGMENTATION, sources::DISTORTION, sources::VIDEO_BACKGROUND] {
            let linked = link_program(&program).unwrap_or_else(|e| panic!("{e}"));
            assert!(linked.interface.find(sources::TEX_SAMPLER_2D).is_some());
        }
    }
}
