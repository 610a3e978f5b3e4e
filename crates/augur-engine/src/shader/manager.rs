use crate::context::{GraphicsContext, Location, ResourceDescriptor, ResourceKind};
use crate::resource::ResourceHandle;
use crate::RenderError;

use super::program::{LinkedProgram, ProgramSource};
use super::reflect::link_program;

/// Index of a program registered with a [`ProgramManager`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ProgramId(usize);

#[derive(Debug)]
struct ProgramEntry {
    linked: LinkedProgram,
    handle: ResourceHandle,
}

/// Owns every linked program and its GPU object.
///
/// Linking happens once per source; after a context loss the GPU objects are
/// rebuilt from the kept [`LinkedProgram`]s by [`ProgramManager::ensure`].
#[derive(Debug, Default)]
pub struct ProgramManager {
    programs: Vec<ProgramEntry>,
    allocations: usize,
}

impl ProgramManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles, links and allocates a program.
    ///
    /// On failure nothing is registered and existing programs are untouched.
    pub fn compile(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        source: &ProgramSource<'_>,
    ) -> Result<ProgramId, RenderError> {
        let linked = link_program(source)?;
        let handle = allocate(ctx, &linked)?;
        self.allocations += 1;

        let id = ProgramId(self.programs.len());
        self.programs.push(ProgramEntry { linked, handle });
        log::info!("program '{}' ready", source.label);
        Ok(id)
    }

    /// Attribute location or uniform binding of `name` in program `id`.
    pub fn locate(&self, id: ProgramId, name: &str) -> Result<Location, RenderError> {
        let entry = self.entry(id)?;
        entry
            .linked
            .interface
            .find(name)
            .ok_or_else(|| RenderError::LocationNotFound {
                program: entry.linked.label.clone(),
                name: name.to_string(),
            })
    }

    /// Makes program `id` current.
    pub fn use_program(&self, ctx: &mut dyn GraphicsContext, id: ProgramId) -> Result<(), RenderError> {
        self.entry(id)?.handle.bind(ctx)
    }

    /// Rebuilds GPU objects that belong to an older context generation.
    /// Returns `true` if anything was rebuilt.
    pub fn ensure(&mut self, ctx: &mut dyn GraphicsContext) -> Result<bool, RenderError> {
        let mut rebuilt = false;
        for entry in &mut self.programs {
            if entry.handle.is_live(ctx) {
                continue;
            }
            entry.handle.release(ctx);
            entry.handle = allocate(ctx, &entry.linked)?;
            self.allocations += 1;
            rebuilt = true;
        }
        if rebuilt {
            log::info!("rebuilt shader programs for context generation {}", ctx.generation());
        }
        Ok(rebuilt)
    }

    /// Number of GPU program objects created so far.
    pub fn allocation_count(&self) -> usize {
        self.allocations
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Frees every GPU object and forgets all programs.
    pub fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        for mut entry in self.programs.drain(..) {
            entry.handle.release(ctx);
        }
    }

    fn entry(&self, id: ProgramId) -> Result<&ProgramEntry, RenderError> {
        self.programs.get(id.0).ok_or_else(|| RenderError::InvalidHandle {
            kind: ResourceKind::Program,
            label: format!("program #{}", id.0),
        })
    }
}

fn allocate(ctx: &mut dyn GraphicsContext, linked: &LinkedProgram) -> Result<ResourceHandle, RenderError> {
    ResourceHandle::allocate(ctx, linked.label.clone(), &ResourceDescriptor::Program(linked)).map_err(
        |err| match err {
            RenderError::ResourceCreation { reason, .. } => RenderError::ShaderLink {
                program: linked.label.clone(),
                reason,
            },
            other => other,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessContext;
    use crate::math::SurfaceSize;
    use crate::shader::sources;

    fn ctx() -> HeadlessContext {
        HeadlessContext::new(SurfaceSize::new(32, 32))
    }

    // ── compile / locate ─────────────────────────────────────────────────

    #[test]
    fn augmentation_program_exposes_expected_names() {
        let mut ctx = ctx();
        let mut programs = ProgramManager::new();
        let id = programs.compile(&mut ctx, &sources::AUGMENTATION).unwrap();

        assert_eq!(programs.locate(id, sources::VERTEX_POSITION).unwrap(), Location(0));
        assert_eq!(programs.locate(id, sources::VERTEX_NORMAL).unwrap(), Location(1));
        assert_eq!(programs.locate(id, sources::VERTEX_TEX_COORD).unwrap(), Location(2));
        assert_eq!(programs.locate(id, sources::MODEL_VIEW_PROJECTION).unwrap(), Location(0));
        assert_eq!(programs.locate(id, sources::TEX_SAMPLER_2D).unwrap(), Location(1));
        assert_eq!(ctx.live_count(ResourceKind::Program), 1);
    }

    #[test]
    fn unknown_name_is_location_not_found() {
        let mut ctx = ctx();
        let mut programs = ProgramManager::new();
        let id = programs.compile(&mut ctx, &sources::AUGMENTATION).unwrap();
        let err = programs.locate(id, "lightDirection").unwrap_err();
        assert_eq!(
            err,
            RenderError::LocationNotFound {
                program: "augmentation".into(),
                name: "lightDirection".into(),
            }
        );
        assert!(err.is_startup_fatal());
    }

    #[test]
    fn failed_compile_leaves_no_program_behind() {
        let mut ctx = ctx();
        let mut programs = ProgramManager::new();
        let broken = ProgramSource {
            fragment: "@fragment fn fs_main( -> @location(0) vec4<f32> {}",
            ..sources::AUGMENTATION
        };
        let err = programs.compile(&mut ctx, &broken).unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompile { .. }));
        assert!(programs.is_empty());
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn backend_rejection_is_link_error() {
        let mut ctx = ctx();
        let mut programs = ProgramManager::new();
        ctx.fail_next_create("pipeline rejected");
        let err = programs.compile(&mut ctx, &sources::DISTORTION).unwrap_err();
        assert_eq!(
            err,
            RenderError::ShaderLink {
                program: "distortion".into(),
                reason: "pipeline rejected".into(),
            }
        );
    }

    // ── context loss ─────────────────────────────────────────────────────

    #[test]
    fn ensure_rebuilds_only_after_context_loss() {
        let mut ctx = ctx();
        let mut programs = ProgramManager::new();
        programs.compile(&mut ctx, &sources::AUGMENTATION).unwrap();
        programs.compile(&mut ctx, &sources::VIDEO_BACKGROUND).unwrap();
        assert!(!programs.ensure(&mut ctx).unwrap());
        assert_eq!(programs.allocation_count(), 2);

        ctx.lose_context();
        assert!(programs.ensure(&mut ctx).unwrap());
        assert_eq!(programs.allocation_count(), 4);
        assert_eq!(ctx.live_count(ResourceKind::Program), 2);
    }

    #[test]
    fn release_frees_every_program() {
        let mut ctx = ctx();
        let mut programs = ProgramManager::new();
        programs.compile(&mut ctx, &sources::AUGMENTATION).unwrap();
        programs.compile(&mut ctx, &sources::DISTORTION).unwrap();
        programs.release(&mut ctx);
        assert!(programs.is_empty());
        assert_eq!(ctx.live_objects(), 0);
    }
}
