use crate::context::{GraphicsContext, RawHandle, ResourceDescriptor, ResourceKind};
use crate::RenderError;

/// Owned name of one GPU object.
///
/// A handle is either unallocated or bound to a live object created under a
/// specific context generation. It is neither `Clone` nor `Copy`: exactly one
/// manager owns each object and is responsible for releasing it before the
/// context goes away. Dropping a handle that still names an object logs a
/// leak warning, since the driver never reports one.
#[derive(Debug)]
pub struct ResourceHandle {
    kind: ResourceKind,
    label: String,
    raw: Option<RawHandle>,
    generation: u64,
}

impl ResourceHandle {
    /// Creates a handle in the unallocated state.
    pub fn unallocated(kind: ResourceKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            raw: None,
            generation: 0,
        }
    }

    /// Creates a GPU object and returns the owning handle.
    pub fn allocate(
        ctx: &mut dyn GraphicsContext,
        label: impl Into<String>,
        descriptor: &ResourceDescriptor<'_>,
    ) -> Result<Self, RenderError> {
        let label = label.into();
        let kind = descriptor.kind();
        let raw = ctx
            .create(&label, descriptor)
            .map_err(|reason| RenderError::ResourceCreation {
                kind,
                label: label.clone(),
                reason,
            })?;

        log::trace!("allocated {kind:?} '{label}' as {}", raw.get());
        Ok(Self {
            kind,
            label,
            raw: Some(raw),
            generation: ctx.generation(),
        })
    }

    #[inline]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.raw.is_some()
    }

    /// Allocated under the context's current generation.
    #[inline]
    pub fn is_live(&self, ctx: &dyn GraphicsContext) -> bool {
        self.raw.is_some() && self.generation == ctx.generation()
    }

    /// The raw name, valid only while [`ResourceHandle::is_live`].
    #[inline]
    pub fn raw(&self) -> Option<RawHandle> {
        self.raw
    }

    /// Returns the raw name or `InvalidHandle` if the handle is unallocated
    /// or stale.
    pub fn live_raw(&self, ctx: &dyn GraphicsContext) -> Result<RawHandle, RenderError> {
        match self.raw {
            Some(raw) if self.generation == ctx.generation() => Ok(raw),
            _ => Err(RenderError::InvalidHandle {
                kind: self.kind,
                label: self.label.clone(),
            }),
        }
    }

    /// Makes the object current for subsequent context calls.
    pub fn bind(&self, ctx: &mut dyn GraphicsContext) -> Result<(), RenderError> {
        let raw = self.live_raw(ctx)?;
        ctx.bind(self.kind, raw);
        Ok(())
    }

    /// Frees the object and returns to the unallocated state. Idempotent.
    ///
    /// Handles from an older context generation are reset without calling
    /// into the context: their object died with the old device.
    pub fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        let Some(raw) = self.raw.take() else { return };
        if self.generation == ctx.generation() {
            ctx.destroy(self.kind, raw);
            log::trace!("released {:?} '{}'", self.kind, self.label);
        } else {
            log::debug!(
                "dropping stale {:?} '{}' from context generation {}",
                self.kind,
                self.label,
                self.generation
            );
        }
        self.generation = 0;
    }

    /// Forgets a handle whose context is already gone. Used after context
    /// loss, when there is no device left to call.
    pub fn forget(&mut self) {
        self.raw = None;
        self.generation = 0;
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        if let Some(raw) = self.raw {
            log::warn!(
                "{:?} '{}' ({}) dropped without release; GPU object leaked",
                self.kind,
                self.label,
                raw.get()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{HeadlessContext, TextureFormat};
    use crate::math::SurfaceSize;

    fn ctx() -> HeadlessContext {
        HeadlessContext::new(SurfaceSize::new(64, 64))
    }

    fn texture_desc() -> ResourceDescriptor<'static> {
        ResourceDescriptor::Texture {
            width: 2,
            height: 2,
            format: TextureFormat::Rgba8Srgb,
            render_target: false,
            pixels: None,
        }
    }

    #[test]
    fn allocate_then_release_is_idempotent() {
        let mut ctx = ctx();
        let mut handle = ResourceHandle::allocate(&mut ctx, "tex", &texture_desc()).unwrap();
        assert!(handle.is_allocated());
        assert_eq!(ctx.live_objects(), 1);

        handle.release(&mut ctx);
        assert!(!handle.is_allocated());
        assert_eq!(ctx.live_objects(), 0);

        handle.release(&mut ctx);
        assert!(!handle.is_allocated());
        assert_eq!(ctx.destroyed_count(), 1);
    }

    #[test]
    fn creation_failure_is_resource_creation_error() {
        let mut ctx = ctx();
        ctx.fail_next_create("out of memory");
        let err = ResourceHandle::allocate(&mut ctx, "tex", &texture_desc()).unwrap_err();
        assert_eq!(
            err,
            RenderError::ResourceCreation {
                kind: ResourceKind::Texture,
                label: "tex".into(),
                reason: "out of memory".into(),
            }
        );
    }

    #[test]
    fn bind_on_unallocated_handle_fails_without_touching_context() {
        let mut ctx = ctx();
        ctx.begin_frame().unwrap();
        let handle = ResourceHandle::unallocated(ResourceKind::Mesh, "quad");
        let err = handle.bind(&mut ctx).unwrap_err();
        assert!(matches!(err, RenderError::InvalidHandle { kind: ResourceKind::Mesh, .. }));
        ctx.present().unwrap();
        assert!(ctx.last_frame().unwrap().commands.is_empty());
    }

    #[test]
    fn stale_handle_is_invalid_and_released_without_destroy() {
        let mut ctx = ctx();
        let mut handle = ResourceHandle::allocate(&mut ctx, "tex", &texture_desc()).unwrap();
        ctx.lose_context();

        assert!(!handle.is_live(&ctx));
        assert!(handle.bind(&mut ctx).is_err());

        handle.release(&mut ctx);
        assert!(!handle.is_allocated());
        assert_eq!(ctx.destroyed_count(), 0);
    }
}
