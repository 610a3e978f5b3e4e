use crate::context::{GraphicsContext, ResourceDescriptor, ResourceKind, TextureFormat};
use crate::math::SurfaceSize;
use crate::resource::ResourceHandle;
use crate::RenderError;

/// Which attachment set a call refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TargetKind {
    Default,
    Offscreen,
}

impl TargetKind {
    fn label(self) -> &'static str {
        match self {
            TargetKind::Default => "default",
            TargetKind::Offscreen => "offscreen",
        }
    }
}

#[derive(Debug)]
struct TargetSet {
    color: ResourceHandle,
    depth: ResourceHandle,
    framebuffer: ResourceHandle,
}

impl TargetSet {
    fn create(
        ctx: &mut dyn GraphicsContext,
        kind: TargetKind,
        size: SurfaceSize,
    ) -> Result<Self, RenderError> {
        let SurfaceSize { width, height } = size;
        let label = kind.label();

        let (color_desc, depth_desc) = match kind {
            TargetKind::Default => (
                ResourceDescriptor::ColorTarget { width, height },
                ResourceDescriptor::DepthTarget { width, height },
            ),
            TargetKind::Offscreen => (
                ResourceDescriptor::Texture {
                    width,
                    height,
                    format: TextureFormat::Rgba8Srgb,
                    render_target: true,
                    pixels: None,
                },
                ResourceDescriptor::Texture {
                    width,
                    height,
                    format: TextureFormat::Depth32Float,
                    render_target: true,
                    pixels: None,
                },
            ),
        };

        let mut color = ResourceHandle::allocate(ctx, format!("{label} color"), &color_desc)?;
        let mut depth = match ResourceHandle::allocate(ctx, format!("{label} depth"), &depth_desc) {
            Ok(depth) => depth,
            Err(e) => {
                color.release(ctx);
                return Err(e);
            }
        };

        let attachments = ResourceDescriptor::Framebuffer {
            color: color.live_raw(ctx)?,
            depth: depth.live_raw(ctx)?,
        };
        match ResourceHandle::allocate(ctx, format!("{label} framebuffer"), &attachments) {
            Ok(framebuffer) => Ok(Self { color, depth, framebuffer }),
            Err(e) => {
                depth.release(ctx);
                color.release(ctx);
                Err(e)
            }
        }
    }

    fn is_live(&self, ctx: &dyn GraphicsContext) -> bool {
        self.color.is_live(ctx) && self.depth.is_live(ctx) && self.framebuffer.is_live(ctx)
    }

    fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        // Attachment set first, then what it points at.
        self.framebuffer.release(ctx);
        self.depth.release(ctx);
        self.color.release(ctx);
    }
}

/// Owns the default and offscreen attachment sets.
///
/// Either both sets exist at the same size or neither does.
#[derive(Debug, Default)]
pub struct FramebufferManager {
    default: Option<TargetSet>,
    offscreen: Option<TargetSet>,
    size: Option<SurfaceSize>,
    configurations: usize,
}

impl FramebufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes both attachment sets to `size`.
    ///
    /// Returns `Ok(false)` without allocating when the sets already match
    /// `size` and belong to the current context generation. On error the
    /// manager holds no targets and the next call starts from scratch.
    pub fn configure(&mut self, ctx: &mut dyn GraphicsContext, size: SurfaceSize) -> Result<bool, RenderError> {
        if size.is_empty() {
            self.release(ctx);
            return Err(RenderError::FramebufferIncomplete {
                label: TargetKind::Default.label().to_string(),
                reason: format!("zero-sized surface {}x{}", size.width, size.height),
            });
        }

        if self.size == Some(size) && self.is_live(ctx) {
            return Ok(false);
        }

        self.release(ctx);
        match self.create_all(ctx, size) {
            Ok(()) => {
                self.size = Some(size);
                self.configurations += 1;
                log::info!("render targets configured at {}x{}", size.width, size.height);
                Ok(true)
            }
            Err(e) => {
                self.release(ctx);
                Err(e)
            }
        }
    }

    fn create_all(&mut self, ctx: &mut dyn GraphicsContext, size: SurfaceSize) -> Result<(), RenderError> {
        for kind in [TargetKind::Default, TargetKind::Offscreen] {
            let set = TargetSet::create(ctx, kind, size)?;
            let status = set.framebuffer.live_raw(ctx).and_then(|raw| {
                ctx.framebuffer_status(raw).map_err(|reason| RenderError::FramebufferIncomplete {
                    label: kind.label().to_string(),
                    reason,
                })
            });
            *self.slot(kind) = Some(set);
            status?;
        }
        Ok(())
    }

    fn slot(&mut self, kind: TargetKind) -> &mut Option<TargetSet> {
        match kind {
            TargetKind::Default => &mut self.default,
            TargetKind::Offscreen => &mut self.offscreen,
        }
    }

    fn set(&self, kind: TargetKind) -> Result<&TargetSet, RenderError> {
        let set = match kind {
            TargetKind::Default => self.default.as_ref(),
            TargetKind::Offscreen => self.offscreen.as_ref(),
        };
        set.ok_or_else(|| RenderError::InvalidHandle {
            kind: ResourceKind::Framebuffer,
            label: format!("{} framebuffer", kind.label()),
        })
    }

    fn is_live(&self, ctx: &dyn GraphicsContext) -> bool {
        matches!((&self.default, &self.offscreen), (Some(d), Some(o)) if d.is_live(ctx) && o.is_live(ctx))
    }

    pub fn bind(&self, ctx: &mut dyn GraphicsContext, kind: TargetKind) -> Result<(), RenderError> {
        self.set(kind)?.framebuffer.bind(ctx)
    }

    #[inline]
    pub fn bind_default(&self, ctx: &mut dyn GraphicsContext) -> Result<(), RenderError> {
        self.bind(ctx, TargetKind::Default)
    }

    #[inline]
    pub fn bind_offscreen(&self, ctx: &mut dyn GraphicsContext) -> Result<(), RenderError> {
        self.bind(ctx, TargetKind::Offscreen)
    }

    /// Sampled color texture of the offscreen set.
    pub fn offscreen_color(&self) -> Result<&ResourceHandle, RenderError> {
        self.set(TargetKind::Offscreen).map(|s| &s.color)
    }

    /// Size of the configured targets, `None` when unconfigured.
    #[inline]
    pub fn current_size(&self) -> Option<SurfaceSize> {
        self.size
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.size.is_some()
    }

    /// Number of successful (re)configurations.
    #[inline]
    pub fn configuration_count(&self) -> usize {
        self.configurations
    }

    /// Frees every target. Safe to call when unconfigured.
    pub fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        for mut set in [self.default.take(), self.offscreen.take()].into_iter().flatten() {
            set.release(ctx);
        }
        if let Some(size) = self.size.take() {
            log::debug!("released render targets ({}x{})", size.width, size.height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeadlessContext;

    const SMALL: SurfaceSize = SurfaceSize::new(1024, 768);
    const LARGE: SurfaceSize = SurfaceSize::new(2048, 1536);

    fn size_of(ctx: &HeadlessContext, handle: &ResourceHandle) -> Option<SurfaceSize> {
        handle.raw().and_then(|raw| ctx.object_size(raw))
    }

    // ── configure ───────────────────────────────────────────────────────

    #[test]
    fn configure_creates_both_sets() {
        let mut ctx = HeadlessContext::new(SMALL);
        let mut fbs = FramebufferManager::new();
        assert!(fbs.configure(&mut ctx, SMALL).unwrap());
        assert_eq!(fbs.current_size(), Some(SMALL));
        assert_eq!(ctx.live_count(ResourceKind::Framebuffer), 2);
        assert_eq!(ctx.live_count(ResourceKind::ColorTarget), 1);
        assert_eq!(ctx.live_count(ResourceKind::DepthTarget), 1);
        assert_eq!(ctx.live_count(ResourceKind::Texture), 2);
        fbs.release(&mut ctx);
    }

    #[test]
    fn configure_twice_with_same_size_allocates_nothing() {
        let mut ctx = HeadlessContext::new(SMALL);
        let mut fbs = FramebufferManager::new();
        fbs.configure(&mut ctx, SMALL).unwrap();
        let created = ctx.created_count();

        assert!(!fbs.configure(&mut ctx, SMALL).unwrap());
        assert_eq!(ctx.created_count(), created);
        assert_eq!(fbs.configuration_count(), 1);
        fbs.release(&mut ctx);
    }

    #[test]
    fn resize_releases_old_targets_and_recreates_at_new_size() {
        let mut ctx = HeadlessContext::new(SMALL);
        let mut fbs = FramebufferManager::new();
        fbs.configure(&mut ctx, SMALL).unwrap();
        let old_color = fbs.offscreen_color().unwrap().raw().unwrap();

        ctx.resize(LARGE);
        assert!(fbs.configure(&mut ctx, LARGE).unwrap());

        assert!(!ctx.is_live(old_color));
        assert_eq!(ctx.destroyed_count(), 6);
        assert_eq!(ctx.live_objects(), 6);
        assert_eq!(size_of(&ctx, fbs.offscreen_color().unwrap()), Some(LARGE));
        assert_eq!(fbs.current_size(), Some(LARGE));
        fbs.release(&mut ctx);
    }

    #[test]
    fn zero_size_is_rejected_without_allocating() {
        let mut ctx = HeadlessContext::new(SMALL);
        let mut fbs = FramebufferManager::new();
        let err = fbs.configure(&mut ctx, SurfaceSize::new(0, 768)).unwrap_err();
        assert!(matches!(err, RenderError::FramebufferIncomplete { .. }));
        assert_eq!(ctx.created_count(), 0);
        assert!(!fbs.is_configured());
    }

    // ── failure & recovery ──────────────────────────────────────────────

    #[test]
    fn incomplete_framebuffer_leaves_manager_empty_and_retries() {
        let mut ctx = HeadlessContext::new(SMALL);
        let mut fbs = FramebufferManager::new();
        ctx.fail_framebuffers(true);
        let err = fbs.configure(&mut ctx, SMALL).unwrap_err();
        assert!(matches!(err, RenderError::FramebufferIncomplete { ref label, .. } if label == "default"));
        assert_eq!(ctx.live_objects(), 0);
        assert!(fbs.bind_default(&mut ctx).is_err());

        ctx.fail_framebuffers(false);
        assert!(fbs.configure(&mut ctx, SMALL).unwrap());
        fbs.release(&mut ctx);
    }

    #[test]
    fn allocation_failure_midway_releases_partial_sets() {
        let mut ctx = HeadlessContext::new(SMALL);
        let mut fbs = FramebufferManager::new();
        fbs.configure(&mut ctx, SMALL).unwrap();
        ctx.resize(LARGE);
        ctx.fail_next_create("out of memory");
        let err = fbs.configure(&mut ctx, LARGE).unwrap_err();
        assert!(matches!(err, RenderError::ResourceCreation { .. }));
        assert_eq!(ctx.live_objects(), 0);
        assert_eq!(fbs.current_size(), None);
    }

    #[test]
    fn context_loss_forces_reconfiguration() {
        let mut ctx = HeadlessContext::new(SMALL);
        let mut fbs = FramebufferManager::new();
        fbs.configure(&mut ctx, SMALL).unwrap();
        ctx.lose_context();

        assert!(fbs.configure(&mut ctx, SMALL).unwrap());
        assert_eq!(ctx.destroyed_count(), 0);
        assert_eq!(ctx.live_objects(), 6);
        fbs.release(&mut ctx);
    }

    #[test]
    fn bind_offscreen_records_offscreen_framebuffer() {
        let mut ctx = HeadlessContext::new(SMALL);
        let mut fbs = FramebufferManager::new();
        fbs.configure(&mut ctx, SMALL).unwrap();
        ctx.begin_frame().unwrap();
        fbs.bind_offscreen(&mut ctx).unwrap();
        ctx.clear([0.0; 4], 1.0);
        ctx.present().unwrap();

        let (fb, _) = ctx.last_frame().unwrap().clears().next().unwrap();
        assert_eq!(ctx.object_label(fb.unwrap()), Some("offscreen framebuffer"));
        fbs.release(&mut ctx);
    }
}
