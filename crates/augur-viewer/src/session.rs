use augur_engine::RenderError;
use augur_engine::context::GraphicsContext;
use augur_engine::math::{Mat4, SurfaceSize};
use augur_engine::render::{
    EyeView, FrameInput, FrameRenderer, FrameReport, RendererConfig, ViewerDistortion,
};
use augur_engine::scene::TextureData;

use crate::assets;
use crate::tracker::SimulatedTracker;

/// What the viewer renders and how.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub renderer: RendererConfig,
    /// Augmentation textures, one slot each.
    pub textures: Vec<TextureData>,
    /// Eye separation in marker units; `None` renders a single view.
    pub stereo: Option<f32>,
    /// Resolution of the synthetic camera feed; `None` disables it.
    pub camera_feed: Option<SurfaceSize>,
    pub fov_y_degrees: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            renderer: RendererConfig::default(),
            textures: assets::procedural_textures(),
            stereo: None,
            camera_feed: None,
            fov_y_degrees: 45.0,
        }
    }
}

/// Running totals over a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub presented: u64,
    pub abandoned: u64,
    pub on_target: u64,
    pub object_draws: u64,
    pub restores: u64,
}

/// Glue between the tracker, the assets and the frame renderer.
///
/// The renderer only exists while a context does: [`Session::start`] builds
/// it and loads the scene, [`Session::stop`] tears it down.
pub struct Session {
    config: SessionConfig,
    tracker: SimulatedTracker,
    renderer: Option<FrameRenderer>,
    /// Lens profile restored when distortion is switched back on.
    lens: ViewerDistortion,
    stats: SessionStats,
}

impl Session {
    pub fn new(config: SessionConfig, tracker: SimulatedTracker) -> Self {
        let lens = config.renderer.distortion.unwrap_or_default();
        Self {
            config,
            tracker,
            renderer: None,
            lens,
            stats: SessionStats::default(),
        }
    }

    pub fn start(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), RenderError> {
        self.stop(ctx);

        let mut renderer = FrameRenderer::new(ctx, self.config.renderer.clone())?;
        if let Err(e) = assets::populate_scene(
            renderer.scene_mut(),
            ctx,
            &self.config.textures,
            self.tracker.marker_count(),
        ) {
            renderer.teardown(ctx);
            return Err(e);
        }

        self.renderer = Some(renderer);
        Ok(())
    }

    pub fn stop(&mut self, ctx: &mut dyn GraphicsContext) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.teardown(ctx);
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.renderer.is_some()
    }

    #[inline]
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Switches the lens-distortion pass. Survives a renderer rebuild.
    pub fn toggle_distortion(&mut self) -> bool {
        let distortion = match self.config.renderer.distortion {
            Some(_) => None,
            None => Some(self.lens),
        };
        self.config.renderer.distortion = distortion;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_distortion(distortion);
        }
        distortion.is_some()
    }

    /// Switches whether content stays visible while tracking is lost.
    pub fn toggle_off_target(&mut self) -> bool {
        let enabled = !self.config.renderer.off_target_enabled;
        self.config.renderer.off_target_enabled = enabled;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_off_target_enabled(enabled);
        }
        enabled
    }

    /// Polls the tracker and renders one frame. `None` when not started.
    pub fn frame(&mut self, ctx: &mut dyn GraphicsContext, frame: u64) -> Option<FrameReport> {
        let renderer = self.renderer.as_mut()?;

        if let Some(size) = self.config.camera_feed {
            let image = assets::camera_frame(size.width, size.height, frame);
            if let Err(e) = renderer.set_camera_frame(ctx, &image) {
                log::warn!("camera frame dropped: {e}");
            }
        }

        let surface = ctx.surface_size();
        let projection = |aspect: f32| {
            Mat4::perspective_rh(self.config.fov_y_degrees.to_radians(), aspect, 1.0, 5000.0)
        };

        let tracking = self.tracker.poll(frame);
        let report = match self.config.stereo {
            Some(separation) => {
                let eye_projection = projection(surface.aspect() * 0.5);
                let views = EyeView::stereo(eye_projection, separation);
                let input = FrameInput::new(tracking, eye_projection).with_views(&views);
                renderer.render_frame(ctx, &input)
            }
            None => {
                let input = FrameInput::new(tracking, projection(surface.aspect()));
                renderer.render_frame(ctx, &input)
            }
        };

        if report.context_restored {
            self.stats.restores += 1;
            if let Err(e) = assets::populate_scene(
                renderer.scene_mut(),
                ctx,
                &self.config.textures,
                self.tracker.marker_count(),
            ) {
                log::error!("failed to reload scene after context loss: {e}");
            }
        }

        self.stats.frames += 1;
        if report.is_presented() {
            self.stats.presented += 1;
        } else {
            self.stats.abandoned += 1;
        }
        if report.tracking.is_on_target() {
            self.stats.on_target += 1;
        }
        self.stats.object_draws += report.object_draws as u64;

        Some(report)
    }
}
