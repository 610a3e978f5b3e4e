use glam::{Mat4, Vec4};

use crate::context::{GraphicsContext, Location, ResourceDescriptor, ResourceKind, TextureFormat, UniformValue};
use crate::framebuffer::{FramebufferManager, TargetKind};
use crate::math::{MarkerId, SurfaceSize, Viewport};
use crate::resource::ResourceHandle;
use crate::scene::{MeshData, Scene, TextureData};
use crate::shader::{sources, ProgramId, ProgramManager, ProgramSource};
use crate::tracking::PoseComposer;
use crate::RenderError;

use super::config::{RendererConfig, ViewerDistortion};
use super::frame::{EyeView, FrameInput, FrameOutcome, FrameReport};

/// Clear color of the default framebuffer behind the lens-warped image.
const LENS_SURROUND: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Copy, Clone)]
struct AugmentationProgram {
    id: ProgramId,
    mvp: Location,
    sampler: Location,
}

#[derive(Debug, Copy, Clone)]
struct FullscreenProgram {
    id: ProgramId,
    projection: Location,
    sampler: Location,
    params: Option<Location>,
}

/// Resolved programs; built once, names validated at construction.
#[derive(Debug)]
struct Programs {
    manager: ProgramManager,
    augmentation: AugmentationProgram,
    distortion: FullscreenProgram,
    background: FullscreenProgram,
}

impl Programs {
    fn build(ctx: &mut dyn GraphicsContext) -> Result<Self, RenderError> {
        let mut manager = ProgramManager::new();
        match Self::resolve(ctx, &mut manager) {
            Ok((augmentation, distortion, background)) => Ok(Self {
                manager,
                augmentation,
                distortion,
                background,
            }),
            Err(e) => {
                manager.release(ctx);
                Err(e)
            }
        }
    }

    fn resolve(
        ctx: &mut dyn GraphicsContext,
        manager: &mut ProgramManager,
    ) -> Result<(AugmentationProgram, FullscreenProgram, FullscreenProgram), RenderError> {
        let id = manager.compile(ctx, &sources::AUGMENTATION)?;
        for attribute in [sources::VERTEX_POSITION, sources::VERTEX_NORMAL, sources::VERTEX_TEX_COORD] {
            manager.locate(id, attribute)?;
        }
        let augmentation = AugmentationProgram {
            id,
            mvp: manager.locate(id, sources::MODEL_VIEW_PROJECTION)?,
            sampler: manager.locate(id, sources::TEX_SAMPLER_2D)?,
        };

        let distortion = Self::fullscreen(ctx, manager, &sources::DISTORTION, true)?;
        let background = Self::fullscreen(ctx, manager, &sources::VIDEO_BACKGROUND, false)?;
        Ok((augmentation, distortion, background))
    }

    fn fullscreen(
        ctx: &mut dyn GraphicsContext,
        manager: &mut ProgramManager,
        source: &ProgramSource<'_>,
        with_params: bool,
    ) -> Result<FullscreenProgram, RenderError> {
        let id = manager.compile(ctx, source)?;
        for attribute in [sources::VERTEX_POSITION, sources::VERTEX_TEX_COORD] {
            manager.locate(id, attribute)?;
        }
        let params = if with_params {
            Some(manager.locate(id, sources::DISTORTION_PARAMS)?)
        } else {
            None
        };
        Ok(FullscreenProgram {
            id,
            projection: manager.locate(id, sources::PROJECTION)?,
            sampler: manager.locate(id, sources::TEX_SAMPLER_2D)?,
            params,
        })
    }
}

/// Renders the AR view: camera background, tracked augmentation and the
/// optional lens-distortion pass.
///
/// The renderer is driven with an explicit `&mut dyn GraphicsContext` and
/// never keeps one. Call [`FrameRenderer::teardown`] before the context is
/// destroyed; handles still allocated at drop are reported as leaks.
#[derive(Debug)]
pub struct FrameRenderer {
    config: RendererConfig,
    programs: Programs,
    framebuffers: FramebufferManager,
    composer: PoseComposer,
    scene: Scene,
    quad: ResourceHandle,
    camera: ResourceHandle,
    camera_size: (u32, u32),
    generation: u64,
    frame_index: u64,
}

impl FrameRenderer {
    /// Compiles every program, resolves every name and uploads the
    /// full-screen quad. Errors here are startup-fatal.
    pub fn new(ctx: &mut dyn GraphicsContext, config: RendererConfig) -> Result<Self, RenderError> {
        let mut programs = Programs::build(ctx)?;
        let quad = match allocate_quad(ctx) {
            Ok(quad) => quad,
            Err(e) => {
                programs.manager.release(ctx);
                return Err(e);
            }
        };

        log::info!(
            "frame renderer ready (off-target: {}, distortion: {})",
            config.off_target_enabled,
            config.distortion.is_some()
        );

        Ok(Self {
            composer: PoseComposer::new(config.off_target_enabled, config.fallback_pose)
                .with_default_marker(config.fallback_marker),
            config,
            programs,
            framebuffers: FramebufferManager::new(),
            scene: Scene::new(),
            quad,
            camera: ResourceHandle::unallocated(ResourceKind::Texture, "camera frame"),
            camera_size: (0, 0),
            generation: ctx.generation(),
            frame_index: 0,
        })
    }

    #[inline]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn set_off_target_enabled(&mut self, enabled: bool) {
        self.config.off_target_enabled = enabled;
        self.composer.set_off_target_enabled(enabled);
    }

    pub fn set_distortion(&mut self, distortion: Option<ViewerDistortion>) {
        self.config.distortion = distortion;
    }

    #[inline]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Scene access between frames.
    #[inline]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[inline]
    pub fn composer(&self) -> &PoseComposer {
        &self.composer
    }

    #[inline]
    pub fn programs(&self) -> &ProgramManager {
        &self.programs.manager
    }

    #[inline]
    pub fn framebuffers(&self) -> &FramebufferManager {
        &self.framebuffers
    }

    /// Uploads the camera image drawn behind the augmentation. The texture
    /// is reused while the image size stays the same.
    pub fn set_camera_frame(&mut self, ctx: &mut dyn GraphicsContext, frame: &TextureData) -> Result<(), RenderError> {
        let size = (frame.width, frame.height);
        if self.camera.is_live(ctx) && self.camera_size == size {
            let raw = self.camera.live_raw(ctx)?;
            return ctx
                .write_texture(raw, &frame.pixels)
                .map_err(|reason| RenderError::ResourceCreation {
                    kind: ResourceKind::Texture,
                    label: self.camera.label().to_string(),
                    reason,
                });
        }

        self.camera.release(ctx);
        self.camera = ResourceHandle::allocate(
            ctx,
            "camera frame",
            &ResourceDescriptor::Texture {
                width: frame.width,
                height: frame.height,
                format: TextureFormat::Rgba8Srgb,
                render_target: false,
                pixels: Some(&frame.pixels),
            },
        )?;
        self.camera_size = size;
        Ok(())
    }

    /// Stops drawing the camera background.
    pub fn clear_camera_frame(&mut self, ctx: &mut dyn GraphicsContext) {
        self.camera.release(ctx);
        self.camera = ResourceHandle::unallocated(ResourceKind::Texture, "camera frame");
        self.camera_size = (0, 0);
    }

    /// Renders and presents one frame.
    ///
    /// Failures never escape: the frame is abandoned, logged and described
    /// by the returned report.
    pub fn render_frame(&mut self, ctx: &mut dyn GraphicsContext, input: &FrameInput<'_>) -> FrameReport {
        let index = self.frame_index;
        self.frame_index += 1;

        let tracking = self.composer.update(input.tracking);
        self.composer.set_device_view(input.device_view);

        let mut report = FrameReport::new(index, tracking);
        if let Err(e) = self.record_frame(ctx, input, &mut report) {
            ctx.abandon_frame();
            log::warn!("frame {index} abandoned: {e}");
            report.outcome = FrameOutcome::Abandoned(e);
        }

        log::debug!(
            "frame {index}: {:?}, {} object draws, background {}, distortion {}",
            report.tracking,
            report.object_draws,
            report.background_pass,
            report.distortion_pass
        );
        report
    }

    fn record_frame(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        input: &FrameInput<'_>,
        report: &mut FrameReport,
    ) -> Result<(), RenderError> {
        if ctx.generation() != self.generation {
            self.restore(ctx)?;
            report.context_restored = true;
        }

        let size = ctx.surface_size();
        report.reconfigured = self.framebuffers.configure(ctx, size)?;

        ctx.begin_frame().map_err(RenderError::Surface)?;

        let distortion = self.config.distortion;
        let target = if distortion.is_some() { TargetKind::Offscreen } else { TargetKind::Default };
        self.framebuffers.bind(ctx, target)?;
        ctx.set_viewport(Viewport::full(size));
        ctx.clear(self.config.background, 1.0);

        if self.camera.is_live(ctx) {
            self.draw_fullscreen(ctx, self.programs.background, &self.camera, Mat4::IDENTITY, None)?;
            report.background_pass = true;
        }

        report.active_marker = self.composer.active_marker();
        if let Some(marker) = report.active_marker {
            let mono = [EyeView::mono(input.projection)];
            let views = if input.views.is_empty() { &mono[..] } else { input.views };
            for view in views {
                report.object_draws += self.draw_objects(ctx, marker, view, size)?;
            }
        }

        if let Some(distortion) = distortion {
            self.framebuffers.bind_default(ctx)?;
            ctx.set_viewport(Viewport::full(size));
            ctx.clear(LENS_SURROUND, 1.0);
            let offscreen = self.framebuffers.offscreen_color()?;
            self.draw_fullscreen(
                ctx,
                self.programs.distortion,
                offscreen,
                distortion.projection,
                Some(distortion.params()),
            )?;
            report.distortion_pass = true;
        }

        ctx.present().map_err(RenderError::Submit)
    }

    fn draw_objects(
        &self,
        ctx: &mut dyn GraphicsContext,
        marker: MarkerId,
        view: &EyeView,
        size: SurfaceSize,
    ) -> Result<usize, RenderError> {
        let program = self.programs.augmentation;
        ctx.set_viewport(view.viewport.resolve(size));
        self.programs.manager.use_program(ctx, program.id)?;

        let view_projection = view.view_projection();
        let mut draws = 0;
        for object in self.scene.visible_for(marker) {
            let texture = self.scene.texture(object.texture).ok_or_else(|| RenderError::InvalidHandle {
                kind: ResourceKind::Texture,
                label: format!("texture slot {}", object.texture.0),
            })?;
            let mesh = self.scene.mesh(object.mesh).ok_or_else(|| RenderError::InvalidHandle {
                kind: ResourceKind::Mesh,
                label: "scene mesh".to_string(),
            })?;

            ctx.select_texture_slot(program.sampler);
            texture.bind(ctx)?;
            mesh.bind(ctx)?;

            let mvp = self
                .composer
                .compose_model_view_projection(object.local_transform, view_projection);
            ctx.set_uniform(program.mvp, UniformValue::Mat4(mvp));
            ctx.draw();
            draws += 1;
        }
        Ok(draws)
    }

    fn draw_fullscreen(
        &self,
        ctx: &mut dyn GraphicsContext,
        program: FullscreenProgram,
        texture: &ResourceHandle,
        projection: Mat4,
        params: Option<Vec4>,
    ) -> Result<(), RenderError> {
        self.programs.manager.use_program(ctx, program.id)?;
        ctx.select_texture_slot(program.sampler);
        texture.bind(ctx)?;
        self.quad.bind(ctx)?;
        ctx.set_uniform(program.projection, UniformValue::Mat4(projection));
        if let (Some(location), Some(params)) = (program.params, params) {
            ctx.set_uniform(location, UniformValue::Vec4(params));
        }
        ctx.draw();
        Ok(())
    }

    /// Rebuilds everything owned by the renderer for a new context
    /// generation. Scene assets are dropped; the host reloads them. A camera
    /// frame already uploaded to the new context is kept.
    fn restore(&mut self, ctx: &mut dyn GraphicsContext) -> Result<(), RenderError> {
        log::info!(
            "context generation {} -> {}: rebuilding GPU resources",
            self.generation,
            ctx.generation()
        );
        self.framebuffers.release(ctx);
        self.scene.clear(ctx);
        if !self.camera.is_live(ctx) {
            self.clear_camera_frame(ctx);
        }

        self.programs.manager.ensure(ctx)?;
        if !self.quad.is_live(ctx) {
            self.quad.release(ctx);
            self.quad = allocate_quad(ctx)?;
        }
        self.generation = ctx.generation();
        Ok(())
    }

    /// Releases every GPU object. The renderer must not be used afterwards.
    pub fn teardown(&mut self, ctx: &mut dyn GraphicsContext) {
        self.scene.clear(ctx);
        self.camera.release(ctx);
        self.quad.release(ctx);
        self.framebuffers.release(ctx);
        self.programs.manager.release(ctx);
        log::info!("frame renderer torn down after {} frames", self.frame_index);
    }
}

fn allocate_quad(ctx: &mut dyn GraphicsContext) -> Result<ResourceHandle, RenderError> {
    // Clip-space quad; texture rows run top to bottom.
    let quad = MeshData::quad(1.0, 1.0);
    ResourceHandle::allocate(
        ctx,
        "fullscreen quad",
        &ResourceDescriptor::Mesh {
            vertices: &quad.vertices,
            indices: &quad.indices,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DrawCall, FrameStatus, HeadlessContext, RawHandle};
    use crate::math::{Pose, TrackerPose};
    use crate::render::SKY_COLOR;
    use crate::scene::{DrawableObject, TextureSlot, AR_OBJECT_SCALE};
    use crate::tracking::TrackingState;
    use glam::Vec3;

    const SIZE: SurfaceSize = SurfaceSize::new(1024, 768);

    fn projection() -> Mat4 {
        Mat4::perspective_rh(0.8, SIZE.aspect(), 2.0, 2000.0)
    }

    fn tracked(marker: u32) -> Option<TrackerPose> {
        Some(TrackerPose::new(
            MarkerId(marker),
            Pose::from_translation(Vec3::new(0.0, 0.0, -300.0)),
        ))
    }

    fn setup(config: RendererConfig) -> (HeadlessContext, FrameRenderer) {
        let mut ctx = HeadlessContext::new(SIZE);
        let mut renderer = FrameRenderer::new(&mut ctx, config).unwrap();
        populate(&mut ctx, &mut renderer);
        (ctx, renderer)
    }

    /// Two objects on marker 0, one on marker 1, one hidden on marker 0.
    fn populate(ctx: &mut HeadlessContext, renderer: &mut FrameRenderer) {
        let scene = renderer.scene_mut();
        let red = scene.load_texture(ctx, "red", &TextureData::solid(4, 4, [255, 0, 0, 255])).unwrap();
        let blue = scene.load_texture(ctx, "blue", &TextureData::solid(4, 4, [0, 0, 255, 255])).unwrap();
        let quad = scene.load_mesh(ctx, "quad", &MeshData::quad(1000.0, 1000.0)).unwrap();

        let object = |marker, texture| DrawableObject::new(MarkerId(marker), quad, texture).with_scale(AR_OBJECT_SCALE);
        scene.add_object(object(0, red)).unwrap();
        scene.add_object(object(1, blue)).unwrap();
        scene.add_object(object(0, blue)).unwrap();
        scene.add_object(object(0, red).hidden()).unwrap();
    }

    fn label(ctx: &HeadlessContext, raw: Option<RawHandle>) -> &str {
        raw.and_then(|r| ctx.object_label(r)).unwrap_or("<none>")
    }

    fn draws(ctx: &HeadlessContext) -> Vec<DrawCall> {
        ctx.last_frame().unwrap().draws().cloned().collect()
    }

    // ── construction ────────────────────────────────────────────────────

    #[test]
    fn new_compiles_three_programs_and_the_quad() {
        let mut ctx = HeadlessContext::new(SIZE);
        let mut renderer = FrameRenderer::new(&mut ctx, RendererConfig::default()).unwrap();
        assert_eq!(renderer.programs().len(), 3);
        assert_eq!(ctx.live_count(ResourceKind::Program), 3);
        assert_eq!(ctx.live_count(ResourceKind::Mesh), 1);
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn program_rejected_by_backend_is_startup_fatal() {
        let mut ctx = HeadlessContext::new(SIZE);
        ctx.fail_next_create("device lost");
        let err = FrameRenderer::new(&mut ctx, RendererConfig::default()).unwrap_err();
        assert!(err.is_startup_fatal());
        assert_eq!(ctx.live_objects(), 0);
    }

    // ── tracking branches ───────────────────────────────────────────────

    #[test]
    fn no_pose_presents_clear_only() {
        let (mut ctx, mut renderer) = setup(RendererConfig::default());
        for _ in 0..5 {
            let report = renderer.render_frame(&mut ctx, &FrameInput::new(None, projection()));
            assert!(report.is_presented());
            assert_eq!(report.tracking, TrackingState::OffTarget);
            assert_eq!(report.object_draws, 0);
        }
        assert_eq!(ctx.presented_frames(), 5);
        for frame in ctx.frames() {
            assert_eq!(frame.draw_count(), 0);
            let clears: Vec<_> = frame.clears().collect();
            assert_eq!(clears.len(), 1);
            assert_eq!(clears[0].1, SKY_COLOR);
        }
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn tracked_marker_draws_each_visible_object_once() {
        let (mut ctx, mut renderer) = setup(RendererConfig::default());
        let input = FrameInput::new(tracked(0), projection());
        let report = renderer.render_frame(&mut ctx, &input);

        assert_eq!(report.tracking, TrackingState::OnTarget);
        assert_eq!(report.active_marker, Some(MarkerId(0)));
        assert_eq!(report.object_draws, 2);

        let draws = draws(&ctx);
        assert_eq!(draws.len(), 2);
        let objects: Vec<_> = renderer.scene().visible_for(MarkerId(0)).collect();
        for (draw, object) in draws.iter().zip(objects) {
            assert_eq!(label(&ctx, draw.program), "augmentation");
            assert_eq!(label(&ctx, draw.framebuffer), "default framebuffer");
            let expected = renderer
                .composer()
                .compose_model_view_projection(object.local_transform, projection());
            assert_eq!(draw.uniforms.get(&Location(0)), Some(&UniformValue::Mat4(expected)));
            let texture = renderer.scene().texture(object.texture).unwrap().raw();
            assert_eq!(draw.textures.get(&Location(1)).copied(), texture);
        }
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn off_target_mode_keeps_last_marker_with_fallback_pose() {
        let config = RendererConfig { off_target_enabled: true, ..RendererConfig::default() };
        let (mut ctx, mut renderer) = setup(config);

        for _ in 0..3 {
            let lost = renderer.render_frame(&mut ctx, &FrameInput::new(None, projection()));
            assert_eq!(lost.active_marker, Some(MarkerId(0)), "nothing seen yet");
            assert_eq!(lost.object_draws, 2);
        }

        renderer.render_frame(&mut ctx, &FrameInput::new(tracked(1), projection()));
        let report = renderer.render_frame(&mut ctx, &FrameInput::new(None, projection()));
        assert_eq!(report.tracking, TrackingState::OffTarget);
        assert_eq!(report.active_marker, Some(MarkerId(1)));
        assert_eq!(report.object_draws, 1);

        let local = renderer.scene().objects()[1].local_transform;
        let expected = projection() * local;
        assert_eq!(draws(&ctx)[0].uniforms.get(&Location(0)), Some(&UniformValue::Mat4(expected)));
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn off_target_before_first_sighting_uses_configured_marker() {
        let config = RendererConfig {
            off_target_enabled: true,
            fallback_marker: MarkerId(1),
            ..RendererConfig::default()
        };
        let (mut ctx, mut renderer) = setup(config);
        let report = renderer.render_frame(&mut ctx, &FrameInput::new(None, projection()));
        assert_eq!(report.active_marker, Some(MarkerId(1)));
        assert_eq!(report.object_draws, 1);
        assert_eq!(label(&ctx, draws(&ctx)[0].textures.get(&Location(1)).copied()), "blue");
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn device_view_sits_between_projection_and_target_pose() {
        let (mut ctx, mut renderer) = setup(RendererConfig::default());
        let view = Mat4::from_rotation_y(0.4) * Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
        let pose = Pose::from_translation(Vec3::new(0.0, 0.0, -300.0));
        let input = FrameInput::new(tracked(0), projection()).with_device_view(view);
        renderer.render_frame(&mut ctx, &input);

        let draws = draws(&ctx);
        assert_eq!(draws.len(), 2);
        let local = renderer.scene().objects()[0].local_transform;
        let expected = projection() * view * pose.matrix() * local;
        assert_eq!(draws[0].uniforms.get(&Location(0)), Some(&UniformValue::Mat4(expected)));

        let identity_view = projection() * pose.matrix() * local;
        assert_ne!(Some(&UniformValue::Mat4(identity_view)), draws[0].uniforms.get(&Location(0)));
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn stereo_views_draw_objects_per_eye() {
        let (mut ctx, mut renderer) = setup(RendererConfig::default());
        let views = EyeView::stereo(projection(), 63.0);
        let input = FrameInput::new(tracked(0), projection()).with_views(&views);
        let report = renderer.render_frame(&mut ctx, &input);
        assert_eq!(report.object_draws, 4);

        let draws = draws(&ctx);
        assert_eq!(draws[0].viewport.unwrap().x, 0.0);
        assert_eq!(draws[2].viewport.unwrap().x, 512.0);
        renderer.teardown(&mut ctx);
    }

    // ── passes ──────────────────────────────────────────────────────────

    #[test]
    fn distortion_adds_one_fullscreen_draw_after_objects() {
        let config = RendererConfig { distortion: Some(ViewerDistortion::default()), ..RendererConfig::default() };
        let (mut ctx, mut renderer) = setup(config);
        let report = renderer.render_frame(&mut ctx, &FrameInput::new(tracked(0), projection()));
        assert!(report.distortion_pass);
        assert_eq!(report.object_draws, 2);

        let draws = draws(&ctx);
        assert_eq!(draws.len(), 3);
        for draw in &draws[..2] {
            assert_eq!(label(&ctx, draw.framebuffer), "offscreen framebuffer");
        }
        let warp = &draws[2];
        assert_eq!(label(&ctx, warp.program), "distortion");
        assert_eq!(label(&ctx, warp.framebuffer), "default framebuffer");
        assert_eq!(label(&ctx, warp.mesh), "fullscreen quad");
        assert_eq!(
            warp.textures.get(&Location(1)).copied(),
            renderer.framebuffers().offscreen_color().unwrap().raw()
        );
        assert_eq!(
            warp.uniforms.get(&Location(3)),
            Some(&UniformValue::Vec4(ViewerDistortion::default().params()))
        );
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn camera_frame_draws_background_first() {
        let (mut ctx, mut renderer) = setup(RendererConfig::default());
        renderer
            .set_camera_frame(&mut ctx, &TextureData::solid(8, 6, [10, 20, 30, 255]))
            .unwrap();
        let created = ctx.created_count();
        renderer
            .set_camera_frame(&mut ctx, &TextureData::solid(8, 6, [40, 50, 60, 255]))
            .unwrap();
        assert_eq!(ctx.created_count(), created, "same-size frames reuse the texture");

        let report = renderer.render_frame(&mut ctx, &FrameInput::new(tracked(0), projection()));
        assert!(report.background_pass);
        let draws = draws(&ctx);
        assert_eq!(draws.len(), 3);
        assert_eq!(label(&ctx, draws[0].program), "video-background");
        assert_eq!(label(&ctx, draws[0].textures.get(&Location(1)).copied()), "camera frame");
        renderer.teardown(&mut ctx);
    }

    // ── lifecycle ───────────────────────────────────────────────────────

    #[test]
    fn resize_recreates_targets_before_rendering() {
        let (mut ctx, mut renderer) = setup(RendererConfig::default());
        let first = renderer.render_frame(&mut ctx, &FrameInput::new(None, projection()));
        assert!(first.reconfigured);
        let steady = renderer.render_frame(&mut ctx, &FrameInput::new(None, projection()));
        assert!(!steady.reconfigured);

        let large = SurfaceSize::new(2048, 1536);
        ctx.resize(large);
        let report = renderer.render_frame(&mut ctx, &FrameInput::new(None, projection()));
        assert!(report.reconfigured);
        assert!(report.is_presented());
        assert_eq!(renderer.framebuffers().current_size(), Some(large));
        let offscreen = renderer.framebuffers().offscreen_color().unwrap().raw().unwrap();
        assert_eq!(ctx.object_size(offscreen), Some(large));
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn context_loss_rebuilds_programs_once_and_asks_for_scene() {
        let (mut ctx, mut renderer) = setup(RendererConfig::default());
        renderer.render_frame(&mut ctx, &FrameInput::new(tracked(0), projection()));
        assert_eq!(renderer.programs().allocation_count(), 3);

        ctx.lose_context();
        let report = renderer.render_frame(&mut ctx, &FrameInput::new(tracked(0), projection()));
        assert!(report.context_restored);
        assert!(report.is_presented());
        assert_eq!(report.object_draws, 0);
        assert!(renderer.scene().is_empty());
        assert_eq!(renderer.programs().allocation_count(), 6);
        assert_eq!(ctx.destroyed_count(), 0, "stale handles never reach the new context");

        populate(&mut ctx, &mut renderer);
        let again = renderer.render_frame(&mut ctx, &FrameInput::new(tracked(0), projection()));
        assert!(!again.context_restored);
        assert_eq!(again.object_draws, 2);
        assert_eq!(renderer.programs().allocation_count(), 6);
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn camera_frame_uploaded_after_context_loss_survives_restore() {
        let (mut ctx, mut renderer) = setup(RendererConfig::default());
        let frame = TextureData::solid(8, 6, [10, 20, 30, 255]);
        renderer.set_camera_frame(&mut ctx, &frame).unwrap();
        renderer.render_frame(&mut ctx, &FrameInput::new(None, projection()));

        ctx.lose_context();
        renderer.set_camera_frame(&mut ctx, &frame).unwrap();
        let report = renderer.render_frame(&mut ctx, &FrameInput::new(None, projection()));

        assert!(report.context_restored);
        assert!(report.background_pass);
        assert_eq!(ctx.live_count(ResourceKind::Texture), 2 + 1, "offscreen color/depth + camera");
        let draws = draws(&ctx);
        assert_eq!(label(&ctx, draws[0].textures.get(&Location(1)).copied()), "camera frame");
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn teardown_leaves_no_live_objects() {
        let config = RendererConfig { distortion: Some(ViewerDistortion::default()), ..RendererConfig::default() };
        let (mut ctx, mut renderer) = setup(config);
        renderer
            .set_camera_frame(&mut ctx, &TextureData::solid(2, 2, [0; 4]))
            .unwrap();
        renderer.render_frame(&mut ctx, &FrameInput::new(tracked(0), projection()));
        renderer.teardown(&mut ctx);
        assert_eq!(ctx.live_objects(), 0);
    }

    // ── failures ────────────────────────────────────────────────────────

    #[test]
    fn failed_allocation_abandons_only_that_frame() {
        let (mut ctx, mut renderer) = setup(RendererConfig::default());
        ctx.fail_next_create("out of memory");
        let failed = renderer.render_frame(&mut ctx, &FrameInput::new(tracked(0), projection()));
        assert!(matches!(failed.error(), Some(RenderError::ResourceCreation { .. })));
        assert_eq!(ctx.presented_frames(), 0);

        let next = renderer.render_frame(&mut ctx, &FrameInput::new(tracked(0), projection()));
        assert!(next.is_presented());
        assert_eq!(next.object_draws, 2);
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn missing_texture_mid_frame_discards_recorded_work() {
        let (mut ctx, mut renderer) = setup(RendererConfig::default());
        renderer.scene_mut().unload_texture(&mut ctx, TextureSlot(1));
        let report = renderer.render_frame(&mut ctx, &FrameInput::new(tracked(0), projection()));
        assert!(matches!(report.error(), Some(RenderError::InvalidHandle { .. })));

        let frame = ctx.last_frame().unwrap();
        assert_eq!(frame.status, FrameStatus::Abandoned);
        assert_eq!(frame.draw_count(), 1);
        renderer.teardown(&mut ctx);
    }

    #[test]
    fn surface_failure_is_reported_and_next_frame_recovers() {
        let (mut ctx, mut renderer) = setup(RendererConfig::default());
        ctx.fail_begin_frame(true);
        let report = renderer.render_frame(&mut ctx, &FrameInput::new(None, projection()));
        assert!(matches!(report.error(), Some(RenderError::Surface(_))));

        ctx.fail_begin_frame(false);
        assert!(renderer.render_frame(&mut ctx, &FrameInput::new(None, projection())).is_presented());
        renderer.teardown(&mut ctx);
    }
}
