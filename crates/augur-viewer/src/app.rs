use anyhow::Context;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use augur_engine::context::GraphicsContext;
use augur_engine::core::{App, AppControl, FrameCtx};

use crate::session::Session;

/// Windowed host: one session per GPU context.
///
/// `D` toggles lens distortion, `O` toggles off-target mode, `Esc` quits.
pub struct ViewerApp {
    session: Session,
}

impl ViewerApp {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl App for ViewerApp {
    fn on_context_created(&mut self, ctx: &mut dyn GraphicsContext) -> anyhow::Result<()> {
        self.session
            .start(ctx)
            .context("failed to build the AR renderer")
    }

    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        let WindowEvent::KeyboardInput { event, .. } = event else {
            return AppControl::Continue;
        };
        if event.state != ElementState::Pressed || event.repeat {
            return AppControl::Continue;
        }

        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => return AppControl::Exit,
            PhysicalKey::Code(KeyCode::KeyD) => {
                let on = self.session.toggle_distortion();
                log::info!("lens distortion {}", if on { "on" } else { "off" });
            }
            PhysicalKey::Code(KeyCode::KeyO) => {
                let on = self.session.toggle_off_target();
                log::info!("off-target mode {}", if on { "on" } else { "off" });
            }
            _ => {}
        }
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let frame = ctx.time.frame_index;
        if let Some(report) = self.session.frame(ctx.context(), frame) {
            if let Some(err) = report.error() {
                if err.is_startup_fatal() {
                    log::error!("unrecoverable render error: {err}");
                    return AppControl::Exit;
                }
            }
        }
        AppControl::Continue
    }

    fn on_context_destroyed(&mut self, ctx: &mut dyn GraphicsContext) {
        self.session.stop(ctx);
        let stats = self.session.stats();
        log::info!(
            "session stopped: {} frames, {} presented, {} abandoned",
            stats.frames,
            stats.presented,
            stats.abandoned
        );
    }
}
