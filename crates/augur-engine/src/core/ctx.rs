use winit::window::{Window, WindowId};

use crate::context::GraphicsContext;
use crate::device::{Gpu, SurfaceErrorAction};
use crate::time::FrameTime;

use super::app::AppControl;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub time: FrameTime,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// The GPU as a rendering context.
    pub fn context(&mut self) -> &mut dyn GraphicsContext {
        self.gpu
    }

    /// Turns a surface failure reported during the frame into a control
    /// directive: fatal errors end the run, everything else is retried.
    pub fn surface_control(&mut self) -> AppControl {
        match self.gpu.take_surface_action() {
            Some(SurfaceErrorAction::Fatal) => {
                log::error!("surface lost for good; exiting");
                AppControl::Exit
            }
            Some(action) => {
                log::debug!("surface error handled: {action:?}");
                AppControl::Continue
            }
            None => AppControl::Continue,
        }
    }
}
