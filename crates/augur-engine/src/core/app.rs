use winit::event::WindowEvent;
use winit::window::WindowId;

use crate::context::GraphicsContext;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by hosts.
///
/// A context is created when the app is resumed and destroyed when it is
/// suspended, closed or when the device is lost. Every GPU handle the app
/// holds must be released in [`App::on_context_destroyed`].
pub trait App {
    /// Called once a GPU context exists for the window. An error ends the
    /// run.
    fn on_context_created(&mut self, ctx: &mut dyn GraphicsContext) -> anyhow::Result<()>;

    /// Called for window events.
    fn on_window_event(&mut self, window_id: WindowId, event: &WindowEvent) -> AppControl {
        let _ = (window_id, event);
        AppControl::Continue
    }

    /// Called once per paced frame.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;

    /// Called right before the context is dropped.
    fn on_context_destroyed(&mut self, ctx: &mut dyn GraphicsContext);
}
