use anyhow::{Context, Result};

use augur_engine::context::{GraphicsContext, HeadlessContext};
use augur_engine::math::SurfaceSize;

use crate::session::{Session, SessionStats};

/// Recorded frames kept for inspection; only the totals matter here.
const FRAME_HISTORY: usize = 8;

/// Offscreen run against the recording context.
#[derive(Debug, Clone)]
pub struct HeadlessRun {
    pub size: SurfaceSize,
    pub frames: u64,
    /// Simulate a device reset before this frame.
    pub lose_context_at: Option<u64>,
}

/// Renders `run.frames` frames and returns the session totals.
pub fn run(mut session: Session, run: &HeadlessRun) -> Result<SessionStats> {
    let mut ctx = HeadlessContext::new(run.size).with_frame_history(FRAME_HISTORY);
    session
        .start(&mut ctx)
        .context("failed to build the AR renderer")?;

    for frame in 0..run.frames {
        if run.lose_context_at == Some(frame) {
            log::info!("simulating context loss before frame {frame}");
            ctx.lose_context();
        }
        session.frame(&mut ctx, frame);
    }

    session.stop(&mut ctx);
    anyhow::ensure!(
        ctx.live_objects() == 0,
        "{} GPU objects leaked after teardown",
        ctx.live_objects()
    );

    let stats = session.stats().clone();
    log::info!(
        "headless run: {} frames, {} presented, {} abandoned, {} on target, {} object draws, {} restores",
        stats.frames,
        stats.presented,
        stats.abandoned,
        stats.on_target,
        stats.object_draws,
        stats.restores
    );
    Ok(stats)
}
