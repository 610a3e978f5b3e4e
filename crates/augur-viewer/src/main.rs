mod app;
mod assets;
mod headless;
mod session;
mod tracker;

use std::path::PathBuf;

use anyhow::{Result, ensure};
use clap::Parser;
use winit::dpi::LogicalSize;

use augur_engine::device::GpuInit;
use augur_engine::logging::{LoggingConfig, init_logging};
use augur_engine::math::SurfaceSize;
use augur_engine::render::{RendererConfig, ViewerDistortion};
use augur_engine::scene::AUGMENTATION_TEXTURE_CAPACITY;
use augur_engine::window::{Runtime, RuntimeConfig};

use crate::app::ViewerApp;
use crate::headless::HeadlessRun;
use crate::session::{Session, SessionConfig};
use crate::tracker::SimulatedTracker;

/// Marker-tracked AR viewer driven by a simulated tracker.
#[derive(Debug, Parser)]
#[command(name = "augur-viewer", version, about)]
struct Args {
    /// Render into the recording context instead of a window.
    #[arg(long)]
    headless: bool,

    /// Frames to render in headless mode.
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// Simulate a device reset before this frame (headless only).
    #[arg(long)]
    lose_context_at: Option<u64>,

    /// Warp the image for a head-mounted viewer's lenses.
    #[arg(long)]
    distortion: bool,

    /// Keep showing the last marker's content while tracking is lost.
    #[arg(long)]
    off_target: bool,

    /// Render side-by-side eyes separated by this many marker units.
    #[arg(long, value_name = "SEPARATION")]
    stereo: Option<f32>,

    /// Stream a synthetic camera image behind the augmentation.
    #[arg(long)]
    camera_feed: bool,

    /// Augmentation textures (PNG or JPEG). Procedural ones are used when
    /// none are given.
    #[arg(long = "texture", value_name = "PATH")]
    textures: Vec<PathBuf>,

    /// Number of simulated markers.
    #[arg(long, default_value_t = 4)]
    markers: u32,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Target frame rate of the windowed runtime.
    #[arg(long, default_value_t = augur_engine::time::DEFAULT_FRAME_RATE)]
    fps: u32,

    /// Log filter in `env_logger` syntax, e.g. "debug" or "augur_engine=debug".
    #[arg(long)]
    log: Option<String>,
}

impl Args {
    fn session_config(&self) -> Result<SessionConfig> {
        ensure!(
            self.textures.len() <= AUGMENTATION_TEXTURE_CAPACITY,
            "at most {AUGMENTATION_TEXTURE_CAPACITY} textures can be loaded, got {}",
            self.textures.len()
        );

        let textures = if self.textures.is_empty() {
            assets::procedural_textures()
        } else {
            self.textures
                .iter()
                .map(|path| assets::load_texture(path))
                .collect::<Result<Vec<_>>>()?
        };

        Ok(SessionConfig {
            renderer: RendererConfig {
                off_target_enabled: self.off_target,
                distortion: self.distortion.then(ViewerDistortion::default),
                ..RendererConfig::default()
            },
            textures,
            stereo: self.stereo,
            camera_feed: self.camera_feed.then(|| SurfaceSize::new(320, 240)),
            ..SessionConfig::default()
        })
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(LoggingConfig {
        env_filter: args.log.clone(),
        ..LoggingConfig::default()
    });

    ensure!(args.width > 0 && args.height > 0, "window size must be non-zero");
    ensure!(args.fps > 0, "frame rate must be positive");

    let tracker = SimulatedTracker::new(args.markers);
    let session = Session::new(args.session_config()?, tracker);

    if args.headless {
        headless::run(
            session,
            &HeadlessRun {
                size: SurfaceSize::new(args.width, args.height),
                frames: args.frames,
                lose_context_at: args.lose_context_at,
            },
        )?;
        return Ok(());
    }

    Runtime::run(
        RuntimeConfig {
            title: "augur viewer".to_string(),
            initial_size: LogicalSize::new(f64::from(args.width), f64::from(args.height)),
            frame_rate: args.fps,
        },
        GpuInit::default(),
        ViewerApp::new(session),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_renderer_config() {
        let args = Args::parse_from([
            "augur-viewer",
            "--distortion",
            "--off-target",
            "--stereo",
            "64",
            "--camera-feed",
        ]);
        let config = args.session_config().unwrap();

        assert!(config.renderer.off_target_enabled);
        assert_eq!(config.renderer.distortion, Some(ViewerDistortion::default()));
        assert_eq!(config.stereo, Some(64.0));
        assert!(config.camera_feed.is_some());
        assert_eq!(config.textures.len(), AUGMENTATION_TEXTURE_CAPACITY);
    }

    #[test]
    fn more_than_four_textures_is_rejected() {
        let args = Args::parse_from([
            "augur-viewer",
            "--texture", "a.png",
            "--texture", "b.png",
            "--texture", "c.png",
            "--texture", "d.png",
            "--texture", "e.png",
        ]);
        assert!(args.session_config().is_err());
    }
}
