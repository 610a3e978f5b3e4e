//! Tracking state machine and pose composition.

mod composer;
mod state;

pub use composer::PoseComposer;
pub use state::TrackingState;
