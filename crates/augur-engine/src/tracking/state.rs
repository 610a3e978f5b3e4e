/// Whether the tracker reported a usable pose this frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum TrackingState {
    OnTarget,
    #[default]
    OffTarget,
}

impl TrackingState {
    #[inline]
    pub fn is_on_target(self) -> bool {
        matches!(self, TrackingState::OnTarget)
    }
}

/// Current state plus how many consecutive frames it has held.
#[derive(Debug, Clone, Default)]
pub(super) struct StateMachine {
    state: TrackingState,
    frames: u64,
}

impl StateMachine {
    #[inline]
    pub(super) fn state(&self) -> TrackingState {
        self.state
    }

    #[inline]
    pub(super) fn frames_in_state(&self) -> u64 {
        self.frames
    }

    /// Moves to `next` for one frame. Returns the previous state and its
    /// frame count when this is a transition.
    pub(super) fn advance(&mut self, next: TrackingState) -> Option<(TrackingState, u64)> {
        if next == self.state {
            self.frames += 1;
            return None;
        }
        let previous = (self.state, self.frames);
        self.state = next;
        self.frames = 1;
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_frames_and_reports_transitions() {
        let mut sm = StateMachine::default();
        assert_eq!(sm.advance(TrackingState::OffTarget), None);
        assert_eq!(sm.advance(TrackingState::OffTarget), None);
        assert_eq!(sm.frames_in_state(), 2);

        assert_eq!(sm.advance(TrackingState::OnTarget), Some((TrackingState::OffTarget, 2)));
        assert_eq!(sm.state(), TrackingState::OnTarget);
        assert_eq!(sm.frames_in_state(), 1);
    }
}
