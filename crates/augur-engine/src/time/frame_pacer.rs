use std::time::{Duration, Instant};

/// Frame rate used when the host does not ask for one.
pub const DEFAULT_FRAME_RATE: u32 = 60;

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous tick, in seconds.
    pub dt: f32,

    /// Monotonic timestamp taken at the tick.
    pub now: Instant,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

/// Schedules frames at a fixed rate.
///
/// Deadlines advance by exactly one interval per tick so the average rate
/// stays on target. When a frame runs late by more than one interval the
/// schedule restarts from the late tick instead of bursting to catch up.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    next_deadline: Instant,
    last: Option<Instant>,
    frame_index: u64,
    dt_max: Duration,
}

impl FramePacer {
    /// Creates a pacer for `frames_per_second` (clamped to at least 1).
    pub fn new(frames_per_second: u32) -> Self {
        Self::starting_at(frames_per_second, Instant::now())
    }

    pub fn starting_at(frames_per_second: u32, start: Instant) -> Self {
        let interval = Duration::from_secs(1) / frames_per_second.max(1);
        Self {
            interval,
            next_deadline: start,
            last: None,
            frame_index: 0,
            dt_max: Duration::from_millis(250),
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next frame should be rendered.
    #[inline]
    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    #[inline]
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_deadline
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// Records a frame rendered at `now` and schedules the next one.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = match self.last {
            Some(last) => now.saturating_duration_since(last).min(self.dt_max),
            None => self.interval,
        };
        self.last = Some(now);

        let scheduled = self.next_deadline + self.interval;
        self.next_deadline = if now >= scheduled { now + self.interval } else { scheduled };

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            now,
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_RATE)
    }
}
