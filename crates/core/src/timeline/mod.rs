use std::time::Duration;

/// Transport playhead over a clip of known length.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlaybackClock {
    position: Duration,
    duration: Duration,
}

impl PlaybackClock {
    pub fn new(duration: Duration) -> Self {
        Self {
            position: Duration::ZERO,
            duration,
        }
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn reset(&mut self) {
        self.position = Duration::ZERO;
    }

    /// Moves the playhead forward, stopping at the end of the clip.
    /// Returns `true` once the end has been reached.
    pub fn advance(&mut self, delta: Duration) -> bool {
        self.position = (self.position + delta).min(self.duration);
        self.is_finished()
    }

    /// Places the playhead at `seconds`, clamped to the clip.
    pub fn seek(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.position = if seconds >= self.duration.as_secs_f64() {
            self.duration
        } else {
            Duration::try_from_secs_f64(seconds).unwrap_or(self.duration)
        };
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.duration
    }
}

/// Converts host animation timestamps into per-tick deltas.
#[derive(Debug, Default, Clone)]
pub struct FrameClock {
    origin_ms: Option<f64>,
    last_ms: Option<f64>,
}

/// Timing of a single tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Milliseconds since the first tick.
    pub elapsed_ms: f64,
    /// Milliseconds since the previous tick (0 on the first).
    pub delta_ms: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a timestamp. Timestamps that go backwards produce a zero
    /// delta instead of a negative one.
    pub fn tick(&mut self, timestamp_ms: f64) -> FrameTime {
        let origin = *self.origin_ms.get_or_insert(timestamp_ms);
        let delta = self
            .last_ms
            .map(|last| (timestamp_ms - last).max(0.0))
            .unwrap_or(0.0);
        self.last_ms = Some(timestamp_ms.max(self.last_ms.unwrap_or(timestamp_ms)));

        FrameTime {
            elapsed_ms: (timestamp_ms - origin).max(0.0),
            delta_ms: delta as f32,
        }
    }

    pub fn reset(&mut self) {
        self.origin_ms = None;
        self.last_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playhead_stops_at_end() {
        let mut clock = PlaybackClock::new(Duration::from_secs(1));
        assert!(!clock.advance(Duration::from_millis(600)));
        assert!(clock.advance(Duration::from_millis(600)));
        assert_eq!(clock.position(), Duration::from_secs(1));
    }

    #[test]
    fn seek_clamps_to_clip() {
        let mut clock = PlaybackClock::new(Duration::from_secs(2));
        clock.seek(-4.0);
        assert_eq!(clock.position(), Duration::ZERO);
        clock.seek(10.0);
        assert_eq!(clock.position(), Duration::from_secs(2));
        clock.seek(f64::NAN);
        assert_eq!(clock.position(), Duration::ZERO);
    }

    #[test]
    fn seek_far_past_the_end_lands_on_the_end() {
        let mut clock = PlaybackClock::new(Duration::from_millis(1500));
        clock.seek(1e20);
        assert_eq!(clock.position(), Duration::from_millis(1500));
        assert!(clock.is_finished());
        clock.seek(f64::MAX);
        assert_eq!(clock.position(), Duration::from_millis(1500));
    }

    #[test]
    fn frame_clock_reports_deltas() {
        let mut clock = FrameClock::new();
        let first = clock.tick(1000.0);
        assert_eq!(first.delta_ms, 0.0);
        assert_eq!(first.elapsed_ms, 0.0);

        let second = clock.tick(1016.0);
        assert_eq!(second.delta_ms, 16.0);
        assert_eq!(second.elapsed_ms, 16.0);

        let backwards = clock.tick(1010.0);
        assert_eq!(backwards.delta_ms, 0.0);
    }
}
