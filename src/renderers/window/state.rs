use std::time::{Duration, Instant};

// AIDEV-NOTE: Start time for u_time plus the pacing deadline for the next frame
pub struct FrameClock {
    start_time: Instant,
    frame_interval: Duration,
    next_frame: Instant,
}

impl FrameClock {
    pub fn new(frame_interval: Duration) -> Self {
        Self::starting_at(Instant::now(), frame_interval)
    }

    pub fn starting_at(start_time: Instant, frame_interval: Duration) -> Self {
        Self {
            start_time,
            frame_interval,
            next_frame: start_time,
        }
    }

    /// Seconds since the clock started.
    pub fn elapsed_at(&self, now: Instant) -> f32 {
        now.saturating_duration_since(self.start_time).as_secs_f32()
    }

    pub fn next_frame(&self) -> Instant {
        self.next_frame
    }

    pub fn frame_due(&self, now: Instant) -> bool {
        now >= self.next_frame
    }

    /// Moves the deadline one interval ahead; if the loop fell behind, the
    /// schedule restarts from `now` rather than bursting to catch up.
    pub fn advance(&mut self, now: Instant) -> Instant {
        self.next_frame += self.frame_interval;
        if self.next_frame <= now {
            self.next_frame = now + self.frame_interval;
        }
        self.next_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(16);

    #[test]
    fn test_first_frame_is_due_immediately() {
        let start = Instant::now();
        let clock = FrameClock::starting_at(start, INTERVAL);

        assert!(clock.frame_due(start));
        assert_eq!(clock.elapsed_at(start), 0.0);
    }

    #[test]
    fn test_advance_keeps_fixed_cadence() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start, INTERVAL);

        let next = clock.advance(start + Duration::from_millis(2));
        assert_eq!(next, start + INTERVAL);
        assert!(!clock.frame_due(start + Duration::from_millis(10)));
        assert!(clock.frame_due(start + INTERVAL));
    }

    #[test]
    fn test_advance_after_stall_does_not_burst() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start, INTERVAL);

        let late = start + Duration::from_millis(500);
        let next = clock.advance(late);
        assert_eq!(next, late + INTERVAL);
    }

    #[test]
    fn test_elapsed_counts_seconds_from_start() {
        let start = Instant::now();
        let clock = FrameClock::starting_at(start, INTERVAL);

        let elapsed = clock.elapsed_at(start + Duration::from_millis(2500));
        assert!((elapsed - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_new_starts_due_now() {
        let mut clock = FrameClock::new(Duration::from_millis(20));
        let start = clock.next_frame();

        assert_eq!(clock.advance(start), start + Duration::from_millis(20));
    }
}
