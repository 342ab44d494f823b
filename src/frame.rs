use std::time::{Duration, Instant};

/// Something advanced once per displayed frame.
pub trait FrameTask {
    /// Advances by `dt` seconds.
    fn tick(&mut self, dt: f32);
}

/// Wall-clock frame timer for the windowed loop.
///
/// Deltas are clamped so a stalled or minimized window does not produce a
/// huge animation jump on the next frame.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    max_dt: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last: now,
            max_dt: Duration::from_millis(250),
        }
    }

    /// Seconds since the previous call (or since creation).
    pub fn delta(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last).min(self.max_dt);
        self.last = now;
        dt.as_secs_f32()
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives a [`FrameTask`] with a constant step, for headless runs and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedStepper {
    dt: f32,
    frame: u64,
}

impl FixedStepper {
    pub const SIXTY_HZ: f32 = 1.0 / 60.0;

    pub fn new(dt: f32) -> Self {
        Self { dt, frame: 0 }
    }

    /// Index of the frame the next [`FixedStepper::step`] will run.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Ticks `task` once and returns the index of the frame that ran.
    pub fn step<T: FrameTask + ?Sized>(&mut self, task: &mut T) -> u64 {
        let index = self.frame;
        task.tick(self.dt);
        self.frame += 1;
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        ticks: Vec<f32>,
    }

    impl FrameTask for Recorder {
        fn tick(&mut self, dt: f32) {
            self.ticks.push(dt);
        }
    }

    #[test]
    fn stepper_counts_frames() {
        let mut stepper = FixedStepper::new(FixedStepper::SIXTY_HZ);
        let mut recorder = Recorder::default();
        assert_eq!(stepper.step(&mut recorder), 0);
        assert_eq!(stepper.step(&mut recorder), 1);
        assert_eq!(stepper.frame(), 2);
        assert_eq!(recorder.ticks, vec![1.0 / 60.0; 2]);
    }

    #[test]
    fn clock_deltas_are_clamped() {
        let mut clock = FrameClock::new();
        if let Some(earlier) = clock.last.checked_sub(Duration::from_secs(10)) {
            clock.last = earlier;
        }
        assert!(clock.delta() <= 0.25);
        assert!(clock.delta() < 0.25);
    }
}
