//! Time manager: monotonic game clock with framestep clamping and pause support.
//!
//! The clock source is pluggable through [`Clock`] so that the main loop uses the
//! system's monotonic clock while tests drive time by hand.

use std::time::{Duration, Instant};

/// Upper bound of the framestep delta, in seconds.
pub const MAX_DELTA: f64 = 0.017;

/// A monotonic time source.
pub trait Clock {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
}

/// Monotonic system clock measured from its creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Game clock sampled once per framestep.
#[derive(Debug)]
pub struct TimeManager<K: Clock = SystemClock> {
    clock: K,
    start_time: Duration,
    current_time: f64,
    delta_time: f64,
    frames: u64,
    paused: bool,
    pause_duration: Duration,
    pause_start_time: Duration,
    fps: u32,
    fps_frames: u32,
    fps_window: f64,
}

impl TimeManager<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::default())
    }
}

impl Default for TimeManager<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clock> TimeManager<K> {
    pub fn with_clock(clock: K) -> Self {
        let start_time = clock.now();
        log::debug!("Time manager started");
        Self {
            clock,
            start_time,
            current_time: 0.0,
            delta_time: 0.0,
            frames: 0,
            paused: false,
            pause_duration: Duration::ZERO,
            pause_start_time: Duration::ZERO,
            fps: 0,
            fps_frames: 0,
            fps_window: 0.0,
        }
    }

    fn game_time(&self) -> f64 {
        let elapsed = self.clock.now().saturating_sub(self.start_time);
        elapsed.saturating_sub(self.pause_duration).as_secs_f64()
    }

    /// Advances the clock by one framestep.
    pub fn update(&mut self) {
        if self.paused {
            self.delta_time = 0.0;
            return;
        }

        let now = self.game_time();
        self.delta_time = (now - self.current_time).clamp(0.0, MAX_DELTA);
        self.current_time = now;
        self.frames += 1;

        self.fps_frames += 1;
        self.fps_window += self.delta_time;
        if self.fps_window >= 1.0 {
            self.fps = self.fps_frames;
            self.fps_frames = 0;
            self.fps_window = 0.0;
        }
    }

    /// Stops game time. Does nothing if already paused.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            self.pause_start_time = self.clock.now();
            self.delta_time = 0.0;
            log::debug!("Time manager paused");
        }
    }

    /// Resumes game time, discounting the paused interval. Does nothing if running.
    pub fn resume(&mut self) {
        if self.paused {
            let paused_for = self.clock.now().saturating_sub(self.pause_start_time);
            self.pause_duration += paused_for;
            self.paused = false;
            log::debug!("Time manager resumed after {:.3}s", paused_for.as_secs_f64());
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Seconds since start-up minus every paused interval, read right now.
    ///
    /// While paused, the value stays frozen at the moment the pause began.
    pub fn now(&self) -> f64 {
        if self.paused {
            let at_pause = self.pause_start_time.saturating_sub(self.start_time);
            at_pause.saturating_sub(self.pause_duration).as_secs_f64()
        } else {
            self.game_time()
        }
    }

    /// [`now`](Self::now) in whole milliseconds.
    pub fn ticks_ms(&self) -> u64 {
        (self.now() * 1000.0) as u64
    }

    /// Game time sampled at the start of the current framestep.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Seconds elapsed during the last framestep, in `[0, MAX_DELTA]`.
    pub fn delta(&self) -> f64 {
        self.delta_time
    }

    /// Wall-clock seconds since start-up, pauses included.
    pub fn elapsed(&self) -> f64 {
        self.clock.now().saturating_sub(self.start_time).as_secs_f64()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames counted over the last completed second of game time.
    pub fn fps(&self) -> u32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct ManualClock(Rc<Cell<Duration>>);

    impl ManualClock {
        fn advance(&self, secs: f64) {
            self.0.set(self.0.get() + Duration::from_secs_f64(secs));
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Duration {
            self.0.get()
        }
    }

    fn manager() -> (TimeManager<ManualClock>, ManualClock) {
        let clock = ManualClock::default();
        (TimeManager::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_delta_is_clamped() {
        let (mut time, clock) = manager();
        clock.advance(0.010);
        time.update();
        assert!((time.delta() - 0.010).abs() < 1e-9);

        clock.advance(0.5);
        time.update();
        assert_eq!(time.delta(), MAX_DELTA);
        assert_eq!(time.frames(), 2);
    }

    #[test]
    fn test_pause_freezes_time() {
        let (mut time, clock) = manager();
        clock.advance(1.0);
        time.update();
        time.pause();
        let frozen = time.now();

        clock.advance(5.0);
        time.update();
        assert_eq!(time.delta(), 0.0);
        assert_eq!(time.now(), frozen);
        assert_eq!(time.frames(), 1);

        time.resume();
        clock.advance(0.25);
        assert!((time.now() - 1.25).abs() < 1e-9);
        assert!((time.elapsed() - 6.25).abs() < 1e-9);
    }

    #[test]
    fn test_now_is_monotonic_across_pauses() {
        let (mut time, clock) = manager();
        let mut last = time.now();
        for step in 0..20 {
            clock.advance(0.1);
            if step % 3 == 0 {
                time.pause();
            } else {
                time.resume();
            }
            time.update();
            let now = time.now();
            assert!(now >= last);
            assert!((0.0..=MAX_DELTA).contains(&time.delta()));
            last = now;
        }
    }

    #[test]
    fn test_pause_and_resume_are_idempotent() {
        let (mut time, clock) = manager();
        time.resume();
        time.pause();
        clock.advance(1.0);
        time.pause();
        time.resume();
        time.resume();
        assert!(time.now().abs() < 1e-9);
    }

    #[test]
    fn test_current_time_is_stable_within_a_step() {
        let (mut time, clock) = manager();
        clock.advance(0.016);
        time.update();
        let sampled = time.current_time();
        clock.advance(0.5);
        assert_eq!(time.current_time(), sampled);
    }

    #[test]
    fn test_fps_counts_frames_per_second() {
        let (mut time, clock) = manager();
        for _ in 0..60 {
            clock.advance(1.0 / 59.0);
            time.update();
        }
        assert!(time.fps() >= 59 && time.fps() <= 60, "fps = {}", time.fps());
    }
}
