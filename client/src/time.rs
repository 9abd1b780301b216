//! Frame timing for the tick loop

use crate::config::ClientConfig;
use log::warn;
use std::cell::Cell;
use std::time::Instant;

/// Source of timestamps, in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Monotonic wall clock measured from its own creation.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Clock advanced by hand, for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Timing state shared by everything that runs inside a tick.
#[derive(Debug, Clone)]
pub struct Time {
    pub frame_count: u64,
    /// Timestamp of the current frame
    pub time: f64,
    pub since_start: f64,
    /// Clamped, scaled step for this frame
    pub delta: f32,
    pub fps: u32,
    pub scale: f32,
    min_delta: f32,
    max_delta: f32,
    start: Option<f64>,
    last: Option<f64>,
    fps_frames: u32,
    fps_window_start: f64,
}

impl Time {
    /// Builds timing state from `config`. Unusable delta bounds fall back to
    /// the defaults.
    pub fn new(config: &ClientConfig) -> Self {
        let (min_delta, max_delta) = config.delta_bounds().unwrap_or_else(|e| {
            warn!("Time: {}, using default delta bounds", e);
            let defaults = ClientConfig::default();
            (defaults.min_delta, defaults.max_delta)
        });
        let scale = if config.time_scale.is_nan() || config.time_scale < 0.0 {
            warn!("Time: time_scale {} is unusable, using 1", config.time_scale);
            1.0
        } else {
            config.time_scale
        };

        Self {
            frame_count: 0,
            time: 0.0,
            since_start: 0.0,
            delta: min_delta,
            fps: 0,
            scale,
            min_delta,
            max_delta,
            start: None,
            last: None,
            fps_frames: 0,
            fps_window_start: 0.0,
        }
    }

    /// Advances to a new frame sampled at `now`.
    pub fn advance(&mut self, now: f64) {
        self.frame_count += 1;

        let start = *self.start.get_or_insert(now);
        let previous = self.last.unwrap_or(now);
        if self.last.is_none() {
            self.fps_window_start = now;
        }
        self.last = Some(now);
        self.time = now;
        self.since_start = now - start;

        let raw = ((now - previous) as f32) * self.scale;
        self.delta = raw.clamp(self.min_delta, self.max_delta);

        self.fps_frames += 1;
        let window = now - self.fps_window_start;
        if window >= 1.0 {
            self.fps = (self.fps_frames as f64 / window).round() as u32;
            self.fps_frames = 0;
            self.fps_window_start = now;
        }
    }
}
