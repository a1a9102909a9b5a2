use std::collections::VecDeque;
use std::time::Instant;

///Number of frame samples the rolling window keeps by default.
pub const DEFAULT_WINDOW: usize = 100;

///Blend factor pulling the smoothed rate towards the rolling average on each
/// new sample.
const SMOOTHING: f64 = 0.05;

///Measures the wall clock time between frames and derives a frames-per-second
/// estimate from a rolling window of recent samples. The raw per-frame rate
/// jitters too much for a window title, so [smoothed_fps](Self::smoothed_fps)
/// additionally low pass filters the windowed average.
pub struct FrameTimer {
    last: Instant,
    history: VecDeque<f64>,
    window: usize,
    sum: f64,
    average_fps: f64,
    smoothed_fps: f64,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    ///Timer with a custom sample window. `window` is clamped to at least one
    /// sample.
    pub fn with_window(window: usize) -> Self {
        let window = window.max(1);
        FrameTimer {
            last: Instant::now(),
            history: VecDeque::with_capacity(window),
            window,
            sum: 0.0,
            average_fps: 0.0,
            smoothed_fps: 0.0,
        }
    }

    ///Marks the start of a new frame. Returns the wall clock seconds since
    /// the previous call, or since construction for the first call, and folds
    /// that sample into the rate estimates.
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        let seconds = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        self.push(seconds);
        seconds
    }

    fn push(&mut self, seconds: f64) {
        let first_sample = self.history.is_empty();
        if self.history.len() == self.window {
            if let Some(oldest) = self.history.pop_front() {
                self.sum = (self.sum - oldest).max(0.0);
            }
        }
        self.history.push_back(seconds);
        self.sum += seconds;

        let average_seconds = self.sum / self.history.len() as f64;
        self.average_fps = 1.0 / average_seconds;
        if first_sample {
            self.smoothed_fps = self.average_fps;
        } else {
            self.smoothed_fps += (self.average_fps - self.smoothed_fps) * SMOOTHING;
        }
    }

    ///Average rate over the current sample window.
    pub fn average_fps(&self) -> f64 {
        self.average_fps
    }

    ///Smoothed rate, stable enough to display every frame.
    pub fn smoothed_fps(&self) -> f64 {
        self.smoothed_fps
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn window_stays_bounded() {
        let mut timer = FrameTimer::with_window(100);
        for _ in 0..101 {
            timer.push(0.25);
        }
        assert_eq!(timer.history.len(), 100);
        assert!((timer.sum - 25.0).abs() < 1e-9);
        assert!((timer.average_fps() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn single_sample_average_is_that_sample() {
        let mut timer = FrameTimer::with_window(4);
        timer.push(0.5);
        assert!((timer.average_fps() - 2.0).abs() < 1e-9);
        assert!((timer.smoothed_fps() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn smoothing_blends_towards_average() {
        let mut timer = FrameTimer::with_window(8);
        timer.push(0.1);
        timer.push(0.3);
        //average is now 5 fps, the smoothed rate moves 5% of the way from 10
        assert!((timer.average_fps() - 5.0).abs() < 1e-9);
        assert!((timer.smoothed_fps() - 9.75).abs() < 1e-9);
    }

    #[test]
    fn tiny_window_still_works() {
        let mut timer = FrameTimer::with_window(0);
        timer.push(0.25);
        timer.push(0.5);
        assert_eq!(timer.history.len(), 1);
        assert!((timer.average_fps() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn first_tick_measures_gap_since_construction() {
        let mut timer = FrameTimer::new();
        std::thread::sleep(Duration::from_millis(10));
        let seconds = timer.tick();
        assert!(seconds >= 0.005);
        assert!(seconds < 5.0);
        assert!(timer.smoothed_fps().is_finite());
        assert!(timer.smoothed_fps() > 0.0);
    }
}
