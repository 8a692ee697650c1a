//! Frame timing for render loops
//!
//! Tracks delta and elapsed time per rendered frame. Deltas are clamped so a
//! loop resumed after a long pause does not jump the camera.

use serde::{Deserialize, Serialize};

/// Configuration for frame timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Target frames per second for the render loop
    pub target_fps: u32,
    /// Maximum delta time fed to animation, in seconds
    pub max_delta_time: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            max_delta_time: 0.1,
        }
    }
}

impl ClockConfig {
    /// Interval between frames
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_micros(1_000_000 / self.target_fps.max(1) as u64)
    }
}

/// Frame time tracking
#[derive(Debug, Clone)]
pub struct FrameClock {
    /// Configuration
    pub config: ClockConfig,
    /// Time spent rendering (excluding pauses) in seconds
    pub total_time: f64,
    /// Delta time for this frame (clamped)
    pub delta_time: f32,
    /// Frame counter
    pub frame_count: u64,
    /// Whether the clock is paused
    pub paused: bool,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(ClockConfig::default())
    }
}

impl FrameClock {
    /// Create a new clock with custom config
    pub fn new(config: ClockConfig) -> Self {
        Self {
            config,
            total_time: 0.0,
            delta_time: 0.0,
            frame_count: 0,
            paused: false,
        }
    }

    /// Advance the clock with the raw delta since the previous frame
    pub fn tick(&mut self, raw_delta: f32) {
        self.frame_count += 1;

        if self.paused {
            self.delta_time = 0.0;
            return;
        }

        self.delta_time = raw_delta.clamp(0.0, self.config.max_delta_time);
        self.total_time += self.delta_time as f64;
    }

    /// Pause the clock; ticks report a zero delta until resumed
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume the clock
    pub fn resume(&mut self) {
        self.paused = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_clock() {
        let mut clock = FrameClock::default();
        clock.tick(0.016);

        assert!(clock.delta_time > 0.0);
        assert_eq!(clock.frame_count, 1);

        clock.pause();
        clock.tick(0.016);
        assert_eq!(clock.delta_time, 0.0);
        assert_eq!(clock.frame_count, 2);
    }

    #[test]
    fn test_frame_clock_clamps_long_gaps() {
        let mut clock = FrameClock::default();
        clock.tick(5.0);
        assert_eq!(clock.delta_time, clock.config.max_delta_time);
    }

    #[test]
    fn test_frame_interval() {
        let config = ClockConfig {
            target_fps: 50,
            ..Default::default()
        };
        assert_eq!(config.frame_interval(), std::time::Duration::from_millis(20));
    }
}
