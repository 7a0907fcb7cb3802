use std::time::Duration;

/// Runtime knobs shared by every host attached to one scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Wall-clock spacing of frames when the scheduler runs on its own.
    pub frame_interval: Duration,
}

impl RuntimeConfig {
    pub fn from_fps(fps: u32) -> Self {
        let fps = fps.max(1);
        Self {
            frame_interval: Duration::from_secs(1) / fps,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
        }
    }
}
