//! Haptic feedback for UI actions.
//!
//! Named [`VibrationProfile`]s plus a [`FeedbackService`] that applies the
//! user's enable switch and intensity before forwarding to the session.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::trace;

use crate::controller::ControllerHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VibrationProfile {
    pub strength: u16,
    pub duration_ms: u64,
}

impl VibrationProfile {
    pub const fn new(strength: u16, duration_ms: u64) -> Self {
        Self {
            strength,
            duration_ms,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

pub mod patterns {
    use super::VibrationProfile;

    pub const CURSOR_MOVE: VibrationProfile = VibrationProfile::new(8000, 30);
    pub const COPY_SUCCESS: VibrationProfile = VibrationProfile::new(20000, 50);
    pub const CLEAR_INPUT: VibrationProfile = VibrationProfile::new(10000, 40);
    pub const ACTION_FAIL: VibrationProfile = VibrationProfile::new(6000, 25);
    pub const SHOW_INPUT: VibrationProfile = VibrationProfile::new(12000, 40);
    pub const RETURN_START: VibrationProfile = VibrationProfile::new(5000, 20);
    pub const RETURN_SUCCESS: VibrationProfile = VibrationProfile::new(8000, 30);
}

/// `[feedback]` table of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    pub enable_vibration: bool,
    /// Multiplier applied to every profile, 0.0 to 1.0.
    pub vibration_intensity: f32,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            enable_vibration: true,
            vibration_intensity: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackService {
    settings: FeedbackSettings,
}

impl FeedbackService {
    pub fn new(settings: FeedbackSettings) -> Self {
        Self { settings }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enable_vibration = enabled;
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.settings.vibration_intensity = intensity;
    }

    /// Strength after applying the switch and intensity, or `None` when
    /// nothing should be sent.
    pub fn scaled_strength(&self, strength: u16) -> Option<u16> {
        let intensity = self.settings.vibration_intensity;
        if !self.settings.enable_vibration || intensity.is_nan() || intensity <= 0.0 {
            return None;
        }
        let scaled = (f32::from(strength) * intensity).clamp(0.0, f32::from(u16::MAX)) as u16;
        (scaled > 0).then_some(scaled)
    }

    pub fn play(
        &self,
        handle: &ControllerHandle,
        profile: VibrationProfile,
    ) -> Option<JoinHandle<()>> {
        let Some(strength) = self.scaled_strength(profile.strength) else {
            trace!("Feedback skipped for {:?}", profile);
            return None;
        };
        handle.vibrate(strength, profile.duration())
    }
}
