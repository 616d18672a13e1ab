//! Frame-based auto-repeat for horizontal D-pad holds.

use serde::{Deserialize, Serialize};

use crate::controller::error::ConfigError;
use crate::controller::state::Buttons;

/// Repeat timing in poll frames, not milliseconds.
///
/// At the default 16 ms tick, 20/3 is roughly 320 ms of delay followed by a
/// repeat every 48 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatSettings {
    pub initial_delay_frames: u32,
    pub interval_frames: u32,
}

impl Default for RepeatSettings {
    fn default() -> Self {
        Self {
            initial_delay_frames: 20,
            interval_frames: 3,
        }
    }
}

impl RepeatSettings {
    pub fn new(initial_delay_frames: u32, interval_frames: u32) -> Result<Self, ConfigError> {
        let settings = Self {
            initial_delay_frames,
            interval_frames,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_frames == 0 {
            return Err(ConfigError::InvalidRepeatInterval);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatDirection {
    Left,
    Right,
}

impl RepeatDirection {
    /// Exactly one of left/right held, otherwise nothing repeats.
    pub fn from_buttons(buttons: Buttons) -> Option<Self> {
        match (
            buttons.contains(Buttons::DPAD_LEFT),
            buttons.contains(Buttons::DPAD_RIGHT),
        ) {
            (true, false) => Some(Self::Left),
            (false, true) => Some(Self::Right),
            _ => None,
        }
    }
}

/// Per-session repeat state: the direction being held and its frame counter.
#[derive(Debug, Clone)]
pub struct RepeatTimer {
    settings: RepeatSettings,
    direction: Option<RepeatDirection>,
    counter: u32,
}

impl RepeatTimer {
    pub fn new(settings: RepeatSettings) -> Self {
        Self {
            settings,
            direction: None,
            counter: 0,
        }
    }

    pub fn reset(&mut self) {
        self.direction = None;
        self.counter = 0;
    }

    pub fn direction(&self) -> Option<RepeatDirection> {
        self.direction
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Advances one frame and returns the direction to repeat, if any.
    ///
    /// The frame a direction is first seen only arms the timer, so every
    /// direction change pays the full initial delay. The first repeat lands
    /// exactly `initial_delay_frames` after arming, then every
    /// `interval_frames`.
    pub fn step(&mut self, buttons: Buttons) -> Option<RepeatDirection> {
        let Some(held) = RepeatDirection::from_buttons(buttons) else {
            self.reset();
            return None;
        };

        if self.direction != Some(held) {
            self.direction = Some(held);
            self.counter = 0;
            return None;
        }

        self.counter = self.counter.saturating_add(1);

        let since_delay = self
            .counter
            .checked_sub(self.settings.initial_delay_frames)?;
        if since_delay % self.settings.interval_frames != 0 {
            return None;
        }
        Some(held)
    }
}
