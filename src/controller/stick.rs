//! Left stick to D-pad mapping with a hysteresis band.
//!
//! A direction turns on once the axis passes the `enter` threshold and only
//! turns off again when the axis falls back under the lower `exit` threshold.
//! The previous *combined* mask (physical D-pad plus last tick's virtual bits)
//! decides which threshold applies, so the mapper itself keeps no state.

use serde::{Deserialize, Serialize};

use crate::controller::error::ConfigError;
use crate::controller::state::{Buttons, ControllerState};

/// Enter/exit thresholds for the left stick, in raw axis units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbDeadzone {
    pub enter: i32,
    pub exit: i32,
}

impl Default for ThumbDeadzone {
    fn default() -> Self {
        Self {
            enter: 7849,
            exit: 7000,
        }
    }
}

impl ThumbDeadzone {
    pub fn new(enter: i32, exit: i32) -> Result<Self, ConfigError> {
        let deadzone = Self { enter, exit };
        deadzone.validate()?;
        Ok(deadzone)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = i32::from(i16::MAX);
        if !(0..=max).contains(&self.enter) || !(0..=max).contains(&self.exit) {
            return Err(ConfigError::InvalidDeadzone(format!(
                "thresholds must be within 0..={max} (enter {}, exit {})",
                self.enter, self.exit
            )));
        }
        if self.enter <= self.exit {
            return Err(ConfigError::InvalidDeadzone(format!(
                "enter ({}) must be greater than exit ({})",
                self.enter, self.exit
            )));
        }
        Ok(())
    }

    fn threshold(&self, was_on: bool) -> i32 {
        if was_on {
            self.exit
        } else {
            self.enter
        }
    }

    /// ORs the stick's digital directions into `current.buttons`.
    ///
    /// Physically pressed D-pad bits are never cleared. X and Y are evaluated
    /// independently, so diagonals produce two bits.
    pub fn apply(&self, current: &mut ControllerState, previous: Buttons) {
        let left = self.threshold(previous.contains(Buttons::DPAD_LEFT));
        let right = self.threshold(previous.contains(Buttons::DPAD_RIGHT));
        let up = self.threshold(previous.contains(Buttons::DPAD_UP));
        let down = self.threshold(previous.contains(Buttons::DPAD_DOWN));

        let x = i32::from(current.left_stick_x);
        let y = i32::from(current.left_stick_y);

        if x < -left {
            current.buttons |= Buttons::DPAD_LEFT;
        } else if x > right {
            current.buttons |= Buttons::DPAD_RIGHT;
        }

        if y < -down {
            current.buttons |= Buttons::DPAD_DOWN;
        } else if y > up {
            current.buttons |= Buttons::DPAD_UP;
        }
    }
}
