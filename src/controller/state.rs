//! Raw controller snapshot types shared by every stage of the poll cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::controller::error::ConfigError;

/// Number of device ports the backend exposes.
pub const MAX_CONTROLLER_COUNT: u8 = 4;

bitflags::bitflags! {
    /// Digital button mask in the standard XInput bit layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u16 {
        const DPAD_UP = 0x0001;
        const DPAD_DOWN = 0x0002;
        const DPAD_LEFT = 0x0004;
        const DPAD_RIGHT = 0x0008;
        const START = 0x0010;
        const BACK = 0x0020;
        const LEFT_THUMB = 0x0040;
        const RIGHT_THUMB = 0x0080;
        const LEFT_SHOULDER = 0x0100;
        const RIGHT_SHOULDER = 0x0200;
        const A = 0x1000;
        const B = 0x2000;
        const X = 0x4000;
        const Y = 0x8000;
    }
}

/// One successful sample of a device.
///
/// The packet number only moves when the hardware reports a change. It may
/// wrap; callers compare it for equality and never order it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerState {
    pub packet_number: u32,
    pub buttons: Buttons,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub left_stick_x: i16,
    pub left_stick_y: i16,
}

impl ControllerState {
    pub fn has(&self, button: Buttons) -> bool {
        self.buttons.contains(button)
    }
}

/// A physical controller port, always in `0..MAX_CONTROLLER_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DeviceSlot(u8);

impl DeviceSlot {
    pub fn new(index: u8) -> Result<Self, ConfigError> {
        if index < MAX_CONTROLLER_COUNT {
            Ok(Self(index))
        } else {
            Err(ConfigError::InvalidSlot(index))
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Every slot in scan order.
    pub fn all() -> impl Iterator<Item = DeviceSlot> {
        (0..MAX_CONTROLLER_COUNT).map(DeviceSlot)
    }
}

impl Default for DeviceSlot {
    fn default() -> Self {
        Self(0)
    }
}

impl TryFrom<u8> for DeviceSlot {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceSlot> for u8 {
    fn from(slot: DeviceSlot) -> Self {
        slot.0
    }
}

impl fmt::Display for DeviceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_range_is_enforced() {
        assert!(DeviceSlot::new(0).is_ok());
        assert!(DeviceSlot::new(3).is_ok());
        assert!(matches!(
            DeviceSlot::new(4),
            Err(ConfigError::InvalidSlot(4))
        ));
    }

    #[test]
    fn all_slots_scan_in_order() {
        let indices: Vec<u8> = DeviceSlot::all().map(DeviceSlot::index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn has_checks_single_flag() {
        let state = ControllerState {
            buttons: Buttons::A | Buttons::DPAD_LEFT,
            ..Default::default()
        };
        assert!(state.has(Buttons::A));
        assert!(state.has(Buttons::DPAD_LEFT));
        assert!(!state.has(Buttons::B));
    }
}
