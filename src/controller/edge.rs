//! Rising-edge detection over button masks and trigger thresholds.

use crate::controller::state::Buttons;

/// True only on the 0→1 transition of `button`.
pub fn rising_edge(current: Buttons, previous: Buttons, button: Buttons) -> bool {
    current.contains(button) && !previous.contains(button)
}

/// Trigger variant: edges are taken on the "held" boolean, not a mask bit.
pub fn trigger_edge(held_now: bool, held_before: bool) -> bool {
    held_now && !held_before
}

/// A trigger counts as held once its byte is strictly above `threshold`.
pub fn trigger_held(value: u8, threshold: u8) -> bool {
    value > threshold
}
