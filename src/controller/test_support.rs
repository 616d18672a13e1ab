//! Scripted backend for unit tests.

use std::sync::Mutex;

use crate::controller::device::{BackendError, DeviceBackend};
use crate::controller::state::{Buttons, ControllerState, DeviceSlot, MAX_CONTROLLER_COUNT};

const SLOTS: usize = MAX_CONTROLLER_COUNT as usize;

#[derive(Default)]
struct Script {
    devices: [Option<ControllerState>; SLOTS],
    samples: [usize; SLOTS],
    vibration: Vec<(DeviceSlot, u16, u16)>,
}

/// In-memory device table. Every mutation of a connected slot bumps its
/// packet number, the way real hardware does.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, slot: DeviceSlot, packet_number: u32) {
        let mut script = self.script.lock().unwrap();
        script.devices[usize::from(slot.index())] = Some(ControllerState {
            packet_number,
            ..Default::default()
        });
    }

    pub fn disconnect(&self, slot: DeviceSlot) {
        self.script.lock().unwrap().devices[usize::from(slot.index())] = None;
    }

    pub fn update(&self, slot: DeviceSlot, change: impl FnOnce(&mut ControllerState)) {
        let mut script = self.script.lock().unwrap();
        let state = script.devices[usize::from(slot.index())]
            .as_mut()
            .expect("slot must be connected before it is updated");
        change(state);
        state.packet_number = state.packet_number.wrapping_add(1);
    }

    pub fn bump(&self, slot: DeviceSlot) {
        self.update(slot, |_| {});
    }

    pub fn press(&self, slot: DeviceSlot, buttons: Buttons) {
        self.update(slot, |state| state.buttons |= buttons);
    }

    pub fn release(&self, slot: DeviceSlot, buttons: Buttons) {
        self.update(slot, |state| state.buttons.remove(buttons));
    }

    pub fn stick(&self, slot: DeviceSlot, x: i16, y: i16) {
        self.update(slot, |state| {
            state.left_stick_x = x;
            state.left_stick_y = y;
        });
    }

    pub fn triggers(&self, slot: DeviceSlot, left: u8, right: u8) {
        self.update(slot, |state| {
            state.left_trigger = left;
            state.right_trigger = right;
        });
    }

    pub fn sample_count(&self, slot: DeviceSlot) -> usize {
        self.script.lock().unwrap().samples[usize::from(slot.index())]
    }

    pub fn total_samples(&self) -> usize {
        self.script.lock().unwrap().samples.iter().sum()
    }

    pub fn vibration_log(&self) -> Vec<(DeviceSlot, u16, u16)> {
        self.script.lock().unwrap().vibration.clone()
    }
}

impl DeviceBackend for ScriptedBackend {
    fn sample(&self, slot: DeviceSlot) -> Result<ControllerState, BackendError> {
        let mut script = self.script.lock().unwrap();
        let index = usize::from(slot.index());
        script.samples[index] += 1;
        script.devices[index].ok_or(BackendError::NotConnected(slot))
    }

    fn set_vibration(&self, slot: DeviceSlot, left: u16, right: u16) -> Result<(), BackendError> {
        let mut script = self.script.lock().unwrap();
        if script.devices[usize::from(slot.index())].is_none() {
            return Err(BackendError::NotConnected(slot));
        }
        script.vibration.push((slot, left, right));
        Ok(())
    }
}
