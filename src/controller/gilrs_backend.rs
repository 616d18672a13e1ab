//! [`DeviceBackend`] over gilrs.
//!
//! gilrs is event driven while the poll cycle wants XInput-style snapshots,
//! so each call drains pending gilrs events (which updates gilrs' cached
//! gamepad state) and bumps a per-gamepad packet counter for every event
//! seen. Slots are the first four connected gamepads in enumeration order.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Replay, Ticks};
use gilrs::{Axis, Button, Event, Gamepad, GamepadId, Gilrs};
use tracing::{debug, info, trace, warn};

use crate::controller::device::{BackendError, DeviceBackend};
use crate::controller::state::{Buttons, ControllerState, DeviceSlot, MAX_CONTROLLER_COUNT};

const BUTTON_MAP: [(Button, Buttons); 14] = [
    (Button::DPadUp, Buttons::DPAD_UP),
    (Button::DPadDown, Buttons::DPAD_DOWN),
    (Button::DPadLeft, Buttons::DPAD_LEFT),
    (Button::DPadRight, Buttons::DPAD_RIGHT),
    (Button::Start, Buttons::START),
    (Button::Select, Buttons::BACK),
    (Button::LeftThumb, Buttons::LEFT_THUMB),
    (Button::RightThumb, Buttons::RIGHT_THUMB),
    (Button::LeftTrigger, Buttons::LEFT_SHOULDER),
    (Button::RightTrigger, Buttons::RIGHT_SHOULDER),
    (Button::South, Buttons::A),
    (Button::East, Buttons::B),
    (Button::West, Buttons::X),
    (Button::North, Buttons::Y),
];

// Length of one force-feedback replay; the effect repeats until replaced.
const RUMBLE_SLICE_MS: u32 = 100;

struct GilrsState {
    gilrs: Gilrs,
    packets: HashMap<GamepadId, u32>,
    effects: HashMap<GamepadId, Effect>,
}

impl GilrsState {
    fn pump(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            trace!("gilrs event from {}: {:?}", id, event);
            let packet = self.packets.entry(id).or_insert(0);
            *packet = packet.wrapping_add(1);
        }
    }

    fn gamepad_id(&self, slot: DeviceSlot) -> Option<GamepadId> {
        self.gilrs
            .gamepads()
            .filter(|(_, gamepad)| gamepad.is_connected())
            .nth(usize::from(slot.index()))
            .map(|(id, _)| id)
    }

    fn stop_effect(&mut self, id: GamepadId) {
        if let Some(effect) = self.effects.remove(&id) {
            if let Err(e) = effect.stop() {
                debug!("Failed to stop rumble on {}: {}", id, e);
            }
        }
    }
}

pub struct GilrsBackend {
    state: Mutex<GilrsState>,
}

impl GilrsBackend {
    pub fn new() -> Result<Self, BackendError> {
        info!("Initializing gilrs controller interface");
        let gilrs = Gilrs::new().map_err(|e| {
            warn!("Failed to initialize gilrs: {}", e);
            BackendError::Unavailable(e.to_string())
        })?;

        for (index, (id, gamepad)) in gilrs
            .gamepads()
            .take(usize::from(MAX_CONTROLLER_COUNT))
            .enumerate()
        {
            info!(
                "  [{}] ID: {}, Name: {}, force feedback: {}",
                index,
                id,
                gamepad.name(),
                gamepad.is_ff_supported()
            );
        }

        Ok(Self {
            state: Mutex::new(GilrsState {
                gilrs,
                packets: HashMap::new(),
                effects: HashMap::new(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, GilrsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn trigger_byte(gamepad: &Gamepad<'_>, button: Button) -> u8 {
    let value = gamepad.button_data(button).map_or(0.0, |data| data.value());
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn axis_i16(gamepad: &Gamepad<'_>, axis: Axis) -> i16 {
    (gamepad.value(axis).clamp(-1.0, 1.0) * 32767.0).round() as i16
}

fn snapshot(gamepad: &Gamepad<'_>, packet_number: u32) -> ControllerState {
    let buttons = BUTTON_MAP
        .iter()
        .filter(|(button, _)| gamepad.is_pressed(*button))
        .fold(Buttons::empty(), |mask, (_, bit)| mask | *bit);

    ControllerState {
        packet_number,
        buttons,
        left_trigger: trigger_byte(gamepad, Button::LeftTrigger2),
        right_trigger: trigger_byte(gamepad, Button::RightTrigger2),
        left_stick_x: axis_i16(gamepad, Axis::LeftStickX),
        left_stick_y: axis_i16(gamepad, Axis::LeftStickY),
    }
}

impl DeviceBackend for GilrsBackend {
    fn sample(&self, slot: DeviceSlot) -> Result<ControllerState, BackendError> {
        let mut state = self.lock();
        state.pump();
        let id = state
            .gamepad_id(slot)
            .ok_or(BackendError::NotConnected(slot))?;
        let packet = state.packets.get(&id).copied().unwrap_or(0);
        Ok(snapshot(&state.gilrs.gamepad(id), packet))
    }

    fn set_vibration(&self, slot: DeviceSlot, left: u16, right: u16) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.pump();
        let id = state
            .gamepad_id(slot)
            .ok_or(BackendError::NotConnected(slot))?;

        state.stop_effect(id);
        if left == 0 && right == 0 {
            return Ok(());
        }
        if !state.gilrs.gamepad(id).is_ff_supported() {
            return Err(BackendError::VibrationUnsupported(slot));
        }

        let scheduling = Replay {
            play_for: Ticks::from_ms(RUMBLE_SLICE_MS),
            ..Default::default()
        };
        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind: BaseEffectType::Strong { magnitude: left },
                scheduling,
                envelope: Default::default(),
            })
            .add_effect(BaseEffect {
                kind: BaseEffectType::Weak { magnitude: right },
                scheduling,
                envelope: Default::default(),
            })
            .gamepads(&[id])
            .finish(&mut state.gilrs)
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        effect
            .play()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        debug!("Rumble on {}: strong={}, weak={}", slot, left, right);
        state.effects.insert(id, effect);
        Ok(())
    }
}
