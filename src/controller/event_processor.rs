//! The per-tick poll cycle.
//!
//! One call to [`EventProcessor::poll`] samples the tracked device, handles
//! silence and disconnects, merges the stick into the D-pad, and produces the
//! tick's events in their fixed order: held-state refresh, button edges,
//! trigger edges, repeat. Dispatching them is the caller's job so that no
//! listener ever runs while the processor state is borrowed.

use tracing::trace;

use crate::controller::device::DeviceBackend;
use crate::controller::edge::{rising_edge, trigger_edge, trigger_held};
use crate::controller::event_collector::{DeviceSelector, ReconnectSupervisor};
use crate::controller::events::{ControllerEvent, HeldState};
use crate::controller::repeat::{RepeatDirection, RepeatSettings, RepeatTimer};
use crate::controller::state::{Buttons, ControllerState, DeviceSlot};
use crate::controller::stick::ThumbDeadzone;

/// Buttons with a press event, in dispatch order.
const EDGE_BUTTONS: [(Buttons, ControllerEvent); 9] = [
    (Buttons::DPAD_UP, ControllerEvent::UpPressed),
    (Buttons::DPAD_DOWN, ControllerEvent::DownPressed),
    (Buttons::DPAD_LEFT, ControllerEvent::LeftPressed),
    (Buttons::DPAD_RIGHT, ControllerEvent::RightPressed),
    (Buttons::START, ControllerEvent::StartPressed),
    (Buttons::BACK, ControllerEvent::BackPressed),
    (Buttons::A, ControllerEvent::APressed),
    (Buttons::B, ControllerEvent::BPressed),
    (Buttons::X, ControllerEvent::XPressed),
];

/// Tuning for a single [`EventProcessor`].
///
/// Built from [`ControllerSettings`](crate::controller::ControllerSettings);
/// the poll period itself lives with the loop, not here.
#[derive(Clone, Debug)]
pub struct ProcessorSettings {
    pub deadzone: ThumbDeadzone,
    pub repeat: RepeatSettings,
    pub trigger_threshold: u8,
    pub reconnect_threshold: u32,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            deadzone: ThumbDeadzone::default(),
            repeat: RepeatSettings::default(),
            trigger_threshold: 30,
            reconnect_threshold: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Normal tick on the tracked device.
    Processed,
    /// The tracked device went silent and another slot was adopted.
    Migrated,
    /// Input gate closed; state tracked, nothing emitted.
    Gated,
    /// Read failed and no rescan was due.
    ReadFailed,
    /// Read failed and a rescan adopted a device.
    Reconnected,
}

/// Result of one [`EventProcessor::poll`] call.
///
/// `events` is already in dispatch order. It is empty for every outcome
/// except [`TickOutcome::Processed`], and for `Processed` it is empty when
/// nothing changed and no repeat was due.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub events: Vec<ControllerEvent>,
}

impl TickReport {
    fn new(outcome: TickOutcome, events: Vec<ControllerEvent>) -> Self {
        Self { outcome, events }
    }
}

/// The per-session poll-cycle state.
///
/// Holds everything that has to survive from one tick to the next: the
/// tracked slot and per-slot packet history ([`DeviceSelector`]), the
/// consecutive failure count ([`ReconnectSupervisor`]), the repeat timer,
/// the previous snapshot that edges are computed against, and the current
/// held-state booleans.
///
/// # Threading
///
/// The processor is plain synchronous state. The polling loop owns it behind
/// a mutex and locks it once per tick; listeners are dispatched only after
/// that lock is released, so a listener may query held state freely.
///
/// # History resets
///
/// The previous snapshot is dropped whenever the tracked read fails or a new
/// slot is adopted. The next successful tick then compares against an empty
/// button mask for the stick hysteresis, while migration ticks suppress edges
/// so a held button on the new device is not reported as a press.
pub struct EventProcessor {
    settings: ProcessorSettings,
    selector: DeviceSelector,
    supervisor: ReconnectSupervisor,
    repeat: RepeatTimer,
    previous: Option<ControllerState>,
    held: HeldState,
}

impl EventProcessor {
    pub fn new(slot: DeviceSlot, settings: ProcessorSettings) -> Self {
        Self {
            selector: DeviceSelector::new(slot),
            supervisor: ReconnectSupervisor::new(settings.reconnect_threshold),
            repeat: RepeatTimer::new(settings.repeat),
            previous: None,
            held: HeldState::default(),
            settings,
        }
    }

    pub fn tracked_slot(&self) -> DeviceSlot {
        self.selector.tracked()
    }

    pub fn held(&self) -> HeldState {
        self.held
    }

    pub fn previous(&self) -> Option<&ControllerState> {
        self.previous.as_ref()
    }

    pub fn repeat_timer(&self) -> &RepeatTimer {
        &self.repeat
    }

    pub fn reconnect_failures(&self) -> u32 {
        self.supervisor.failures()
    }

    fn held_from(&self, state: &ControllerState) -> HeldState {
        let threshold = self.settings.trigger_threshold;
        HeldState {
            left_shoulder: state.has(Buttons::LEFT_SHOULDER),
            right_shoulder: state.has(Buttons::RIGHT_SHOULDER),
            left_trigger: trigger_held(state.left_trigger, threshold),
            right_trigger: trigger_held(state.right_trigger, threshold),
            back: state.has(Buttons::BACK),
            b: state.has(Buttons::B),
        }
    }

    /// Runs one tick against `backend`.
    pub fn poll(&mut self, backend: &dyn DeviceBackend, input_active: bool) -> TickReport {
        let mut events = Vec::new();

        let sampled = self.selector.sample_tracked(backend);
        let silent = match &sampled {
            Err(e) => {
                trace!("Read failed: {}", e);
                true
            }
            Ok(state) => self
                .previous
                .is_some_and(|previous| previous.packet_number == state.packet_number),
        };

        let require_fresh = sampled.is_ok();
        let mut read = sampled.ok();
        let mut migrated = false;
        if silent {
            if let Some(state) = self.selector.hot_swap(backend, require_fresh) {
                read = Some(state);
                self.previous = None;
                migrated = true;
            }
        }

        let Some(mut current) = read else {
            self.previous = None;
            self.repeat.reset();
            if !self.supervisor.record_failure() {
                return TickReport::new(TickOutcome::ReadFailed, events);
            }
            return match self.selector.rescan(backend) {
                Some(state) => {
                    self.previous = Some(state);
                    TickReport::new(TickOutcome::Reconnected, events)
                }
                None => TickReport::new(TickOutcome::ReadFailed, events),
            };
        };
        self.supervisor.record_success();

        let reference = self.previous.map(|p| p.buttons).unwrap_or_default();
        self.settings.deadzone.apply(&mut current, reference);

        let changed = self
            .previous
            .map_or(true, |previous| previous.packet_number != current.packet_number);

        if !input_active {
            self.repeat.reset();
            if changed {
                self.held = self.held_from(&current);
            }
            self.previous = Some(current);
            return TickReport::new(TickOutcome::Gated, events);
        }

        if changed {
            self.held = self.held_from(&current);

            // A freshly adopted device has no history; its first tick only
            // establishes state.
            if !migrated {
                events.extend(
                    EDGE_BUTTONS
                        .iter()
                        .filter(|(button, _)| rising_edge(current.buttons, reference, *button))
                        .map(|(_, event)| *event),
                );

                let threshold = self.settings.trigger_threshold;
                let (lt_before, rt_before) = self.previous.map_or((false, false), |p| {
                    (
                        trigger_held(p.left_trigger, threshold),
                        trigger_held(p.right_trigger, threshold),
                    )
                });
                if trigger_edge(self.held.left_trigger, lt_before) {
                    events.push(ControllerEvent::LeftTriggerPressed);
                }
                if trigger_edge(self.held.right_trigger, rt_before) {
                    events.push(ControllerEvent::RightTriggerPressed);
                }
            }
        }

        match self.repeat.step(current.buttons) {
            Some(RepeatDirection::Left) => events.push(ControllerEvent::LeftRepeat),
            Some(RepeatDirection::Right) => events.push(ControllerEvent::RightRepeat),
            None => {}
        }

        self.previous = Some(current);

        let outcome = if migrated {
            TickOutcome::Migrated
        } else {
            TickOutcome::Processed
        };
        TickReport::new(outcome, events)
    }
}
