//! Controller subsystem for gamepad input handling
//!
//! Polls one gamepad slot on a fixed 16 ms period and turns raw snapshots
//! into discrete UI events:
//!
//! 1. [`event_collector`] - which slot to read, hot-swap and reconnect scans
//! 2. [`event_processor`] - one poll cycle: stick merge, edges, repeat
//! 3. [`controller_handle`] - session lifecycle, queries and listeners
//!
//! # Architecture
//!
//! ```text
//! DeviceBackend ──► EventProcessor ──► Subscriptions ──► listeners
//!  (per slot)       (PollingLoop tick)  (ControllerEvent)
//! ```

pub mod controller_handle;
pub mod device;
pub mod edge;
pub mod error;
pub mod event_collector;
pub mod event_processor;
pub mod events;
pub mod gilrs_backend;
pub mod input_gate;
mod polling_loop;
pub mod repeat;
pub mod state;
pub mod stick;
pub mod vibration;

#[cfg(test)]
pub(crate) mod test_support;

pub use controller_handle::{ControllerHandle, ControllerSettings};
pub use device::{BackendError, DeviceBackend};
pub use error::{ConfigError, ControllerError};
pub use event_collector::first_connected_slot;
pub use events::{ControllerEvent, HeldState, SubscriptionId};
pub use gilrs_backend::GilrsBackend;
pub use input_gate::{AlwaysActive, AtomicInputGate, InputGate};
pub use state::{Buttons, ControllerState, DeviceSlot};
