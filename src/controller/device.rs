//! Hardware boundary: the per-slot sample and vibration primitives.

use crate::controller::state::{ControllerState, DeviceSlot};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("No controller connected at {0}")]
    NotConnected(DeviceSlot),

    #[error("Force feedback not supported at {0}")]
    VibrationUnsupported(DeviceSlot),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Black-box device access used by the polling core.
///
/// Both calls must be non-blocking and bounded; they run on the polling task
/// once per tick and from vibration tasks.
pub trait DeviceBackend: Send + Sync + 'static {
    /// Reads the current state of `slot`.
    fn sample(&self, slot: DeviceSlot) -> Result<ControllerState, BackendError>;

    /// Sets both rumble motors of `slot`. Zero on both stops vibration.
    fn set_vibration(&self, slot: DeviceSlot, left: u16, right: u16) -> Result<(), BackendError>;
}
