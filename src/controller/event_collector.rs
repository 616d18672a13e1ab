//! Device selection and reconnect handling.
//!
//! [`DeviceSelector`] owns which slot is tracked and performs the two kinds
//! of scans the poll cycle needs: the hot-swap scan when the tracked device
//! goes silent, and the full rescan once the [`ReconnectSupervisor`] decides
//! enough consecutive reads have failed.

use tracing::{debug, info, trace};

use crate::controller::device::{BackendError, DeviceBackend};
use crate::controller::state::{ControllerState, DeviceSlot, MAX_CONTROLLER_COUNT};

/// Returns the first slot that samples successfully, or slot 0.
pub fn first_connected_slot(backend: &dyn DeviceBackend) -> DeviceSlot {
    DeviceSlot::all()
        .find(|slot| backend.sample(*slot).is_ok())
        .unwrap_or_default()
}

/// Tracks which slot is being read and remembers the last packet number
/// observed from every slot.
///
/// The packet history is what distinguishes a controller that is merely
/// plugged in from one somebody is actually touching. Only the poll cycle
/// drives the selector; it performs no I/O of its own beyond the backend
/// calls it is handed.
#[derive(Debug, Clone)]
pub struct DeviceSelector {
    tracked: DeviceSlot,
    // Last packet number observed per slot, used to tell a device that is
    // merely connected from one that is actually being used.
    last_seen: [Option<u32>; MAX_CONTROLLER_COUNT as usize],
}

impl DeviceSelector {
    pub fn new(slot: DeviceSlot) -> Self {
        Self {
            tracked: slot,
            last_seen: [None; MAX_CONTROLLER_COUNT as usize],
        }
    }

    pub fn tracked(&self) -> DeviceSlot {
        self.tracked
    }

    fn observe(
        &mut self,
        backend: &dyn DeviceBackend,
        slot: DeviceSlot,
    ) -> Result<(ControllerState, Option<u32>), BackendError> {
        let state = backend.sample(slot)?;
        let seen = &mut self.last_seen[usize::from(slot.index())];
        let before = seen.replace(state.packet_number);
        Ok((state, before))
    }

    pub fn sample_tracked(
        &mut self,
        backend: &dyn DeviceBackend,
    ) -> Result<ControllerState, BackendError> {
        let tracked = self.tracked;
        match self.observe(backend, tracked) {
            Ok((state, _)) => Ok(state),
            Err(e) => {
                self.last_seen[usize::from(tracked.index())] = None;
                Err(e)
            }
        }
    }

    /// Scans every other slot once and switches to the first one that is
    /// connected with a nonzero packet number.
    ///
    /// With `require_fresh` set (the tracked device is connected but
    /// silent) a candidate must also have produced a packet we have not
    /// seen from it before. Otherwise two idle controllers would trade
    /// places every tick. After a failed read any live slot qualifies.
    pub fn hot_swap(
        &mut self,
        backend: &dyn DeviceBackend,
        require_fresh: bool,
    ) -> Option<ControllerState> {
        let current = self.tracked;
        for slot in DeviceSlot::all().filter(|slot| *slot != current) {
            let Ok((state, before)) = self.observe(backend, slot) else {
                trace!("Hot-swap scan: {} not connected", slot);
                continue;
            };
            if state.packet_number == 0 {
                continue;
            }
            if require_fresh && before == Some(state.packet_number) {
                continue;
            }
            info!("Switching tracked controller from {} to {}", current, slot);
            self.tracked = slot;
            return Some(state);
        }
        None
    }

    /// Full scan of all slots, adopting the first one that answers.
    pub fn rescan(&mut self, backend: &dyn DeviceBackend) -> Option<ControllerState> {
        debug!("Rescanning all controller slots");
        for slot in DeviceSlot::all() {
            if let Ok((state, _)) = self.observe(backend, slot) {
                if slot != self.tracked {
                    info!("Reconnected on {} (was {})", slot, self.tracked);
                } else {
                    info!("Reconnected on {}", slot);
                }
                self.tracked = slot;
                return Some(state);
            }
        }
        debug!("No controller found during rescan");
        None
    }
}

/// De-rates full rescans while the tracked device keeps failing.
#[derive(Debug, Clone)]
pub struct ReconnectSupervisor {
    failures: u32,
    threshold: u32,
}

impl ReconnectSupervisor {
    pub fn new(threshold: u32) -> Self {
        Self {
            failures: 0,
            threshold: threshold.max(1),
        }
    }

    /// Counts one failed read; returns true when a rescan is due.
    pub fn record_failure(&mut self) -> bool {
        self.failures += 1;
        if self.failures < self.threshold {
            return false;
        }
        self.failures = 0;
        true
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}
