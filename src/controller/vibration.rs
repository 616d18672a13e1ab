//! Timed rumble pulses.
//!
//! Each pulse is its own task: motors on, wait, motors off. Every pulse task
//! holds a child of the session's vibration token, so disposal cancels the
//! wait and the task exits without writing the stop command itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::controller::device::DeviceBackend;
use crate::controller::state::DeviceSlot;

/// Spawns rumble pulses on the session's runtime.
///
/// Pulses run independently of the polling loop, so pausing input does not
/// cut a pulse short. [`cancel_all`](Vibrator::cancel_all) is one-way: once
/// the session token is cancelled, later pulses still write their start
/// command but end immediately without the stop write, which the session
/// performs itself during disposal.
pub struct Vibrator {
    backend: Arc<dyn DeviceBackend>,
    runtime: Handle,
    shutdown: CancellationToken,
}

impl Vibrator {
    pub fn new(backend: Arc<dyn DeviceBackend>, runtime: Handle) -> Self {
        Self {
            backend,
            runtime,
            shutdown: CancellationToken::new(),
        }
    }

    /// Starts a pulse on `slot`. Callers may drop the handle; overlapping
    /// pulses simply overwrite each other's motor speed.
    pub fn pulse(&self, slot: DeviceSlot, strength: u16, duration: Duration) -> JoinHandle<()> {
        let backend = self.backend.clone();
        let token = self.shutdown.child_token();
        self.runtime.spawn(async move {
            if let Err(e) = backend.set_vibration(slot, strength, strength) {
                debug!("Vibration start ignored: {}", e);
                return;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Vibration on {} cancelled", slot);
                }
                _ = tokio::time::sleep(duration) => {
                    if let Err(e) = backend.set_vibration(slot, 0, 0) {
                        debug!("Vibration stop ignored: {}", e);
                    }
                }
            }
        })
    }

    /// Best-effort motor stop.
    pub fn stop(&self, slot: DeviceSlot) {
        if let Err(e) = self.backend.set_vibration(slot, 0, 0) {
            debug!("Vibration stop ignored: {}", e);
        }
    }

    /// Cancels every pulse that is still waiting.
    pub fn cancel_all(&self) {
        self.shutdown.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::test_support::ScriptedBackend;

    fn slot0() -> DeviceSlot {
        DeviceSlot::new(0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn pulse_sets_then_clears_motors() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.connect(slot0(), 1);
        let vibrator = Vibrator::new(backend.clone(), Handle::current());

        vibrator
            .pulse(slot0(), 8000, Duration::from_millis(30))
            .await
            .unwrap();
        assert_eq!(
            backend.vibration_log(),
            vec![(slot0(), 8000, 8000), (slot0(), 0, 0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_pulse_skips_stop_write() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.connect(slot0(), 1);
        let vibrator = Vibrator::new(backend.clone(), Handle::current());

        let pulse = vibrator.pulse(slot0(), 20000, Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(10)).await;
        vibrator.cancel_all();
        pulse.await.unwrap();

        assert_eq!(backend.vibration_log(), vec![(slot0(), 20000, 20000)]);
        assert!(vibrator.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_slot_is_ignored() {
        let backend = Arc::new(ScriptedBackend::new());
        let vibrator = Vibrator::new(backend.clone(), Handle::current());
        vibrator
            .pulse(slot0(), 5000, Duration::from_millis(20))
            .await
            .unwrap();
        vibrator.stop(slot0());
        assert!(backend.vibration_log().is_empty());
    }
}
