//! Controller Handle - lifecycle API for a polling session
//!
//! Owns one session: the poll-cycle state, the listener registry, and the
//! currently running [`PollingLoop`](super::polling_loop::PollingLoop) task.
//! The handle is the only way to pause, resume, or dispose the loop.
//!
//! # Lifecycle
//!
//! ```text
//! spawn ──► Polling ◄──resume── Paused
//!              │ └────pause────►  │
//!              └─────dispose──────┴──► Disposed
//! ```
//!
//! Every loop instance gets its own cancellation token, so a stale loop from
//! before a pause can never keep ticking next to the new one.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::device::DeviceBackend;
use crate::controller::error::{ConfigError, ControllerError};
use crate::controller::event_processor::{EventProcessor, ProcessorSettings};
use crate::controller::events::{ControllerEvent, HeldState, SubscriptionId};
use crate::controller::input_gate::InputGate;
use crate::controller::polling_loop::{PollingLoop, SessionShared};
use crate::controller::repeat::RepeatSettings;
use crate::controller::state::DeviceSlot;
use crate::controller::stick::ThumbDeadzone;
use crate::controller::vibration::Vibrator;

/// Configuration for one polling session.
///
/// All fields have working defaults; a TOML `[controller]` table may set any
/// subset of them. [`validate`](ControllerSettings::validate) runs before a
/// session starts, so a bad table never produces a running loop.
///
/// # Timing
///
/// Repeat timing and the reconnect threshold are counted in ticks, not
/// milliseconds. Changing `poll_interval_ms` therefore scales them too: at
/// the default 16 ms, a 20-tick repeat delay is about 320 ms and the
/// 30-tick reconnect threshold is about half a second.
///
/// # Performance Impact
///
/// - `poll_interval_ms`: each tick is one device read (four while the
///   tracked device is silent or gone). Going much below 16 ms buys little
///   since most pads report at 60-125 Hz.
/// - `reconnect_threshold`: lower values rescan sooner after an unplug but
///   hammer an empty bus more often while nothing is connected.
/// - `deadzone`: a wider gap between `enter` and `exit` stops a resting
///   stick from chattering on worn pads, at the cost of a stickier release.
///
/// # Examples
///
/// ```rust
/// use padpoll::controller::ControllerSettings;
///
/// let settings = ControllerSettings::for_slot(1).unwrap();
/// assert_eq!(settings.poll_interval_ms, 16);
/// assert!(ControllerSettings::for_slot(4).is_err());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Slot to track first. Device selection may move away from it.
    pub slot: DeviceSlot,

    /// Stick-to-D-pad hysteresis band.
    ///
    /// A direction turns on above `enter` and stays on until the axis falls
    /// to `exit` or below. `enter` must be strictly greater than `exit`.
    pub deadzone: ThumbDeadzone,

    /// Left/right auto-repeat timing, in ticks.
    pub repeat: RepeatSettings,

    /// Poll period in milliseconds.
    pub poll_interval_ms: u64,

    /// Consecutive failed reads before a full rescan of all slots.
    pub reconnect_threshold: u32,

    /// Trigger byte value above which a trigger counts as held.
    ///
    /// Analog triggers rarely rest at exactly zero; 30 of 255 ignores the
    /// slack on common pads.
    pub trigger_threshold: u8,

    /// Upper bound on how long `dispose` waits for the loop to exit.
    pub dispose_timeout_ms: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            slot: DeviceSlot::default(),
            deadzone: ThumbDeadzone::default(),
            repeat: RepeatSettings::default(),
            poll_interval_ms: 16,
            reconnect_threshold: 30,
            trigger_threshold: 30,
            dispose_timeout_ms: 250,
        }
    }
}

impl ControllerSettings {
    /// Default settings tracking the given slot index.
    pub fn for_slot(index: u8) -> Result<Self, ConfigError> {
        Ok(Self {
            slot: DeviceSlot::new(index)?,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.deadzone.validate()?;
        self.repeat.validate()?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        if self.reconnect_threshold == 0 {
            return Err(ConfigError::InvalidReconnectThreshold);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn dispose_timeout(&self) -> Duration {
        Duration::from_millis(self.dispose_timeout_ms)
    }

    fn processor_settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            deadzone: self.deadzone,
            repeat: self.repeat,
            trigger_threshold: self.trigger_threshold,
            reconnect_threshold: self.reconnect_threshold,
        }
    }
}

struct PollingTask {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Handle for one polling session.
///
/// Methods take `&mut self` where they change which loop is running, so a
/// single owner (usually the UI thread) drives the lifecycle. Listener
/// callbacks run on the runtime's worker thread; marshal them yourself if
/// they need to touch thread-affine state.
pub struct ControllerHandle {
    settings: ControllerSettings,
    shared: Arc<SessionShared>,
    runtime: Handle,
    polling: Option<PollingTask>,
    vibrator: Vibrator,
}

impl ControllerHandle {
    /// Validates `settings` and starts polling on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// * [`ControllerError::Config`] - slot out of range, repeat interval of
    ///   zero, or an inverted deadzone band
    /// * [`ControllerError::InitializationError`] - called outside a runtime
    pub fn spawn(
        settings: ControllerSettings,
        backend: Arc<dyn DeviceBackend>,
        gate: Arc<dyn InputGate>,
    ) -> Result<Self, ControllerError> {
        info!("Initializing controller session with settings: {:?}", settings);
        settings.validate()?;

        let runtime = Handle::try_current()
            .map_err(|e| ControllerError::InitializationError(e.to_string()))?;

        let processor = EventProcessor::new(settings.slot, settings.processor_settings());
        let shared = Arc::new(SessionShared::new(processor, backend.clone(), gate));
        let vibrator = Vibrator::new(backend, runtime.clone());

        let mut handle = Self {
            settings,
            shared,
            runtime,
            polling: None,
            vibrator,
        };
        handle.start_polling();
        info!("Controller session started on {}", handle.settings.slot);
        Ok(handle)
    }

    fn start_polling(&mut self) {
        let token = CancellationToken::new();
        let worker = PollingLoop::create(
            self.shared.clone(),
            token.clone(),
            self.settings.poll_interval(),
        )
        .start();
        let task = self.runtime.spawn(async move {
            let stopped = worker.run_until_cancelled().await;
            debug!("Polling loop exited after {} ticks", stopped.ticks());
        });
        self.polling = Some(PollingTask { token, task });
    }

    fn stop_polling(&mut self) -> Option<JoinHandle<()>> {
        let PollingTask { token, task } = self.polling.take()?;
        token.cancel();
        Some(task)
    }

    /// Stops the loop. State is kept; `resume` picks up where it left off.
    pub fn pause(&mut self) {
        if self.stop_polling().is_some() {
            info!("Controller polling paused");
        }
    }

    /// Starts a fresh loop if none is running. No-op after dispose.
    pub fn resume(&mut self) {
        if self.shared.is_disposed() {
            debug!("Resume ignored, session disposed");
            return;
        }
        if self.is_polling() {
            return;
        }
        // A loop that ended on its own (panic, poisoned state) is replaced.
        self.stop_polling();
        self.start_polling();
        info!("Controller polling resumed");
    }

    pub fn is_polling(&self) -> bool {
        self.polling
            .as_ref()
            .is_some_and(|p| !p.token.is_cancelled() && !p.task.is_finished())
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn tracked_slot(&self) -> DeviceSlot {
        self.shared
            .processor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tracked_slot()
    }

    pub fn held_state(&self) -> HeldState {
        self.shared
            .processor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .held()
    }

    /// Registers `listener` for `event`. Fails once the session is disposed.
    pub fn subscribe<F>(
        &self,
        event: ControllerEvent,
        listener: F,
    ) -> Result<SubscriptionId, ControllerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.subscriptions.subscribe(event, listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.subscriptions.unsubscribe(id)
    }

    /// Pulses both motors of the tracked device. Returns `None` after dispose.
    pub fn vibrate(&self, strength: u16, duration: Duration) -> Option<JoinHandle<()>> {
        if self.shared.is_disposed() {
            return None;
        }
        let slot = self.tracked_slot();
        debug!("Vibrating {} at {} for {:?}", slot, strength, duration);
        Some(self.vibrator.pulse(slot, strength, duration))
    }

    /// Shuts the session down. Safe to call more than once.
    ///
    /// Listeners are closed before waiting, so no event is delivered after
    /// this returns. The wait for the loop is bounded by
    /// `dispose_timeout_ms`; a loop that overruns is left to observe its
    /// cancelled token on its own.
    pub async fn dispose(&mut self) {
        let Some(task) = self.begin_dispose() else {
            return;
        };
        if let Some(task) = task {
            match tokio::time::timeout(self.settings.dispose_timeout(), task).await {
                Ok(Ok(())) => debug!("Polling loop joined"),
                Ok(Err(e)) => warn!("Polling task ended abnormally: {}", e),
                Err(_) => warn!(
                    "Polling loop did not stop within {:?}",
                    self.settings.dispose_timeout()
                ),
            }
        }
        self.vibrator.stop(self.tracked_slot());
        info!("Controller session disposed");
    }

    // Outer None: already disposed. Inner: the loop task to wait for, if any.
    fn begin_dispose(&mut self) -> Option<Option<JoinHandle<()>>> {
        if !self.shared.mark_disposed() {
            return None;
        }
        info!("Disposing controller session");
        let task = self.stop_polling();
        self.vibrator.cancel_all();
        self.shared.subscriptions.close();
        Some(task)
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        if self.begin_dispose().is_some() {
            self.vibrator.stop(self.tracked_slot());
            debug!("Controller session dropped without dispose");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};

    use crate::controller::input_gate::{AlwaysActive, AtomicInputGate};
    use crate::controller::state::Buttons;
    use crate::controller::test_support::ScriptedBackend;

    fn slot0() -> DeviceSlot {
        DeviceSlot::new(0).unwrap()
    }

    fn connected() -> Arc<ScriptedBackend> {
        let backend = Arc::new(ScriptedBackend::new());
        backend.connect(slot0(), 1);
        backend
    }

    fn spawn(backend: &Arc<ScriptedBackend>) -> ControllerHandle {
        ControllerHandle::spawn(
            ControllerSettings::default(),
            backend.clone(),
            Arc::new(AlwaysActive),
        )
        .unwrap()
    }

    fn counter(handle: &ControllerHandle, event: ControllerEvent) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let clone = hits.clone();
        handle
            .subscribe(event, move || {
                clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        hits
    }

    async fn ticks(n: u64) {
        tokio::time::sleep(Duration::from_millis(16 * n + 1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn events_flow_through_the_loop() {
        let backend = connected();
        let mut handle = spawn(&backend);
        let a = counter(&handle, ControllerEvent::APressed);

        ticks(2).await;
        backend.press(slot0(), Buttons::A | Buttons::LEFT_SHOULDER);
        ticks(2).await;

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert!(handle.held_state().left_shoulder);
        assert_eq!(handle.tracked_slot(), slot0());
        handle.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_settings_are_rejected() {
        let backend = connected();
        let mut settings = ControllerSettings::default();
        settings.repeat.interval_frames = 0;
        let result = ControllerHandle::spawn(settings, backend.clone(), Arc::new(AlwaysActive));
        assert!(matches!(
            result,
            Err(ControllerError::Config(ConfigError::InvalidRepeatInterval))
        ));
        assert!(matches!(
            ControllerSettings::for_slot(9),
            Err(ConfigError::InvalidSlot(9))
        ));

        ticks(5).await;
        assert_eq!(backend.total_samples(), 0);
    }

    #[test]
    fn spawn_outside_runtime_fails() {
        let backend = connected();
        let result = ControllerHandle::spawn(
            ControllerSettings::default(),
            backend,
            Arc::new(AlwaysActive),
        );
        assert!(matches!(
            result,
            Err(ControllerError::InitializationError(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_is_idempotent_and_silences_listeners() {
        let backend = connected();
        let mut handle = spawn(&backend);
        let a = counter(&handle, ControllerEvent::APressed);
        ticks(1).await;

        handle.dispose().await;
        handle.dispose().await;
        assert!(handle.is_disposed());
        assert!(!handle.is_polling());

        backend.press(slot0(), Buttons::A);
        ticks(5).await;
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert!(matches!(
            handle.subscribe(ControllerEvent::BPressed, || {}),
            Err(ControllerError::Disposed)
        ));
        assert!(handle.vibrate(1000, Duration::from_millis(10)).is_none());

        handle.resume();
        assert!(!handle.is_polling());
        // Exactly one best-effort motor stop.
        assert_eq!(backend.vibration_log(), vec![(slot0(), 0, 0)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 3)]
    async fn dispose_waits_for_in_flight_dispatch() {
        let backend = connected();
        let mut handle = spawn(&backend);

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        let calls = Arc::new(AtomicUsize::new(0));
        let returned = Arc::new(AtomicBool::new(false));
        let (calls_in, returned_in) = (calls.clone(), returned.clone());
        handle
            .subscribe(ControllerEvent::APressed, move || {
                calls_in.fetch_add(1, Ordering::SeqCst);
                let _ = entered_tx.lock().unwrap().send(());
                let _ = release_rx.lock().unwrap().recv();
                returned_in.store(true, Ordering::SeqCst);
            })
            .unwrap();

        backend.press(slot0(), Buttons::A);
        tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .expect("listener was never reached");

        // The tick is now parked inside the listener.
        let dispose = tokio::spawn(async move {
            handle.dispose().await;
            handle
        });
        std::thread::sleep(Duration::from_millis(50));
        assert!(!dispose.is_finished());
        assert!(!returned.load(Ordering::SeqCst));

        release_tx.send(()).unwrap();
        let handle = dispose.await.unwrap();
        assert!(returned.load(Ordering::SeqCst));
        assert!(handle.is_disposed());

        backend.release(slot0(), Buttons::A);
        backend.press(slot0(), Buttons::A);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_sampling_and_resume_restarts() {
        let backend = connected();
        let mut handle = spawn(&backend);
        ticks(3).await;

        handle.pause();
        assert!(!handle.is_polling());
        let paused_at = backend.sample_count(slot0());
        ticks(10).await;
        assert_eq!(backend.sample_count(slot0()), paused_at);

        handle.resume();
        handle.resume();
        assert!(handle.is_polling());
        ticks(10).await;
        let delta = backend.sample_count(slot0()) - paused_at;
        // One loop, not two.
        assert!((9..=11).contains(&delta), "delta was {delta}");
        handle.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn closed_gate_suppresses_events() {
        let backend = connected();
        let gate = AtomicInputGate::new(false);
        let mut handle = ControllerHandle::spawn(
            ControllerSettings::default(),
            backend.clone(),
            Arc::new(gate.clone()),
        )
        .unwrap();
        let a = counter(&handle, ControllerEvent::APressed);
        ticks(1).await;

        backend.press(slot0(), Buttons::A);
        ticks(2).await;
        assert_eq!(a.load(Ordering::SeqCst), 0);

        gate.set_active(true);
        backend.release(slot0(), Buttons::A);
        ticks(1).await;
        backend.press(slot0(), Buttons::A);
        ticks(1).await;
        assert_eq!(a.load(Ordering::SeqCst), 1);
        handle.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_listener_ends_loop_and_resume_recovers() {
        let backend = connected();
        let mut handle = spawn(&backend);
        let id = handle
            .subscribe(ControllerEvent::StartPressed, || panic!("listener failure"))
            .unwrap();
        ticks(1).await;

        backend.press(slot0(), Buttons::START);
        ticks(2).await;
        assert!(!handle.is_polling());

        assert!(handle.unsubscribe(id));
        handle.resume();
        assert!(handle.is_polling());
        let b = counter(&handle, ControllerEvent::BPressed);
        ticks(1).await;
        backend.press(slot0(), Buttons::B);
        ticks(1).await;
        assert_eq!(b.load(Ordering::SeqCst), 1);
        handle.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn vibrate_pulses_tracked_device() {
        let backend = connected();
        let mut handle = spawn(&backend);

        handle
            .vibrate(20000, Duration::from_millis(50))
            .unwrap()
            .await
            .unwrap();
        assert_eq!(
            backend.vibration_log(),
            vec![(slot0(), 20000, 20000), (slot0(), 0, 0)]
        );
        handle.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_cancels_inflight_vibration() {
        let backend = connected();
        let mut handle = spawn(&backend);

        let pulse = handle.vibrate(20000, Duration::from_secs(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.dispose().await;
        pulse.await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        // Start write from the pulse, stop write from dispose, nothing else.
        assert_eq!(
            backend.vibration_log(),
            vec![(slot0(), 20000, 20000), (slot0(), 0, 0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_the_loop() {
        let backend = connected();
        let handle = spawn(&backend);
        ticks(2).await;

        drop(handle);
        ticks(1).await;
        let after_drop = backend.sample_count(slot0());
        ticks(10).await;
        assert_eq!(backend.sample_count(slot0()), after_drop);
        assert_eq!(backend.vibration_log(), vec![(slot0(), 0, 0)]);
    }
}
