//! Fixed-period polling loop as a statum state machine.
//!
//! ```text
//! Idle ──start──► Polling ──(cancelled / disposed / fault)──► Stopped
//! ```
//!
//! A loop instance lives for exactly one cancellation token. Pausing cancels
//! it; resuming builds a new one.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use statum::{machine, state};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::controller::device::DeviceBackend;
use crate::controller::error::ControllerError;
use crate::controller::event_processor::EventProcessor;
use crate::controller::events::Subscriptions;
use crate::controller::input_gate::InputGate;

/// State shared between the session handle and whichever loop is running.
pub struct SessionShared {
    pub processor: Mutex<EventProcessor>,
    pub backend: Arc<dyn DeviceBackend>,
    pub gate: Arc<dyn InputGate>,
    pub subscriptions: Subscriptions,
    disposed: AtomicBool,
}

impl SessionShared {
    pub fn new(
        processor: EventProcessor,
        backend: Arc<dyn DeviceBackend>,
        gate: Arc<dyn InputGate>,
    ) -> Self {
        Self {
            processor: Mutex::new(processor),
            backend,
            gate,
            subscriptions: Subscriptions::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Returns false if the session was already disposed.
    pub fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }

    /// One poll cycle plus dispatch. Returns the number of listeners invoked.
    pub fn tick(&self) -> Result<usize, ControllerError> {
        let report = {
            let mut processor = self
                .processor
                .lock()
                .map_err(|e| ControllerError::LockPoisoned(e.to_string()))?;
            processor.poll(self.backend.as_ref(), self.gate.is_input_active())
        };
        Ok(self.subscriptions.dispatch(&report.events))
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum PollingState {
    Idle,
    Polling,
    Stopped,
}

#[machine]
pub struct PollingLoop<S: PollingState> {
    shared: Arc<SessionShared>,
    token: CancellationToken,
    period: Duration,
    ticks: u64,
}

impl PollingLoop<Idle> {
    pub fn create(shared: Arc<SessionShared>, token: CancellationToken, period: Duration) -> Self {
        Self::new(shared, token, period, 0)
    }

    pub fn start(self) -> PollingLoop<Polling> {
        info!("Starting polling loop with {:?} period", self.period);
        self.transition()
    }
}

impl PollingLoop<Polling> {
    /// Ticks until the token is cancelled, the session is disposed, or a
    /// tick faults. Cancellation during the wait is a normal stop.
    pub async fn run_until_cancelled(mut self) -> PollingLoop<Stopped> {
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut window_ticks: u64 = 0;
        let mut window_events: usize = 0;
        let mut last_stats_time = Local::now();
        let stats_interval = chrono::Duration::seconds(30);

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    debug!("Polling loop cancelled while waiting");
                    break;
                }
                _ = interval.tick() => {}
            }

            if self.token.is_cancelled() || self.shared.is_disposed() {
                break;
            }

            let shared = &self.shared;
            match panic::catch_unwind(AssertUnwindSafe(|| shared.tick())) {
                Ok(Ok(invoked)) => {
                    window_events += invoked;
                }
                Ok(Err(e)) => {
                    error!("Polling loop stopped: {}", e);
                    break;
                }
                Err(_) => {
                    error!("Polling tick panicked, stopping loop");
                    break;
                }
            }

            self.ticks += 1;
            window_ticks += 1;

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                info!(
                    "Polling stats: {} ticks, {} listener calls in {} seconds",
                    window_ticks,
                    window_events,
                    (now - last_stats_time).num_seconds()
                );
                window_ticks = 0;
                window_events = 0;
                last_stats_time = now;
            }
        }

        self.transition()
    }
}

impl PollingLoop<Stopped> {
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
