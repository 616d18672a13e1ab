//! "Is input currently active" capability supplied by the UI layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read once per tick from the polling task, without any other synchronisation.
pub trait InputGate: Send + Sync + 'static {
    fn is_input_active(&self) -> bool;
}

/// Lock-free gate backed by a shared flag.
///
/// Clones share the same flag; the UI keeps one clone and flips it on
/// visibility or minimise changes.
#[derive(Debug, Clone)]
pub struct AtomicInputGate {
    active: Arc<AtomicBool>,
}

impl AtomicInputGate {
    pub fn new(active: bool) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(active)),
        }
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }
}

impl Default for AtomicInputGate {
    fn default() -> Self {
        Self::new(true)
    }
}

impl InputGate for AtomicInputGate {
    fn is_input_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Gate that never closes, for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysActive;

impl InputGate for AlwaysActive {
    fn is_input_active(&self) -> bool {
        true
    }
}
