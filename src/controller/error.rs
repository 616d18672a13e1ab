//! Error types for the controller subsystem
//!
//! Configuration problems are rejected up front as [`ConfigError`], before a
//! polling loop exists. [`ControllerError`] covers everything a running or
//! starting session can report. Device read failures never surface here:
//! the poll cycle treats them as a disconnected slot and retries.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid configuration, rejected before any loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Slot index outside `0..=3`
    #[error("Controller slot {0} is out of range (expected 0-3)")]
    InvalidSlot(u8),

    /// Repeat interval of zero ticks
    #[error("Repeat interval must be at least one tick")]
    InvalidRepeatInterval,

    /// Deadzone band that is inverted or outside the axis range
    #[error("Invalid thumbstick deadzone: {0}")]
    InvalidDeadzone(String),

    #[error("Poll interval must be at least 1 ms")]
    InvalidPollInterval,

    #[error("Reconnect threshold must be at least 1")]
    InvalidReconnectThreshold,

    /// Config file exists but could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or holds out-of-range values
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Errors that can occur while starting or running a session.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Settings failed validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session has been disposed.
    #[error("Controller session has been disposed")]
    Disposed,

    /// A tick panicked while holding session state.
    #[error("Controller state lock poisoned: {0}")]
    LockPoisoned(String),

    /// Indicates system-level problems during startup, such as no tokio runtime.
    #[error("Initialization error: {0}")]
    InitializationError(String),
}
