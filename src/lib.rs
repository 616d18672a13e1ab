//! Gamepad polling engine for keyboard-less UIs.
//!
//! [`controller`] turns a polled gamepad into discrete navigation events,
//! [`feedback`] adds rumble profiles on top, and [`config`] loads both from
//! a TOML file.

pub mod config;
pub mod controller;
pub mod feedback;
