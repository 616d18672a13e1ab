use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use padpoll::config::AppConfig;
use padpoll::controller::{
    first_connected_slot, AtomicInputGate, ControllerEvent, ControllerHandle, GilrsBackend,
};
use padpoll::feedback::{patterns, FeedbackService};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = AppConfig::load().map_err(|e| eyre!("Failed to load config: {}", e))?;
    let mut settings = config.controller;

    let backend =
        Arc::new(GilrsBackend::new().map_err(|e| eyre!("Failed to open gamepads: {}", e))?);
    settings.slot = first_connected_slot(backend.as_ref());
    info!("Tracking {} initially", settings.slot);

    let gate = Arc::new(AtomicInputGate::default());
    let mut handle = ControllerHandle::spawn(settings, backend, gate)
        .map_err(|e| eyre!("Failed to spawn controller: {}", e))?;

    // Listeners run on the polling task; forward into our own loop.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    for event in ControllerEvent::ALL {
        let tx = event_tx.clone();
        handle
            .subscribe(event, move || {
                let _ = tx.send(event);
            })
            .map_err(|e| eyre!("Failed to subscribe: {}", e))?;
    }
    drop(event_tx);

    let mut haptics = config.feedback.enable_vibration;
    let mut feedback = FeedbackService::new(config.feedback);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                info!("{} (held: {:?})", event, handle.held_state());
                let profile = match event {
                    ControllerEvent::UpPressed
                    | ControllerEvent::DownPressed
                    | ControllerEvent::LeftPressed
                    | ControllerEvent::RightPressed
                    | ControllerEvent::LeftRepeat
                    | ControllerEvent::RightRepeat => Some(patterns::CURSOR_MOVE),
                    ControllerEvent::APressed => Some(patterns::COPY_SUCCESS),
                    ControllerEvent::XPressed => Some(patterns::CLEAR_INPUT),
                    ControllerEvent::BPressed => Some(patterns::RETURN_START),
                    ControllerEvent::StartPressed => {
                        haptics = !haptics;
                        feedback.set_enabled(haptics);
                        info!("Haptics {}", if haptics { "on" } else { "off" });
                        Some(patterns::SHOW_INPUT)
                    }
                    _ => None,
                };
                if let Some(profile) = profile {
                    feedback.play(&handle, profile);
                }
            }
        }
    }

    if !handle.is_polling() {
        warn!("Polling loop was no longer running at shutdown");
    }
    handle.dispose().await;
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
