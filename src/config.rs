use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::controller::{ConfigError, ControllerSettings};
use crate::feedback::FeedbackSettings;

const CONFIG_DIR: &str = "padpoll";
const CONFIG_FILE: &str = "config.toml";

/// Top-level config file. Every table and field is optional.
///
/// ```toml
/// [controller]
/// slot = 1
/// repeat = { initial_delay_frames = 20, interval_frames = 3 }
///
/// [feedback]
/// vibration_intensity = 0.5
/// ```
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(default)]
pub struct AppConfig {
    pub controller: ControllerSettings,
    pub feedback: FeedbackSettings,
}

impl AppConfig {
    /// `<config dir>/padpoll/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Loads from the default location, falling back to defaults when the
    /// file or the config dir does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.controller.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::DeviceSlot;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("padpoll-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("padpoll-definitely-missing.toml");
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.controller.poll_interval_ms, 16);
        assert_eq!(config.controller.repeat.initial_delay_frames, 20);
        assert_eq!(config.controller.deadzone.enter, 7849);
        assert!(config.feedback.enable_vibration);
    }

    #[test]
    fn partial_tables_keep_defaults() {
        let path = write_temp(
            "partial.toml",
            r#"
[controller]
slot = 2
repeat = { interval_frames = 5 }

[feedback]
vibration_intensity = 0.25
"#,
        );
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.controller.slot, DeviceSlot::new(2).unwrap());
        assert_eq!(config.controller.repeat.interval_frames, 5);
        assert_eq!(config.controller.repeat.initial_delay_frames, 20);
        assert_eq!(config.controller.trigger_threshold, 30);
        assert_eq!(config.feedback.vibration_intensity, 0.25);
    }

    #[test]
    fn out_of_range_slot_is_a_parse_error() {
        let path = write_temp("slot.toml", "[controller]\nslot = 4\n");
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn zero_repeat_interval_is_rejected() {
        let path = write_temp(
            "interval.toml",
            "[controller.repeat]\ninterval_frames = 0\n",
        );
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::InvalidRepeatInterval)
        ));
    }

    #[test]
    fn round_trips_through_toml() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.controller.slot, DeviceSlot::default());
        assert_eq!(parsed.feedback, FeedbackSettings::default());
    }
}
