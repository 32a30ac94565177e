//! Configuration data structures and TOML parsing.
//!
//! The config file is optional and read-only; every key has a default.
//! Example:
//!
//! ```toml
//! [global]
//! log_level = "info"
//! log_file = "/var/log/trackscroll.log"
//!
//! [device]
//! device_usb_id = "046d:c408"
//!
//! [scroll]
//! trigger_button = "side"          # or a list: ["side", "extra"]
//! threshold = 10
//! wheel_factor = 1
//! emulate_middle_button = true
//! horizontal_scroll = false
//! prefer_axis = false
//! reverse_vertical = false
//! reverse_horizontal = false
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use evdev::Key;
use log::debug;
use serde::Deserialize;
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::event::parse_usb_id;

/// Top-level error type used throughout the crate.
#[derive(Debug, Error)]
pub enum TrackscrollError {
    #[error("Failed to read config file {path}: {source}")]
    ConfigReadError { path: PathBuf, source: io::Error },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    #[error("Invalid value for '{key}': {message}")]
    InvalidSetting { key: &'static str, message: String },

    #[error("No matching pointer device found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to grab device {path}: {source}")]
    Grab { path: PathBuf, source: io::Error },

    #[error("Failed to create virtual pointer: {0}")]
    VirtualDevice(#[source] io::Error),
}

impl TrackscrollError {
    /// Process exit code: 1 for configuration problems, 2 when the input
    /// interception itself could not be set up.
    pub fn exit_code(&self) -> u8 {
        match self {
            TrackscrollError::ConfigReadError { .. }
            | TrackscrollError::ConfigParseError { .. }
            | TrackscrollError::InvalidSetting { .. } => 1,
            TrackscrollError::DeviceNotFound(_)
            | TrackscrollError::Grab { .. }
            | TrackscrollError::VirtualDevice(_) => 2,
        }
    }
}

/// Auxiliary buttons that can start a scroll gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TriggerButton {
    #[default]
    Side,
    Extra,
    Forward,
    Back,
    Task,
}

impl TriggerButton {
    pub fn key(self) -> Key {
        match self {
            TriggerButton::Side => Key::BTN_SIDE,
            TriggerButton::Extra => Key::BTN_EXTRA,
            TriggerButton::Forward => Key::BTN_FORWARD,
            TriggerButton::Back => Key::BTN_BACK,
            TriggerButton::Task => Key::BTN_TASK,
        }
    }
}

/// Root of the TOML config file.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    global: RawGlobal,
    device: RawDevice,
    scroll: RawScroll,
}

/// The `[global]` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawGlobal {
    log_level: Option<String>,
    log_file: Option<String>,
}

/// The `[device]` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawDevice {
    device_usb_id: Option<String>,
}

/// `trigger_button` takes a single name or a list of names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawButtons {
    One(String),
    Many(Vec<String>),
}

impl RawButtons {
    fn into_names(self) -> Vec<String> {
        match self {
            RawButtons::One(name) => vec![name],
            RawButtons::Many(names) => names,
        }
    }
}

/// The `[scroll]` section - all optional, defaults fill the gaps.
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawScroll {
    trigger_button: Option<RawButtons>,
    threshold: Option<i64>,
    wheel_factor: Option<i64>,
    emulate_middle_button: Option<bool>,
    horizontal_scroll: Option<bool>,
    prefer_axis: Option<bool>,
    reverse_vertical: Option<bool>,
    reverse_horizontal: Option<bool>,
}

/// Validated scroll behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollSettings {
    /// Any of these buttons starts a gesture; never empty.
    pub trigger_buttons: Vec<TriggerButton>,
    /// Accumulated displacement (in pointer units) that must be strictly
    /// exceeded before a wheel tick fires.
    pub threshold: i32,
    /// Number of wheel events emitted per tick.
    pub wheel_factor: u32,
    pub emulate_middle_button: bool,
    pub horizontal_scroll: bool,
    pub prefer_axis: bool,
    pub reverse_vertical: bool,
    pub reverse_horizontal: bool,
}

impl ScrollSettings {
    pub fn trigger_keys(&self) -> Vec<Key> {
        self.trigger_buttons.iter().map(|b| b.key()).collect()
    }
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self {
            trigger_buttons: vec![TriggerButton::default()],
            threshold: 10,
            wheel_factor: 1,
            emulate_middle_button: true,
            horizontal_scroll: false,
            prefer_axis: false,
            reverse_vertical: false,
            reverse_horizontal: false,
        }
    }
}

/// Which device to grab.  `None` means the first pointer that has the
/// trigger button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceConfig {
    pub device_usb_id: Option<String>,
}

/// Top-level parsed configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub log_level: String,
    pub log_file: Option<String>,
    pub device: DeviceConfig,
    pub scroll: ScrollSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
            device: DeviceConfig::default(),
            scroll: ScrollSettings::default(),
        }
    }
}

impl RawScroll {
    fn into_validated(self) -> Result<ScrollSettings, TrackscrollError> {
        let defaults = ScrollSettings::default();

        let trigger_buttons = match self.trigger_button {
            None => defaults.trigger_buttons,
            Some(raw) => parse_trigger_buttons(raw.into_names())?,
        };

        let threshold = match self.threshold {
            None => defaults.threshold,
            Some(t) => i32::try_from(t)
                .ok()
                .filter(|t| *t >= 0)
                .ok_or_else(|| TrackscrollError::InvalidSetting {
                    key: "threshold",
                    message: format!("{t} is not a non-negative 32-bit integer"),
                })?,
        };

        let wheel_factor = match self.wheel_factor {
            None => defaults.wheel_factor,
            Some(f) => u32::try_from(f)
                .ok()
                .filter(|f| *f >= 1)
                .ok_or_else(|| TrackscrollError::InvalidSetting {
                    key: "wheel_factor",
                    message: format!("{f} must be at least 1"),
                })?,
        };

        Ok(ScrollSettings {
            trigger_buttons,
            threshold,
            wheel_factor,
            emulate_middle_button: self
                .emulate_middle_button
                .unwrap_or(defaults.emulate_middle_button),
            horizontal_scroll: self.horizontal_scroll.unwrap_or(defaults.horizontal_scroll),
            prefer_axis: self.prefer_axis.unwrap_or(defaults.prefer_axis),
            reverse_vertical: self.reverse_vertical.unwrap_or(defaults.reverse_vertical),
            reverse_horizontal: self
                .reverse_horizontal
                .unwrap_or(defaults.reverse_horizontal),
        })
    }
}

fn parse_trigger_buttons(names: Vec<String>) -> Result<Vec<TriggerButton>, TrackscrollError> {
    let mut buttons = Vec::with_capacity(names.len());
    for name in names {
        let button = name
            .parse::<TriggerButton>()
            .map_err(|_| TrackscrollError::InvalidSetting {
                key: "trigger_button",
                message: format!(
                    "unknown button '{name}' (expected side, extra, forward, back or task)"
                ),
            })?;
        if !buttons.contains(&button) {
            buttons.push(button);
        }
    }
    if buttons.is_empty() {
        return Err(TrackscrollError::InvalidSetting {
            key: "trigger_button",
            message: "at least one button is required".to_string(),
        });
    }
    Ok(buttons)
}

impl RawDevice {
    fn into_validated(self) -> Result<DeviceConfig, TrackscrollError> {
        let device_usb_id = self.device_usb_id.filter(|s| !s.is_empty());
        if let Some(raw) = &device_usb_id {
            if parse_usb_id(raw).is_none() {
                return Err(TrackscrollError::InvalidSetting {
                    key: "device_usb_id",
                    message: format!("'{raw}' is not in vendor:product hex form"),
                });
            }
        }
        Ok(DeviceConfig { device_usb_id })
    }
}

/// Parse TOML text into an `AppConfig`.  `path` is only used in errors.
pub fn parse_config_str(content: &str, path: &Path) -> Result<AppConfig, TrackscrollError> {
    let raw: RawConfig =
        toml::from_str(content).map_err(|e| TrackscrollError::ConfigParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let config = AppConfig {
        log_level: raw.global.log_level.unwrap_or_else(|| "info".to_string()),
        log_file: raw.global.log_file,
        device: raw.device.into_validated()?,
        scroll: raw.scroll.into_validated()?,
    };
    debug!("Resolved configuration from {}: {config:?}", path.display());
    Ok(config)
}

/// Parse a TOML config file and return the fully resolved `AppConfig`.
pub fn parse_config_file(path: &Path) -> Result<AppConfig, TrackscrollError> {
    let content = fs::read_to_string(path).map_err(|e| TrackscrollError::ConfigReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_config_str(&content, path)
}
