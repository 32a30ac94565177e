//! Device discovery, grab and the blocking event loop (I/O layer).
//!
//! Pure event-processing logic lives in [`crate::event`] and
//! [`crate::classifier`].
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, Device, InputEvent, Key, RelativeAxisType};
use log::{debug, error, info, trace, warn};

use crate::classifier::{GestureClassifier, SyntheticEvent, SyntheticInputSink};
use crate::config::{AppConfig, DeviceConfig, TrackscrollError, TriggerButton, parse_config_file};
use crate::event::{EventRouter, parse_usb_id, to_evdev_events};

/// Name of the uinput device we create; never picked as a source.
pub const VIRTUAL_DEVICE_NAME: &str = "trackscroll virtual pointer";

// -- ScrollManager (top-level orchestrator) -------------------

/// Grabs one trackball and turns its trigger-button gestures into scrolling.
pub struct ScrollManager {
    config: AppConfig,
    running: Arc<AtomicBool>,
}

impl ScrollManager {
    /// Load configuration from `config_path`, or use defaults when no path
    /// is given.
    pub fn new(config_path: Option<&Path>) -> Result<Self, TrackscrollError> {
        let config = match config_path {
            Some(path) => parse_config_file(path)?,
            None => AppConfig::default(),
        };
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Grab the device and process events until stopped.
    ///
    /// Setup failures are returned; a disconnect that cannot be recovered
    /// from is logged and ends the loop normally.
    pub fn start(&mut self) -> Result<(), TrackscrollError> {
        let settings = self.config.scroll.clone();
        let triggers = settings.trigger_buttons.clone();

        let (mut path, mut device) = find_device(&self.config.device, &triggers)?;
        grab(&path, &mut device)?;
        let mut sink = UinputSink::new(&device)?;

        self.running.store(true, Ordering::Relaxed);
        info!(
            "Scrolling with {} on {} ({}), threshold {}, wheel factor {}",
            button_names(&triggers),
            device.name().unwrap_or("unknown"),
            path.display(),
            settings.threshold,
            settings.wheel_factor
        );

        let trigger_keys = settings.trigger_keys();
        let mut classifier = GestureClassifier::new(settings);
        let mut router = EventRouter::new(&trigger_keys);

        while let Err(e) = event_loop(&mut device, &mut router, &mut classifier, &mut sink, &self.running) {
            if !self.running.load(Ordering::Relaxed) {
                break;
            }
            warn!("Device {} disconnected: {e}", path.display());
            let Some((new_path, new_device)) =
                attempt_reconnect(&self.config.device, &triggers, &self.running)
            else {
                return Ok(());
            };
            path = new_path;
            device = new_device;
            classifier.reset();
            router.reset();
        }

        if let Err(e) = device.ungrab() {
            debug!("Ungrab of {} failed: {e}", path.display());
        }
        info!("Scroll manager stopped");
        Ok(())
    }

    /// Stop processing after the current batch of events.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        info!("Scroll manager stopping");
    }

    /// Get a reference to the running flag for signal handling.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Get the log level from the parsed configuration.
    pub fn config_log_level(&self) -> &str {
        &self.config.log_level
    }

    /// Get the optional log file path from the parsed configuration.
    pub fn config_log_file(&self) -> Option<&str> {
        self.config.log_file.as_deref()
    }
}

// -- UinputSink -----------------------------------------------

/// Injects synthetic and forwarded events through a uinput virtual pointer.
struct UinputSink {
    device: VirtualDevice,
}

impl UinputSink {
    /// Mirror the source's capabilities and add the middle button and both
    /// wheels.
    fn new(source: &Device) -> Result<Self, TrackscrollError> {
        let mut keys: AttributeSet<Key> = AttributeSet::new();
        if let Some(src) = source.supported_keys() {
            for key in src.iter() {
                keys.insert(key);
            }
        }
        keys.insert(Key::BTN_MIDDLE);

        let mut axes: AttributeSet<RelativeAxisType> = AttributeSet::new();
        if let Some(src) = source.supported_relative_axes() {
            for axis in src.iter() {
                axes.insert(axis);
            }
        }
        for axis in [
            RelativeAxisType::REL_X,
            RelativeAxisType::REL_Y,
            RelativeAxisType::REL_WHEEL,
            RelativeAxisType::REL_HWHEEL,
        ] {
            axes.insert(axis);
        }

        let device = VirtualDeviceBuilder::new()
            .and_then(|b| b.name(VIRTUAL_DEVICE_NAME).with_keys(&keys))
            .and_then(|b| b.with_relative_axes(&axes))
            .and_then(|b| b.build())
            .map_err(TrackscrollError::VirtualDevice)?;

        info!("Created virtual pointer '{VIRTUAL_DEVICE_NAME}'");
        Ok(Self { device })
    }

    /// Re-emit events that were not suppressed.
    fn forward(&mut self, frame: &[InputEvent]) {
        if let Err(e) = self.device.emit(frame) {
            warn!("Failed to forward {} event(s): {e}", frame.len());
        }
    }
}

impl SyntheticInputSink for UinputSink {
    fn inject(&mut self, events: &[SyntheticEvent]) {
        trace!("Injecting {events:?}");
        if let Err(e) = self.device.emit(&to_evdev_events(events)) {
            warn!("Failed to inject {} synthetic event(s): {e}", events.len());
        }
    }
}

// -- Device I/O -----------------------------------------------

/// Check if a device is a relative pointer with any of the given buttons.
fn is_pointer_device(device: &Device, buttons: &[Key]) -> bool {
    if device.name() == Some(VIRTUAL_DEVICE_NAME) {
        return false;
    }
    let has_motion = device.supported_relative_axes().is_some_and(|axes| {
        axes.contains(RelativeAxisType::REL_X) && axes.contains(RelativeAxisType::REL_Y)
    });
    has_motion
        && device
            .supported_keys()
            .is_some_and(|keys| buttons.iter().any(|b| keys.contains(*b)))
}

fn button_names(buttons: &[TriggerButton]) -> String {
    buttons
        .iter()
        .map(|b| -> &'static str { b.into() })
        .collect::<Vec<_>>()
        .join("/")
}

/// Find the source device: by USB ID when configured, else the first pointer
/// that has one of the trigger buttons.
fn find_device(
    config: &DeviceConfig,
    triggers: &[TriggerButton],
) -> Result<(PathBuf, Device), TrackscrollError> {
    let keys: Vec<Key> = triggers.iter().map(|b| b.key()).collect();
    let wanted = match config.device_usb_id.as_deref() {
        Some(raw) => Some(parse_usb_id(raw).ok_or_else(|| TrackscrollError::InvalidSetting {
            key: "device_usb_id",
            message: format!("'{raw}' is not in vendor:product hex form"),
        })?),
        None => None,
    };

    for (path, device) in evdev::enumerate() {
        if !is_pointer_device(&device, &keys) {
            continue;
        }
        let id = device.input_id();
        if wanted.is_some_and(|(vendor, product)| id.vendor() != vendor || id.product() != product) {
            continue;
        }
        info!(
            "Found pointer {:04x}:{:04x}: {} ({})",
            id.vendor(),
            id.product(),
            device.name().unwrap_or("unknown"),
            path.display()
        );
        return Ok((path, device));
    }

    let names = button_names(triggers);
    Err(TrackscrollError::DeviceNotFound(match &config.device_usb_id {
        Some(usb_id) => format!("no pointer with USB ID {usb_id} and button {names}"),
        None => format!("no pointer with button {names}"),
    }))
}

/// Take exclusive ownership of the device's events.
fn grab(path: &Path, device: &mut Device) -> Result<(), TrackscrollError> {
    device.grab().map_err(|e| TrackscrollError::Grab {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!("Grabbed {}", path.display());
    Ok(())
}

/// Blocking event loop - reads from the device, classifies, injects and
/// forwards.  Returns the read error if the device goes away.
fn event_loop(
    device: &mut Device,
    router: &mut EventRouter,
    classifier: &mut GestureClassifier,
    sink: &mut UinputSink,
    running: &AtomicBool,
) -> Result<(), io::Error> {
    while running.load(Ordering::Relaxed) {
        let events: Vec<InputEvent> = device.fetch_events()?.collect();
        for event in &events {
            if let Some(frame) = router.feed(event, classifier, sink) {
                sink.forward(&frame);
            }
        }
    }
    Ok(())
}

/// Attempt to find and grab the device again after it disconnects.
fn attempt_reconnect(
    config: &DeviceConfig,
    triggers: &[TriggerButton],
    running: &AtomicBool,
) -> Option<(PathBuf, Device)> {
    const MAX_RETRIES: usize = 10;
    const RETRY_INTERVAL: Duration = Duration::from_secs(5);

    for attempt in 1..=MAX_RETRIES {
        if !running.load(Ordering::Relaxed) {
            return None;
        }
        info!("Reconnect attempt {attempt}/{MAX_RETRIES}...");
        thread::sleep(RETRY_INTERVAL);

        let Ok((path, mut device)) = find_device(config, triggers) else {
            continue;
        };
        match grab(&path, &mut device) {
            Ok(()) => {
                info!("Reconnected to {}", path.display());
                return Some((path, device));
            }
            Err(e) => warn!("{e}"),
        }
    }
    error!("Failed to reconnect after {MAX_RETRIES} attempts");
    None
}

/// List all relative pointers and the auxiliary buttons they offer.
pub fn list_pointer_devices() -> ExitCode {
    const BUTTONS: [TriggerButton; 5] = [
        TriggerButton::Side,
        TriggerButton::Extra,
        TriggerButton::Forward,
        TriggerButton::Back,
        TriggerButton::Task,
    ];

    println!("\n=== trackscroll: Available Pointer Devices ===\n");
    let mut count = 0;

    for (path, device) in evdev::enumerate() {
        let buttons: Vec<&str> = BUTTONS
            .iter()
            .filter(|b| is_pointer_device(&device, &[b.key()]))
            .map(|b| b.into())
            .collect();
        if buttons.is_empty() {
            continue;
        }

        count += 1;
        println!(
            "Device {count}:\n\
             \x20 Path:      {}\n\
             \x20 Name:      {}\n\
             \x20 USB ID:    {:04x}:{:04x}\n\
             \x20 Buttons:   {}\n",
            path.display(),
            device.name().unwrap_or("unknown"),
            device.input_id().vendor(),
            device.input_id().product(),
            buttons.join(", "),
        );
    }

    if count == 0 {
        println!(
            "No pointer with an auxiliary button found.\n\n\
             Troubleshooting:\n\
             \x20 - Check if the trackball is connected\n\
             \x20 - Run 'libinput list-devices' to see all devices\n\
             \x20 - Run as root or join the 'input' group"
        );
        return ExitCode::FAILURE;
    }

    println!(
        "Found {count} pointer device(s).\n\n\
         Pin one in your trackscroll.toml:\n\
         \x20 [device]\n\
         \x20 device_usb_id = \"<USB ID>\"\n\n\
         \x20 [scroll]\n\
         \x20 trigger_button = \"<button>\""
    );
    ExitCode::SUCCESS
}
