//! `log` backend: one line per record on stderr, mirrored to an optional
//! append-only file.
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;
use std::time::SystemTime;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

const TARGET_PREFIX: &str = "trackscroll";

/// Effective level: `--verbose` wins, then the configured name, then `info`.
pub fn resolve_level(verbose: bool, configured: &str) -> LevelFilter {
    if verbose {
        return LevelFilter::Debug;
    }
    configured.parse().unwrap_or(LevelFilter::Info)
}

/// Render a record as `[<secs> <LEVEL> <target>] <message>\n`.
pub fn format_line(record: &Record, secs: u64) -> String {
    format!(
        "[{secs} {:<5} {}] {}\n",
        record.level(),
        record.target(),
        record.args()
    )
}

pub struct TrackscrollLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl TrackscrollLogger {
    /// A log file that cannot be opened is reported on stderr and skipped.
    pub fn new(level: LevelFilter, log_file: Option<&str>) -> Self {
        let file = log_file.and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .inspect_err(|e| eprintln!("Warning: cannot open log file '{path}': {e}"))
                .ok()
                .map(Mutex::new)
        });
        Self { level, file }
    }

    /// Install as the global logger.
    pub fn install(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

impl Log for TrackscrollLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with(TARGET_PREFIX)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let line = format_line(record, secs);

        // stderr ends up in the journal under systemd.
        eprint!("{line}");
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.write_all(line.as_bytes());
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut f) = file.lock() {
                let _ = f.flush();
            }
        }
    }
}
