//! Console logging for the calibration tools.
//!
//! Records go to stderr as `[elapsed LEVEL target] message`, so stdout stays
//! reserved for the calibration report. Install once at startup with
//! [`init_with_level`] or [`init_logger`].

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct ConsoleLogger {
    level: LevelFilter,
    with_target: bool,
    started: Instant,
}

impl ConsoleLogger {
    fn format(&self, record: &Record) -> String {
        let elapsed = self.started.elapsed().as_secs_f64();
        if self.with_target {
            format!(
                "[{:7.3}s {:>5} {}] {}",
                elapsed,
                record.level(),
                record.target(),
                record.args()
            )
        } else {
            format!("[{:7.3}s {:>5}] {}", elapsed, record.level(), record.args())
        }
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.format(record);
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<ConsoleLogger> = OnceLock::new();

/// Install the console logger, optionally prefixing each line with the
/// emitting module path.
///
/// Only the first call takes effect; later calls keep the original settings.
pub fn init_logger(level: LevelFilter, with_target: bool) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| ConsoleLogger {
        level,
        with_target,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install the console logger without module targets.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    init_logger(level, false)
}

/// Install a `tracing` subscriber (span timings on close) instead of the
/// console logger. Filter comes from `RUST_LOG`, defaulting to `info`.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}
