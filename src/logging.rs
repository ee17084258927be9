use std::{fmt, path::PathBuf};

use chrono::Local;
use tokio::sync::RwLock;
use tracing::{debug, info, metadata::LevelFilter, Event, Level, Subscriber};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    EnvFilter,
};

use crate::error::Error;

/// Target of events which end the process.
/// These are rendered with the `FATAL` level.
pub const FATAL_TARGET: &str = "fatal";

/// Layout of the timestamp starting each line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Log a fatal condition.
///
/// This is an `ERROR` event which the log line format renders as `FATAL`.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {
        ::tracing::error!(target: $crate::logging::FATAL_TARGET, $($arg)+)
    };
}

/// Where log lines go besides stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Append-only log file, if any.
    pub file: Option<PathBuf>,

    /// Start a new file each day instead of growing a single one.
    pub rotate_daily: bool,
}

/// Renders events as `[YYYY-MM-DD HH:MM:SS] LEVEL: message`.
///
/// Existing log consumers parse this, so it must not change.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineFormat;

/// The level name written for an event.
pub fn level_label(level: &Level, target: &str) -> &'static str {
    match *level {
        Level::ERROR if target == FATAL_TARGET => "FATAL",
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        write!(
            writer,
            "[{}] {}: ",
            Local::now().format(TIMESTAMP_FORMAT),
            level_label(metadata.level(), metadata.target())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

fn file_appender(path: &PathBuf, rotate_daily: bool) -> Result<RollingFileAppender, Error> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::LogSetup(format!("{path:?} does not name a file")))?
        .to_string_lossy()
        .to_string();

    let rotation = if rotate_daily {
        Rotation::DAILY
    } else {
        Rotation::NEVER
    };

    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(file_name)
        .build(directory)
        .map_err(|e| Error::LogSetup(format!("log file {path:?}: {e}")))
}

/// Filter for stdout, from `RUST_LOG`-style directives.
///
/// Fatal events always get through, whatever the directives say.
pub fn stdout_filter(directives: &str) -> Result<EnvFilter, Error> {
    let fatal = format!("{FATAL_TARGET}=error")
        .parse::<tracing_subscriber::filter::Directive>()
        .map_err(|e| Error::LogSetup(e.to_string()))?;

    Ok(EnvFilter::new(directives).add_directive(fatal))
}

fn do_init(settings: &LogSettings) -> Result<(), Error> {
    let mut message = String::from("Logging with:");

    // stdout
    message += " stdout";

    let stdout_layer = tracing_subscriber::fmt::layer()
        .event_format(LineFormat)
        .with_filter(stdout_filter(
            &std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        )?);

    let registry = tracing_subscriber::registry().with(stdout_layer);

    let maybe_file_layer = if let Some(path) = &settings.file {
        message += &format!(", file ({path:?})");

        let file_layer = tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_writer(file_appender(path, settings.rotate_daily)?)
            .with_ansi(false)
            .with_filter(LevelFilter::INFO);
        Some(file_layer)
    } else {
        None
    };

    registry
        .with(maybe_file_layer)
        .try_init()
        .map_err(|e| Error::LogSetup(e.to_string()))?;

    debug!(message);

    Ok(())
}

/// Initialize tracing.
///
/// Will only initialize once, so tests may call this.
pub async fn init(settings: LogSettings) -> Result<(), Error> {
    static TRACING_IS_INITIALIZED: RwLock<bool> = RwLock::const_new(false);

    let initialized = { *TRACING_IS_INITIALIZED.read().await };

    if !initialized {
        let mut initialized = TRACING_IS_INITIALIZED.write().await;

        // To avoid race condition between the `.read()` and the
        // `.write()`.
        if *initialized {
            return Ok(());
        }

        do_init(&settings)?;

        *initialized = true;
    }

    info!("Logging initialized");

    Ok(())
}
