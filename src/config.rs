use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The text sent when no file is given.
pub const DEFAULT_SOURCE: &str = "text.txt";

/// The serial device used when no port is given.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Delay between characters (µs) when none is given.
///
/// Slow enough for the display to keep up at 4800 baud.
pub const DEFAULT_DELAY_MICROS: u64 = 40_000;

/// Delay between characters (µs) advertised by the usage text of earlier versions.
///
/// Not the same as [`DEFAULT_DELAY_MICROS`]; chosen explicitly with `--fast`.
pub const DOCUMENTED_DELAY_MICROS: u64 = 1_000;

/// Where logs are appended when no log file is given.
pub const DEFAULT_LOG_FILE: &str = "/tmp/minitel.log";

/// What to send, where, and how fast.
///
/// Created once at startup, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionConfig {
    source: PathBuf,
    port: String,
    delay: Duration,
    one_shot: bool,
}

impl TransmissionConfig {
    /// A new snapshot.
    pub fn new<P: Into<PathBuf>, S: Into<String>>(
        source: P,
        port: S,
        delay: Duration,
        one_shot: bool,
    ) -> Self {
        Self {
            source: source.into(),
            port: port.into(),
            delay,
            one_shot,
        }
    }

    /// The text file to send.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The serial device path.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Pause after every forwarded character.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Send the file once, then exit.
    pub fn one_shot(&self) -> bool {
        self.one_shot
    }
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_SOURCE,
            DEFAULT_PORT,
            Duration::from_micros(DEFAULT_DELAY_MICROS),
            false,
        )
    }
}

/// Tuning of the supervisor and transmitter.
///
/// May be given as a .ron file, where any field left out keeps its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Failed opens in a row before giving up on the initial connection.
    pub max_retries: u32,

    /// Wait between failed opens.
    pub retry_delay_ms: u64,

    /// Wait before reopening a link which was lost or asked to reconnect.
    pub reconnect_delay_ms: u64,

    /// Time the display needs after being cleared.
    pub settle_delay_ms: u64,

    /// Pause between two passes over the file.
    pub pass_pause_ms: u64,

    /// Period of the watchdog heartbeat.
    pub watchdog_interval_secs: u64,

    /// Characters per display line.
    pub chars_per_line: usize,

    /// Line feeds sent after each pass to scroll the text away.
    pub lines_skip: usize,

    /// Line feeds sent after clearing the screen.
    pub blank_lines: usize,

    /// Forwarded characters between two liveness probes.
    pub probe_every: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay_ms: 5_000,
            reconnect_delay_ms: 5_000,
            settle_delay_ms: 300,
            pass_pause_ms: 1_000,
            watchdog_interval_secs: 60,
            chars_per_line: 80,
            lines_skip: 70,
            blank_lines: 10,
            probe_every: 100,
        }
    }
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        Self::ron()
            .from_str::<Config>(input)
            .map_err(|e| Error::BadConfig(format!("Could not parse configuration: {e}")))
    }

    /// An example configuration, with the slowest display in mind.
    pub fn example() -> Self {
        Self {
            settle_delay_ms: 500,
            watchdog_interval_secs: 300,
            ..Default::default()
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> Result<String, Error> {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::BadConfig(e.to_string()))
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let path = p.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| Error::BadConfig(format!("Could not read {path:?}: {e}")))?;

        Self::deserialize(&s)
    }

    /// Check the values can drive a transmission.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_retries == 0 {
            return Err(Error::BadConfig(
                "max_retries must be at least 1, or no connection would ever be attempted".into(),
            ));
        }

        if self.chars_per_line == 0 {
            return Err(Error::BadConfig(
                "chars_per_line must be at least 1".into(),
            ));
        }

        if self.probe_every == 0 {
            return Err(Error::BadConfig("probe_every must be at least 1".into()));
        }

        if self.watchdog_interval_secs == 0 {
            return Err(Error::BadConfig(
                "watchdog_interval_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// See [`Config::retry_delay_ms`].
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// See [`Config::reconnect_delay_ms`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// See [`Config::settle_delay_ms`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// See [`Config::pass_pause_ms`].
    pub fn pass_pause(&self) -> Duration {
        Duration::from_millis(self.pass_pause_ms)
    }

    /// See [`Config::watchdog_interval_secs`].
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }
}
