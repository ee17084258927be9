use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};

use crate::{
    config::{
        Config, TransmissionConfig, DEFAULT_DELAY_MICROS, DEFAULT_LOG_FILE, DEFAULT_PORT,
        DEFAULT_SOURCE, DOCUMENTED_DELAY_MICROS,
    },
    logging::LogSettings,
};

/// The command line interface for the Minitel sender.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Text file to send
    #[arg(short = 'f', long = "file", default_value = DEFAULT_SOURCE)]
    pub file: PathBuf,

    /// Delay between characters, in µs [default: 40000]
    #[arg(short = 'd', long = "delay")]
    pub delay: Option<u64>,

    /// Use the short 1000 µs delay when no delay is given
    #[arg(long, conflicts_with = "delay")]
    pub fast: bool,

    /// Serial device
    #[arg(short = 'p', long = "port", default_value = DEFAULT_PORT)]
    pub port: String,

    /// Send the file once, then exit
    #[arg(short = 'o', long = "one-shot")]
    pub one_shot: bool,

    /// Path to a configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Append logs to this file
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Only log to stdout
    #[arg(long)]
    pub no_log_file: bool,

    /// Start a new log file every day
    #[arg(long)]
    pub rotate_logs: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Show an example of a configuration file's contents.
    ConfigExample,
}

impl Cli {
    /// The pause after each character.
    pub fn delay(&self) -> Duration {
        let micros = match (self.delay, self.fast) {
            (Some(micros), _) => micros,
            (None, true) => DOCUMENTED_DELAY_MICROS,
            (None, false) => DEFAULT_DELAY_MICROS,
        };

        Duration::from_micros(micros)
    }

    /// Snapshot of what to send and where.
    pub fn transmission_config(&self) -> TransmissionConfig {
        TransmissionConfig::new(&self.file, &self.port, self.delay(), self.one_shot)
    }

    /// Where to log.
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            file: (!self.no_log_file).then(|| self.log_file.clone()),
            rotate_daily: self.rotate_logs,
        }
    }
}

/// Run a subcommand, printing its result.
pub fn handle_command(command: &Commands) -> Result<(), crate::error::Error> {
    match command {
        Commands::ConfigExample => {
            println!("{}", Config::example().serialize_pretty()?);
        }
    }

    Ok(())
}
