#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc, time::Duration};

use minitel_sender::{
    config::{Config, TransmissionConfig},
    link::mock::MockConnector,
    signals::RunFlags,
    supervisor::{Outcome, Supervisor},
};
use tracing::info;

pub const PORT: &str = "/dev/ttyMock";

/// Bytes written when the screen is initialized: clear screen, 10 blank lines.
pub const INIT_LEN: usize = 11;

/// Bytes written after a complete pass: one carriage return, 70 line feeds.
pub const TRAILER_LEN: usize = 71;

/// Write a source file with the given contents, unique to this test process.
pub fn source(name: &str, contents: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "minitel-it-{}-{name}.txt",
        std::process::id()
    ));
    std::fs::write(&path, contents).expect("Temp dir should be writable");
    path
}

/// Lorem ipsum without line feeds, exactly `len` bytes long.
pub fn text(len: usize) -> Vec<u8> {
    let text: Vec<u8> = lipsum::lipsum_from_seed(len.max(1), 123)
        .bytes()
        .filter(|&b| b != b'\n')
        .take(len)
        .collect();
    assert_eq!(text.len(), len);
    text
}

pub fn one_shot(source: &PathBuf) -> TransmissionConfig {
    TransmissionConfig::new(source, PORT, Duration::from_micros(1_000), true)
}

pub fn looping(source: &PathBuf) -> TransmissionConfig {
    TransmissionConfig::new(source, PORT, Duration::from_micros(1_000), false)
}

pub async fn run(
    connector: MockConnector,
    transmission: TransmissionConfig,
    flags: Arc<RunFlags>,
) -> Outcome {
    run_with_config(connector, transmission, Config::default(), flags).await
}

pub async fn run_with_config(
    connector: MockConnector,
    transmission: TransmissionConfig,
    config: Config,
    flags: Arc<RunFlags>,
) -> Outcome {
    info!(?transmission, "Running supervisor");
    Supervisor::new(connector, transmission, config, flags)
        .run()
        .await
}

/// The characters forwarded from the file, leaving out screen init, wraps and trailers.
pub fn content(wire: &[u8]) -> Vec<u8> {
    wire.iter()
        .copied()
        .filter(|&b| b != 0x0C && b != b'\r' && b != b'\n')
        .collect()
}
