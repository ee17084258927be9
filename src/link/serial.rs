use std::{fmt, time::Duration};

use tokio::io::AsyncWriteExt;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};

use super::{Connector, Link};
use crate::error::Error;

/// Line speed of the Minitel.
pub const BAUD_RATE: u32 = 4800;

/// How long a read may wait for data.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

fn try_create_serial_port(path: &str) -> Result<SerialStream, Error> {
    // The driver opens the device without blocking on carrier detect,
    // applies raw mode and the settings below, and takes exclusive use.
    // If the settings can't be applied the descriptor is closed before returning.
    tokio_serial::new(path, BAUD_RATE)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(READ_TIMEOUT)
        .open_native_async()
        .map_err(|e| Error::OpenFailed {
            port: path.to_string(),
            reason: e.to_string(),
        })
}

/// A serial port connected to the display.
///
/// The device is released when closed or dropped, whichever comes first.
pub struct SerialLink {
    port: String,
    stream: Option<SerialStream>,
}

impl fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialLink")
            .field("port", &self.port)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl SerialLink {
    /// Open the device at `port`.
    pub fn open(port: &str) -> Result<Self, Error> {
        debug!(%port, baud = BAUD_RATE, "Opening port");

        let stream = try_create_serial_port(port)?;

        info!("Serial port {port} opened");

        Ok(Self {
            port: port.to_string(),
            stream: Some(stream),
        })
    }

    /// A link which was never opened.
    pub fn disconnected(port: &str) -> Self {
        Self {
            port: port.to_string(),
            stream: None,
        }
    }

    /// The device path.
    pub fn port(&self) -> &str {
        &self.port
    }
}

impl Link for SerialLink {
    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        stream
            .write_all(bytes)
            .await
            .map_err(|e| Error::WriteFailed(e.to_string()))
    }

    fn is_alive(&self) -> bool {
        self.stream.as_ref().map(probe).unwrap_or(false)
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            debug!(port = %self.port, "Released serial port");
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Zero length write: nothing reaches the wire,
/// but a descriptor which is no longer valid is reported.
#[cfg(unix)]
fn probe(stream: &SerialStream) -> bool {
    use std::os::unix::io::AsRawFd;

    !matches!(
        nix::unistd::write(stream.as_raw_fd(), &[]),
        Err(nix::errno::Errno::EBADF)
    )
}

#[cfg(not(unix))]
fn probe(_stream: &SerialStream) -> bool {
    true
}

/// Opens [`SerialLink`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialConnector;

impl Connector for SerialConnector {
    type Link = SerialLink;

    fn open(&mut self, port: &str) -> Result<Self::Link, Error> {
        SerialLink::open(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_opened_is_not_alive() {
        let link = SerialLink::disconnected("/dev/ttyUSB0");

        assert!(!link.is_open());
        assert!(!link.is_alive());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut link = SerialLink::disconnected("/dev/ttyUSB0");

        link.close();
        link.close();

        assert!(!link.is_alive());
    }

    #[tokio::test]
    async fn write_on_closed_link_is_not_connected() {
        let mut link = SerialLink::disconnected("/dev/ttyUSB0");

        assert_eq!(link.write_raw(b"x").await, Err(Error::NotConnected));
    }

    #[tokio::test]
    async fn missing_device_fails_to_open() {
        let err = SerialConnector
            .open("/dev/this-minitel-does-not-exist")
            .unwrap_err();

        match err {
            Error::OpenFailed { port, .. } => {
                assert_eq!(port, "/dev/this-minitel-does-not-exist")
            }
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn non_tty_fails_to_configure() {
        // Opens fine, but is not a terminal.
        let err = SerialLink::open("/dev/null").unwrap_err();

        assert!(matches!(err, Error::OpenFailed { .. }));
    }
}
