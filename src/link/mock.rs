//! A mock display.
//!
//! Everything written to it ends up on an in-memory "wire" which tests can inspect.
//! Failures can be scripted: opens which fail, a device unplugged after
//! some bytes, a liveness probe which stops answering.
//!
//! Useful for testing the supervisor and transmitter without a Minitel-
//! faster and more reliable.

use std::{
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::time::Instant;
use tracing::{debug, trace};

use super::{Connector, Link};
use crate::{error::Error, signals::RunFlags};

#[derive(Default)]
struct DeviceState {
    wire: Vec<u8>,

    open_attempts: usize,
    opens: Vec<Instant>,
    closes: usize,

    open_failures_left: usize,
    always_fail_opens: bool,
    unplugged: bool,

    /// Bytes accepted before the device is yanked out.
    unplug_after: Option<usize>,

    /// Wire length from which the liveness probe fails.
    probe_dead_at: Option<usize>,

    /// Wire length at which a stop is requested.
    stop_at: Option<(usize, Arc<RunFlags>)>,
}

/// Handle to the shared state of a mock display.
///
/// Cloning gives another handle to the same device.
#[derive(Clone)]
pub struct MockDevice {
    name: String,
    state: Arc<Mutex<DeviceState>>,
}

impl Display for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mock:{}", self.name)
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockDevice({})", self.name)
    }
}

impl MockDevice {
    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Everything written so far, across all links.
    pub fn wire(&self) -> Vec<u8> {
        self.state().wire.clone()
    }

    /// How many opens were attempted, failed or not.
    pub fn open_attempts(&self) -> usize {
        self.state().open_attempts
    }

    /// How many opens succeeded.
    pub fn opens(&self) -> usize {
        self.state().opens.len()
    }

    /// When each successful open happened.
    pub fn open_times(&self) -> Vec<Instant> {
        self.state().opens.clone()
    }

    /// How many links were actually closed.
    pub fn closes(&self) -> usize {
        self.state().closes
    }

    /// Pull the cable: writes fail, probes fail, opens fail.
    pub fn unplug(&self) {
        debug!(device = %self, "Unplugged");
        self.state().unplugged = true;
    }

    /// Put the cable back.
    pub fn replug(&self) {
        debug!(device = %self, "Replugged");
        self.state().unplugged = false;
    }

    /// Whether the cable is in.
    pub fn is_plugged(&self) -> bool {
        !self.state().unplugged
    }

    fn try_open(&self) -> Result<(), String> {
        let mut state = self.state();
        state.open_attempts += 1;

        if state.always_fail_opens {
            return Err("device refuses to open".into());
        }

        if state.open_failures_left > 0 {
            state.open_failures_left -= 1;
            return Err("device busy".into());
        }

        if state.unplugged {
            return Err("No such file or directory".into());
        }

        state.opens.push(Instant::now());

        Ok(())
    }

    fn alive(&self) -> bool {
        let state = self.state();

        match state.probe_dead_at {
            Some(at) if state.wire.len() >= at => false,
            _ => !state.unplugged,
        }
    }

    fn accept(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut state = self.state();

        for &byte in bytes {
            if state.unplugged {
                return Err(Error::WriteFailed("Input/output error".into()));
            }

            if let Some(left) = state.unplug_after.as_mut() {
                if *left == 0 {
                    state.unplug_after = None;
                    state.unplugged = true;
                    debug!(device = %self.name, "Unplugged while writing");
                    return Err(Error::WriteFailed("Input/output error".into()));
                }
                *left -= 1;
            }

            state.wire.push(byte);

            if let Some((at, flags)) = &state.stop_at {
                if state.wire.len() >= *at {
                    flags.request_stop();
                }
            }
        }

        trace!("Accepted {} byte(s)", bytes.len());

        Ok(())
    }

    fn record_close(&self) {
        self.state().closes += 1;
    }
}

/// Builder for a [`MockConnector`].
#[derive(Debug)]
pub struct MockBuilder {
    name: String,
    open_failures: usize,
    always_fail_opens: bool,
    unplug_after: Option<usize>,
    probe_dead_at: Option<usize>,
    stop_at: Option<(usize, Arc<RunFlags>)>,
}

impl MockBuilder {
    /// Start a new builder.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            open_failures: 0,
            always_fail_opens: false,
            unplug_after: None,
            probe_dead_at: None,
            stop_at: None,
        }
    }

    /// The first `count` opens fail.
    pub fn fail_opens(mut self, count: usize) -> Self {
        self.open_failures = count;
        self
    }

    /// No open ever succeeds.
    pub fn always_fail_opens(mut self) -> Self {
        self.always_fail_opens = true;
        self
    }

    /// Accept `bytes` bytes, then unplug on the next write.
    pub fn unplug_after(mut self, bytes: usize) -> Self {
        self.unplug_after = Some(bytes);
        self
    }

    /// Probes fail once the wire holds `bytes` bytes. Writes keep working.
    pub fn probe_dead_at(mut self, bytes: usize) -> Self {
        self.probe_dead_at = Some(bytes);
        self
    }

    /// Request a stop once the wire holds `bytes` bytes.
    pub fn request_stop_at(mut self, bytes: usize, flags: Arc<RunFlags>) -> Self {
        self.stop_at = Some((bytes, flags));
        self
    }

    /// Create the connector.
    #[must_use]
    pub fn build(self) -> MockConnector {
        debug!(name = %self.name, "Running mock");

        let state = DeviceState {
            open_failures_left: self.open_failures,
            always_fail_opens: self.always_fail_opens,
            unplug_after: self.unplug_after,
            probe_dead_at: self.probe_dead_at,
            stop_at: self.stop_at,
            ..Default::default()
        };

        MockConnector {
            device: MockDevice {
                name: self.name,
                state: Arc::new(Mutex::new(state)),
            },
        }
    }
}

/// Opens [`MockLink`]s to a single [`MockDevice`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    device: MockDevice,
}

impl MockConnector {
    /// Handle to the device behind this connector.
    pub fn device(&self) -> MockDevice {
        self.device.clone()
    }

    /// An already open link, bypassing [`Connector::open`].
    pub fn link(&self) -> MockLink {
        MockLink {
            device: self.device.clone(),
            open: true,
        }
    }
}

impl Connector for MockConnector {
    type Link = MockLink;

    fn open(&mut self, port: &str) -> Result<Self::Link, Error> {
        self.device
            .try_open()
            .map_err(|reason| Error::OpenFailed {
                port: port.into(),
                reason,
            })?;

        Ok(self.link())
    }
}

/// A link to a [`MockDevice`].
#[derive(Debug)]
pub struct MockLink {
    device: MockDevice,
    open: bool,
}

impl Link for MockLink {
    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if !self.open {
            return Err(Error::NotConnected);
        }

        self.device.accept(bytes)
    }

    fn is_alive(&self) -> bool {
        self.open && self.device.alive()
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.device.record_close();
        }
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.close();
    }
}
