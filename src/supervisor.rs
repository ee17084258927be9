//! Keeps the display fed for as long as we are asked to run.
//!
//! ```text
//! Closed -> Opening -> Initializing -> Streaming -> Closed
//!              |            |
//!              |            +-> Closed (link closed, reconnect)
//!              +-> Opening (after a pause) | Terminated (budget spent)
//! Closed -> Reconnecting -> Opening
//! Closed -> Terminated
//! ```
//!
//! Opens which fail in a row are counted.
//! Before the first working session, running out of attempts is fatal.
//! After that the device may come and go at will (unplugged, power cycled)
//! and we keep trying forever.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    config::{Config, TransmissionConfig},
    error::Error,
    fatal,
    link::{Connector, Link},
    signals::RunFlags,
    transmitter::Transmitter,
};

/// Clears the Minitel screen.
pub const CLEAR_SCREEN: u8 = 0x0C;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// One-shot mode sent the file.
    Completed,

    /// A stop was requested.
    Stopped,

    /// No connection could be made in the allowed number of attempts.
    RetriesExhausted,
}

impl Outcome {
    /// Process exit status for this outcome.
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Completed | Outcome::Stopped => 0,
            Outcome::RetriesExhausted => 1,
        }
    }
}

/// Where the supervisor is in the lifecycle of a link.
#[derive(Debug)]
pub enum State<L> {
    /// No link is held.
    Closed,

    /// Waiting before opening again.
    Reconnecting,

    /// Trying to open the device.
    Opening,

    /// Device open, display not yet prepared.
    Initializing(L),

    /// Sending the file over and over.
    Streaming(L),

    /// Done.
    Terminated(Outcome),
}

impl<L> State<L> {
    /// Name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Reconnecting => "reconnecting",
            State::Opening => "opening",
            State::Initializing(_) => "initializing",
            State::Streaming(_) => "streaming",
            State::Terminated(_) => "terminated",
        }
    }
}

/// Logs a heartbeat on its own task while alive.
struct Watchdog(JoinHandle<()>);

impl Watchdog {
    fn spawn(period: Duration, flags: Arc<RunFlags>) -> Self {
        Self(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
            // The first tick is immediate
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => info!("Watchdog: system alive"),
                    _ = flags.stopped() => break,
                }
            }
        }))
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Drives a [`Connector`] and a [`Transmitter`] until told to stop.
#[derive(Debug)]
pub struct Supervisor<C> {
    connector: C,
    transmission: TransmissionConfig,
    config: Config,
    transmitter: Transmitter,
    flags: Arc<RunFlags>,
    retry_count: u32,
    had_session: bool,
    completed: bool,
}

impl<C: Connector> Supervisor<C> {
    /// A supervisor which has not started yet.
    pub fn new(
        connector: C,
        transmission: TransmissionConfig,
        config: Config,
        flags: Arc<RunFlags>,
    ) -> Self {
        Self {
            connector,
            transmitter: Transmitter::from(&config),
            transmission,
            config,
            flags,
            retry_count: 0,
            had_session: false,
            completed: false,
        }
    }

    /// Failed opens since the last successful one.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Run until one-shot completion, a stop request, or running out of attempts.
    pub async fn run(mut self) -> Outcome {
        info!("=== Starting Minitel sender ===");
        info!(
            "Port: {}, File: {}, Delay: {}µs",
            self.transmission.port(),
            self.transmission.source().display(),
            self.transmission.delay().as_micros()
        );

        let _watchdog = Watchdog::spawn(self.config.watchdog_interval(), self.flags.clone());

        let mut state = State::Closed;

        let outcome = loop {
            let next = self.step(state).await;
            debug!(to = next.name(), "Transition");

            if let State::Terminated(outcome) = next {
                break outcome;
            }
            state = next;
        };

        match outcome {
            Outcome::RetriesExhausted => {}
            _ => info!("=== Clean shutdown ==="),
        }

        outcome
    }

    /// Do the work of the current state, and say which state comes next.
    pub async fn step(&mut self, state: State<C::Link>) -> State<C::Link> {
        match state {
            State::Closed => self.closed(),
            State::Reconnecting => self.reconnecting().await,
            State::Opening => self.opening().await,
            State::Initializing(link) => self.initializing(link).await,
            State::Streaming(link) => self.streaming(link).await,
            State::Terminated(outcome) => State::Terminated(outcome),
        }
    }

    fn closed(&self) -> State<C::Link> {
        if !self.flags.keep_running() {
            State::Terminated(if self.completed {
                Outcome::Completed
            } else {
                Outcome::Stopped
            })
        } else if self.flags.reconnect_needed() {
            State::Reconnecting
        } else {
            State::Opening
        }
    }

    async fn reconnecting(&self) -> State<C::Link> {
        let delay = self.config.reconnect_delay();
        info!("Reconnecting in {}s...", delay.as_secs());

        if self.flags.sleep(delay).await {
            State::Opening
        } else {
            State::Closed
        }
    }

    async fn opening(&mut self) -> State<C::Link> {
        if !self.flags.keep_running() {
            return State::Closed;
        }

        match self.connector.open(self.transmission.port()) {
            Ok(link) => {
                self.retry_count = 0;
                State::Initializing(link)
            }
            Err(e) => {
                error!("{e}");
                self.retry_count += 1;

                let max = self.config.max_retries;
                let delay = self.config.retry_delay();

                if self.retry_count >= max {
                    if !self.had_session {
                        fatal!("Too many failed attempts ({max}), giving up");
                        return State::Terminated(Outcome::RetriesExhausted);
                    }

                    warn!(
                        "{max} failed attempts in a row, the device may be unplugged. Retrying every {}s...",
                        delay.as_secs()
                    );
                    self.retry_count = 0;
                } else {
                    warn!(
                        "Attempt {}/{max}, waiting {}s...",
                        self.retry_count,
                        delay.as_secs()
                    );
                }

                if self.flags.sleep(delay).await {
                    State::Opening
                } else {
                    State::Closed
                }
            }
        }
    }

    /// Clear the screen and move the cursor down.
    ///
    /// Returns false if a stop came in while the display was settling.
    /// Nothing more is written then.
    async fn initialize_screen(&self, link: &mut C::Link) -> Result<bool, Error> {
        if !link.is_alive() {
            return Err(Error::NotConnected);
        }

        link.write_raw(&[CLEAR_SCREEN]).await?;

        // The display needs a moment after clearing
        if !self.flags.sleep(self.config.settle_delay()).await {
            return Ok(false);
        }

        link.write_raw(&vec![b'\n'; self.config.blank_lines]).await?;

        Ok(true)
    }

    async fn initializing(&mut self, mut link: C::Link) -> State<C::Link> {
        match self.initialize_screen(&mut link).await {
            Ok(true) => {
                info!("Minitel screen initialized");
                self.flags.clear_reconnect();
                self.had_session = true;
                State::Streaming(link)
            }
            Ok(false) => {
                link.close();
                info!("Serial port closed");
                State::Closed
            }
            Err(e) => {
                error!("Could not initialize the screen: {e}");
                link.close();
                info!("Serial port closed");
                self.flags.request_reconnect();
                State::Closed
            }
        }
    }

    async fn streaming(&mut self, mut link: C::Link) -> State<C::Link> {
        while self.flags.keep_running() && !self.flags.reconnect_needed() {
            let sent = self
                .transmitter
                .send(
                    &mut link,
                    self.transmission.source(),
                    self.transmission.delay(),
                    &self.flags,
                )
                .await;

            match sent {
                Ok(_) if !self.flags.keep_running() => break,
                Ok(_) if self.transmission.one_shot() => {
                    info!("One-shot mode, stopping");
                    self.completed = true;
                    self.flags.request_stop();
                }
                Ok(_) => {
                    self.flags.sleep(self.config.pass_pause()).await;
                }
                Err(e) => {
                    error!("Send error ({e}), reconnecting...");
                    self.flags.request_reconnect();
                }
            }
        }

        link.close();
        info!("Serial port closed");

        State::Closed
    }
}
