//! Process signals, turned into flags the supervisor polls.
//!
//! SIGINT and SIGTERM ask for a clean stop.
//! SIGHUP asks for the serial link to be reopened.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// The only state shared between the signal task and the supervisor.
#[derive(Debug, Default)]
pub struct RunFlags {
    stop: CancellationToken,
    reconnect: AtomicBool,
}

impl RunFlags {
    /// False once a stop has been requested. Never becomes true again.
    pub fn keep_running(&self) -> bool {
        !self.stop.is_cancelled()
    }

    /// Ask everything to wind down.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    /// Resolves once a stop has been requested.
    pub async fn stopped(&self) {
        self.stop.cancelled().await
    }

    /// Whether the link should be torn down and opened again.
    pub fn reconnect_needed(&self) -> bool {
        self.reconnect.load(Ordering::SeqCst)
    }

    /// Ask for the link to be reopened.
    pub fn request_reconnect(&self) {
        self.reconnect.store(true, Ordering::SeqCst);
    }

    /// Only done once a new link is open and initialized.
    pub(crate) fn clear_reconnect(&self) {
        self.reconnect.store(false, Ordering::SeqCst);
    }

    /// Sleep, but wake up early if a stop is requested.
    ///
    /// Returns whether we should keep running.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.stop.cancelled() => {
                debug!("Sleep cut short by stop request");
            }
        }

        self.keep_running()
    }
}

/// What a received signal asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Stop cleanly. Holds the signal's name.
    Stop(&'static str),

    /// Reopen the serial link.
    Reconnect,
}

impl Request {
    /// Log the request and raise the matching flag.
    pub fn apply(self, flags: &RunFlags) {
        match self {
            Request::Stop(name) => {
                info!("Signal {name} received, stopping cleanly...");
                flags.request_stop();
            }
            Request::Reconnect => {
                info!("SIGHUP received, reconnecting...");
                flags.request_reconnect();
            }
        }
    }
}

/// Translates process signals into [`RunFlags`].
#[derive(Debug)]
pub struct SignalBridge;

impl SignalBridge {
    /// Register the signal handlers and listen on a background task.
    ///
    /// The task ends once a stop has been requested.
    #[cfg(unix)]
    pub fn spawn(flags: Arc<RunFlags>) -> io::Result<JoinHandle<()>> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut hangup = signal(SignalKind::hangup())?;

        Ok(tokio::spawn(async move {
            loop {
                let request = tokio::select! {
                    _ = interrupt.recv() => Request::Stop("SIGINT"),
                    _ = terminate.recv() => Request::Stop("SIGTERM"),
                    _ = hangup.recv() => Request::Reconnect,
                    _ = flags.stopped() => break,
                };

                request.apply(&flags);
            }

            debug!("Signal bridge done");
        }))
    }

    /// Register the signal handlers and listen on a background task.
    ///
    /// Only Ctrl-C is available here.
    #[cfg(not(unix))]
    pub fn spawn(flags: Arc<RunFlags>) -> io::Result<JoinHandle<()>> {
        Ok(tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        Request::Stop("Ctrl-C").apply(&flags);
                    }
                }
                _ = flags.stopped() => {}
            }

            debug!("Signal bridge done");
        }))
    }
}
