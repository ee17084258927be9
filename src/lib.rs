#![deny(missing_docs)]

//! This crate streams a text file to a Minitel over a serial link.
//!
//! The file is sent one character at a time, at a pace the display can follow.
//! Line feeds in the file are dropped; lines are wrapped at the width of the screen.
//! After each pass the screen is scrolled clear, and the file is sent again
//! (unless running in one-shot mode).
//!
//! The serial link is expected to go away now and then.
//! A [`supervisor::Supervisor`] notices, closes the link, waits, and opens it again.
//! Signals are turned into flags the supervisor polls:
//! SIGINT and SIGTERM stop cleanly, SIGHUP reopens the link.

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// Possible errors in this library.
pub mod error;

/// Logging/tracing setup.
pub mod logging;

/// Connections to the display: the real serial port, and a mock.
pub mod link;

/// Signal handling and the run flags shared with the supervisor.
pub mod signals;

/// Sends one pass of the file.
pub mod transmitter;

/// The connection state machine.
pub mod supervisor;
