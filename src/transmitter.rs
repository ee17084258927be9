use std::{io, path::Path, time::Duration};

use tokio::{
    fs::File,
    io::{AsyncReadExt, BufReader},
};
use tracing::{debug, error, info};

use crate::{config::Config, error::Error, link::Link, signals::RunFlags};

/// Characters per display line.
pub const CHARS_PER_LINE: usize = 80;

/// Line feeds sent after a complete pass, scrolling the text off screen.
pub const LINES_SKIP: usize = 70;

/// Forwarded characters between liveness probes.
pub const PROBE_EVERY: usize = 100;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Counts characters written on the current display line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCursor {
    column: usize,
    width: usize,
}

impl LineCursor {
    /// A cursor at the start of a line `width` characters wide.
    pub fn new(width: usize) -> Self {
        Self { column: 0, width }
    }

    /// Account for one more character.
    ///
    /// Returns true when the line is full; the cursor is then back at the start.
    pub fn advance(&mut self) -> bool {
        self.column += 1;

        if self.column >= self.width {
            self.column = 0;
            true
        } else {
            false
        }
    }

    /// Characters since the last wrap.
    pub fn column(&self) -> usize {
        self.column
    }
}

/// Sends a text file over a [`Link`].
///
/// Never retries: any failure is reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmitter {
    chars_per_line: usize,
    lines_skip: usize,
    probe_every: usize,
}

impl Default for Transmitter {
    fn default() -> Self {
        Self {
            chars_per_line: CHARS_PER_LINE,
            lines_skip: LINES_SKIP,
            probe_every: PROBE_EVERY,
        }
    }
}

impl From<&Config> for Transmitter {
    fn from(config: &Config) -> Self {
        Self {
            chars_per_line: config.chars_per_line.max(1),
            lines_skip: config.lines_skip,
            probe_every: config.probe_every.max(1),
        }
    }
}

fn unreadable(path: &Path, e: io::Error) -> Error {
    let err = Error::SourceUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    error!("{err}");
    err
}

async fn write<L: Link>(link: &mut L, bytes: &[u8], what: &str) -> Result<(), Error> {
    link.write_raw(bytes).await.map_err(|e| {
        error!("Error writing {what}: {e}");
        e
    })
}

impl Transmitter {
    /// Send the file at `source`, one character at a time.
    ///
    /// Line feeds in the file are dropped, lines are wrapped at the display width instead.
    /// After each character we pause for `delay`.
    /// A stop request ends the transmission early, without error and without the trailing scroll.
    ///
    /// Returns how many characters of the file were forwarded.
    pub async fn send<L: Link>(
        &self,
        link: &mut L,
        source: &Path,
        delay: Duration,
        flags: &RunFlags,
    ) -> Result<usize, Error> {
        if !link.is_alive() {
            error!("Serial port not connected");
            return Err(Error::NotConnected);
        }

        let file = File::open(source)
            .await
            .map_err(|e| unreadable(source, e))?;
        let mut reader = BufReader::new(file);

        let mut cursor = LineCursor::new(self.chars_per_line);
        let mut sent = 0;
        let mut probed_at = 0;
        let mut byte = [0u8; 1];

        loop {
            if !flags.keep_running() {
                info!(sent, "Transmission interrupted by stop request");
                return Ok(sent);
            }

            let read = reader
                .read(&mut byte)
                .await
                .map_err(|e| unreadable(source, e))?;
            if read == 0 {
                break;
            }

            if byte[0] == LF {
                continue;
            }

            if sent > 0 && sent % self.probe_every == 0 && probed_at != sent {
                probed_at = sent;

                if !link.is_alive() {
                    error!("Connection lost during transmission");
                    return Err(Error::ConnectionLost);
                }
            }

            write(link, &byte, "character").await?;
            sent += 1;

            if cursor.advance() {
                write(link, &[CR, LF], "line break").await?;
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        debug!(sent, column = cursor.column(), "End of file");

        write(link, &[CR], "carriage return").await?;

        for _ in 0..self.lines_skip {
            if !flags.keep_running() {
                break;
            }
            write(link, &[LF], "line skip").await?;
        }

        info!("File sent: {sent} bytes");

        Ok(sent)
    }
}
