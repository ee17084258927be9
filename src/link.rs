use crate::error::Error;

/// An in-memory device, for testing without a Minitel.
pub mod mock;

/// The real serial device.
pub mod serial;

/// An open connection to the display.
///
/// A link is owned by exactly one party (the supervisor).
/// Others may borrow it for a while, but never close it.
#[allow(async_fn_in_trait)]
pub trait Link {
    /// Blocking write of all the given bytes.
    ///
    /// Fails with [`Error::NotConnected`] after [`Link::close`].
    async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Best effort check that the device is still there.
    ///
    /// Always false once closed.
    /// A device which was unplugged may still look alive; the next write will tell.
    fn is_alive(&self) -> bool;

    /// Whether [`Link::close`] has not been called yet.
    fn is_open(&self) -> bool;

    /// Release the device. Calling this more than once is fine.
    fn close(&mut self);
}

/// Something able to open [`Link`]s.
pub trait Connector {
    /// The kind of link opened.
    type Link: Link;

    /// Open and configure the device at `port`.
    ///
    /// Nothing is left open on failure.
    fn open(&mut self, port: &str) -> Result<Self::Link, Error>;
}
