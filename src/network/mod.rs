//! Transport abstraction consumed by the protocol engines.
//!
//! The host network stack owns the socket. The engine only asks it to open,
//! send and close; everything the socket reports back (connection outcome,
//! bytes that actually left the send buffer, received data, remote close) is
//! fed into the engine as a [`TransportEvent`] from the host's processing loop.
//!
//! ```text
//!  ┌──────────────┐  open / send / close   ┌──────────────────┐
//!  │    Engine    │ ─────────────────────▶ │  Host transport  │
//!  │  (Client)    │ ◀───────────────────── │  (TCP socket)    │
//!  └──────────────┘     TransportEvent     └──────────────────┘
//! ```

#![deny(unsafe_code)]

/// Common error type for transport implementations
pub mod error;

/// Application layer protocols built on top of [`Transport`]
pub mod application;

/// Re-exports of the transport seam
pub mod prelude {
    pub use super::{Transport, TransportEvent};
}

/// A non-blocking, stream-oriented transport driven by the host.
///
/// Every method only *starts* an operation. Completion is reported later by
/// the host through [`TransportEvent`]s, never by blocking the caller.
///
/// # Examples
///
/// ```rust
/// use libmqtt::network::Transport;
/// use libmqtt::network::error::Error;
///
/// struct Loopback {
///     open: bool,
/// }
///
/// impl Transport for Loopback {
///     type Error = Error;
///
///     fn open(&mut self, _host: &str, _port: u16) -> Result<(), Self::Error> {
///         self.open = true;
///         Ok(())
///     }
///
///     fn send(&mut self, _data: &[u8]) -> Result<(), Self::Error> {
///         if self.open { Ok(()) } else { Err(Error::NotOpen) }
///     }
///
///     fn close(&mut self) -> Result<(), Self::Error> {
///         self.open = false;
///         Ok(())
///     }
/// }
/// ```
pub trait Transport {
    /// Associated error type
    type Error: core::fmt::Debug;

    /// Start opening a connection to `host:port`.
    ///
    /// Returning `Ok` means the attempt is underway; its outcome arrives as
    /// [`TransportEvent::Connected`] or [`TransportEvent::ConnectFailed`].
    fn open(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// Hand `data` to the socket.
    ///
    /// The transport copies the bytes before returning. Each byte that leaves
    /// the socket is later confirmed with [`TransportEvent::Sent`].
    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Start closing the connection. When this returns `Ok`, exactly one
    /// [`TransportEvent::Closed`] must follow, even if the engine already
    /// reported the link as down.
    fn close(&mut self) -> Result<(), Self::Error>;
}

/// Something the host transport observed, fed back into an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportEvent<'a> {
    /// The connection requested with [`Transport::open`] is established.
    Connected,
    /// The connection requested with [`Transport::open`] could not be established.
    ConnectFailed,
    /// `n` bytes previously handed to [`Transport::send`] left the socket.
    Sent(usize),
    /// Bytes arrived from the remote peer.
    Received(&'a [u8]),
    /// The connection is closed, locally or by the peer.
    Closed,
}
