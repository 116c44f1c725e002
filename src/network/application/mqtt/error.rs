//! Errors returned by the client engine and carried in completion events.

use super::packet;

/// Client engine errors.
///
/// Returned synchronously from the command API and reported asynchronously as
/// the `result` of completion events.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// Every slot of the request pool is in use.
    NoFreeRequest,
    /// The transmit buffer or the QoS 0 completion queue has no room.
    BufferFull,
    /// The operation is not allowed in the current connection state.
    InvalidState,
    /// The session is not established.
    NotConnected,
    /// A topic, client identifier or configuration value is not acceptable.
    InvalidArgument,
    /// The transport refused to open, send or close.
    Transport,
    /// No acknowledgment arrived within the request timeout.
    Timeout,
    /// The connection closed before the request completed.
    ConnectionLost,
    /// The server violated the protocol.
    Protocol,
    /// The server refused a subscription.
    Rejected,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Error::NoFreeRequest => "no free request slot",
            Error::BufferFull => "transmit buffer full",
            Error::InvalidState => "invalid state for operation",
            Error::NotConnected => "not connected",
            Error::InvalidArgument => "invalid argument",
            Error::Transport => "transport error",
            Error::Timeout => "request timed out",
            Error::ConnectionLost => "connection lost",
            Error::Protocol => "protocol violation",
            Error::Rejected => "rejected by server",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NoFreeRequest => defmt::write!(f, "NoFreeRequest"),
            Error::BufferFull => defmt::write!(f, "BufferFull"),
            Error::InvalidState => defmt::write!(f, "InvalidState"),
            Error::NotConnected => defmt::write!(f, "NotConnected"),
            Error::InvalidArgument => defmt::write!(f, "InvalidArgument"),
            Error::Transport => defmt::write!(f, "Transport"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionLost => defmt::write!(f, "ConnectionLost"),
            Error::Protocol => defmt::write!(f, "Protocol"),
            Error::Rejected => defmt::write!(f, "Rejected"),
        }
    }
}

impl From<packet::Error> for Error {
    fn from(err: packet::Error) -> Self {
        match err {
            packet::Error::BufferTooSmall => Error::BufferFull,
            packet::Error::StringTooLong | packet::Error::MissingPacketId => {
                Error::InvalidArgument
            }
            _ => Error::Protocol,
        }
    }
}
