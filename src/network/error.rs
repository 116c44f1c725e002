//! Common error types for transport implementations

/// A ready-made error type for [`Transport`](super::Transport) implementations.
///
/// Engines never inspect transport errors beyond logging them, so hosts are
/// free to use their own type. This one is small, `Copy` and portable to
/// `no_std` targets.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// A send was attempted while the socket still holds unsent data.
    Busy,
    /// An error occurred while writing to the socket.
    WriteError,
    /// The remote host refused the connection.
    ConnectionRefused,
    /// The connection was closed.
    ConnectionClosed,
    /// The host name or port could not be used.
    InvalidAddress,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Error::NotOpen => "connection is not open",
            Error::Busy => "socket send buffer is busy",
            Error::WriteError => "write to socket failed",
            Error::ConnectionRefused => "connection refused",
            Error::ConnectionClosed => "connection closed",
            Error::InvalidAddress => "invalid address",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::Busy => defmt::write!(f, "Busy"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
        }
    }
}
