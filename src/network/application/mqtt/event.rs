//! Events delivered to the application callback.

use super::error::Error;
use super::packet::QoS;

/// Outcome of a connection attempt.
///
/// Values 0 to 5 are the CONNACK return codes of MQTT 3.1.1. The remaining
/// values are produced locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ConnectStatus {
    /// Connection accepted.
    Accepted = 0,
    /// The server does not support protocol level 4.
    RefusedProtocolVersion = 1,
    /// The client identifier is not allowed.
    RefusedIdentifier = 2,
    /// The MQTT service is unavailable.
    RefusedServerUnavailable = 3,
    /// The user name or password is malformed.
    RefusedBadCredentials = 4,
    /// The client is not authorized.
    RefusedNotAuthorized = 5,
    /// The TCP connection could not be established.
    TcpFailed = 0x100,
    /// No CONNACK arrived within the connect timeout.
    Timeout = 0x101,
}

impl ConnectStatus {
    /// Map a CONNACK return code, `None` for reserved values.
    pub const fn from_return_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => ConnectStatus::Accepted,
            1 => ConnectStatus::RefusedProtocolVersion,
            2 => ConnectStatus::RefusedIdentifier,
            3 => ConnectStatus::RefusedServerUnavailable,
            4 => ConnectStatus::RefusedBadCredentials,
            5 => ConnectStatus::RefusedNotAuthorized,
            _ => return None,
        })
    }

    /// Whether the session was established.
    pub const fn is_accepted(self) -> bool {
        matches!(self, ConnectStatus::Accepted)
    }
}

/// An event reported by the [`Client`](super::Client).
///
/// Borrowed fields point into engine buffers and are only valid for the
/// duration of the callback. `A` is the per-request user argument handed back
/// with each completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event<'a, A> {
    /// A connection attempt finished.
    Connect {
        /// How it finished.
        status: ConnectStatus,
    },
    /// An established or establishing connection went away.
    Disconnect {
        /// Whether the session had been accepted by the server.
        is_accepted: bool,
    },
    /// A publish finished.
    Publish {
        /// Argument given to `publish`.
        arg: A,
        /// Outcome of the delivery.
        result: Result<(), Error>,
    },
    /// A subscribe finished.
    Subscribe {
        /// Argument given to `subscribe`.
        arg: A,
        /// Outcome of the request.
        result: Result<(), Error>,
    },
    /// An unsubscribe finished.
    Unsubscribe {
        /// Argument given to `unsubscribe`.
        arg: A,
        /// Outcome of the request.
        result: Result<(), Error>,
    },
    /// A message arrived from the server.
    PublishReceived {
        /// Topic name.
        topic: &'a str,
        /// Message payload.
        payload: &'a [u8],
        /// QoS the message was delivered with.
        qos: QoS,
        /// Redelivery flag.
        dup: bool,
        /// Retain flag.
        retain: bool,
    },
    /// A keep-alive round trip completed.
    KeepAlive,
}
