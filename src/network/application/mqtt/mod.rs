//! MQTT 3.1.1 client engine for event-driven hosts.
//!
//! MQTT uses a publish-subscribe pattern where:
//! - **Publishers** send messages to topics
//! - **Subscribers** receive messages from topics they're interested in
//! - **Brokers** route messages between publishers and subscribers
//!
//! This module implements the client side on top of a host-driven
//! [`Transport`](crate::network::Transport). The engine owns no thread and
//! never blocks: the host feeds it transport events and a periodic tick, and
//! the application learns about connection changes, completed requests and
//! incoming messages through a single callback.
//!
//! # Layout
//!
//! - [`packet`]: control packet codec
//! - [`request`]: bounded table of requests awaiting acknowledgment
//! - [`keep_alive`]: PINGREQ scheduling
//! - [`client`]: connection state machine, QoS handshakes and event dispatch
//! - [`config`]: connect parameters and timing knobs, loadable from JSON
//!
//! # Key Features
//!
//! - Quality of Service (QoS) levels 0, 1, and 2 for outgoing and incoming
//!   messages
//! - At most [`MAX_REQUESTS`] acknowledged requests in flight by default;
//!   admission fails fast with [`Error::NoFreeRequest`]
//! - Caller-supplied transmit and receive buffers, no heap
//! - Request and connect timeouts, keep-alive with PINGRESP deadline

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod keep_alive;
pub mod packet;
pub mod request;

pub use client::{Client, EventFn, State};
pub use config::{ClientInfo, EngineConfig, Will};
pub use error::Error;
pub use event::{ConnectStatus, Event};
pub use packet::QoS;
pub use request::MAX_REQUESTS;
