//! # libmqtt - event-driven MQTT client for embedded systems
//!
//! An MQTT 3.1.1 client engine for hosts whose network stack is callback
//! driven. The engine never blocks, never allocates and never owns a thread:
//! the host feeds it socket events and a periodic tick, and the application
//! gets connection changes, request completions and incoming messages through
//! one callback.
//!
//! ## Features
//!
//! - **Codec**: encoding and validating decoding of every MQTT 3.1.1 control
//!   packet a client sends or receives
//! - **Request pool**: bounded table of in-flight QoS 1/2 publishes,
//!   subscribes and unsubscribes with packet identifier allocation
//! - **QoS handshakes**: QoS 0, 1 and 2 in both directions
//! - **Keep-alive**: PINGREQ scheduling with a PINGRESP deadline
//! - **Timeouts**: per-request acknowledgment timeout and connect timeout
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libmqtt = "0.1.0"
//! ```
//!
//! ### Publishing
//!
//! ```rust
//! use libmqtt::network::application::mqtt::{Client, ClientInfo, ConnectStatus, Event, QoS};
//! use libmqtt::network::{Transport, TransportEvent};
//! # struct Socket;
//! # impl Transport for Socket {
//! #     type Error = ();
//! #     fn open(&mut self, _host: &str, _port: u16) -> Result<(), ()> { Ok(()) }
//! #     fn send(&mut self, _data: &[u8]) -> Result<(), ()> { Ok(()) }
//! #     fn close(&mut self) -> Result<(), ()> { Ok(()) }
//! # }
//!
//! fn on_event(client: &mut Client<'_, Socket>, event: &Event<'_, usize>) {
//!     match event {
//!         Event::Connect { status: ConnectStatus::Accepted } => {
//!             client
//!                 .publish("sensors/temperature", b"23.5", QoS::AtLeastOnce, false, 1)
//!                 .ok();
//!         }
//!         Event::Publish { arg, result } => {
//!             let _ = (arg, result);
//!         }
//!         _ => {}
//!     }
//! }
//!
//! let mut tx = [0u8; 512];
//! let mut rx = [0u8; 512];
//! let mut client = Client::new(Socket, &mut tx, &mut rx);
//! let info = ClientInfo::new("my_device").with_keep_alive(30);
//! client.connect("broker.local", 1883, on_event, &info).unwrap();
//!
//! // Driven from the host's network event loop:
//! client.process(0, TransportEvent::Connected);
//! client.tick(100);
//! ```
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ARM Cortex-M, RISC-V, etc.)
//! - Linux-based IoT devices (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` library
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Enable defmt logging support for embedded debugging

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

mod log;

/// Transport abstraction and the protocol engines built on it.
pub mod network;
