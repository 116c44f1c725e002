//! # Application Layer Network Protocols
//!
//! Protocol engines that run on top of a host-driven
//! [`Transport`](crate::network::Transport).
//!
//! ## Available Protocols
//!
//! - **[`mqtt`]**: MQTT 3.1.1 client engine with a bounded in-flight request pool
//!
//! ## Design Principles
//!
//! - **Event driven**: engines never block; the host feeds transport events and
//!   a periodic tick, and results come back as events
//! - **No-std Compatible**: no heap allocation, caller-supplied buffers
//! - **Bounded**: fixed-capacity tables, admission fails fast instead of queuing

/// MQTT client engine.
///
/// Provides an MQTT 3.1.1 client for lightweight publish-subscribe messaging,
/// commonly used in IoT applications.
pub mod mqtt;
