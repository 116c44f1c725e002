//! Connection parameters and engine tuning.
//!
//! Both types can be built in code or loaded from a JSON document with
//! `serde-json-core`, which keeps them usable on `no_std` targets. Strings in a
//! [`ClientInfo`] borrow from the JSON text instead of being copied.

use serde::Deserialize;

use super::error::Error;
use super::packet::QoS;

/// Keep-alive interval used when none is given, in seconds.
pub const DEFAULT_KEEP_ALIVE: u16 = 60;

/// Last will and testament published by the server when the client vanishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Will<'a> {
    /// Topic the will is published to.
    pub topic: &'a str,
    /// Will message body.
    pub message: &'a str,
    /// Delivery guarantee of the will.
    #[serde(default)]
    pub qos: QoS,
    /// Whether the server retains the will.
    #[serde(default)]
    pub retain: bool,
}

/// Everything the CONNECT packet is built from.
///
/// # Examples
///
/// ```rust
/// use libmqtt::network::application::mqtt::ClientInfo;
///
/// let info = ClientInfo::from_json(r#"{"id":"sensor-7","user":"alice","pass":"s3cret","keep_alive":30}"#).unwrap();
/// assert_eq!(info.id, "sensor-7");
/// assert_eq!(info.keep_alive, 30);
/// assert!(info.clean_session);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ClientInfo<'a> {
    /// Client identifier.
    pub id: &'a str,
    /// Optional user name.
    #[serde(borrow, default)]
    pub user: Option<&'a str>,
    /// Optional password, only valid together with a user name.
    #[serde(borrow, default)]
    pub pass: Option<&'a str>,
    /// Keep-alive interval in seconds, 0 disables it.
    #[serde(default = "default_keep_alive")]
    pub keep_alive: u16,
    /// Optional last will.
    #[serde(borrow, default)]
    pub will: Option<Will<'a>>,
    /// Ask the server to discard any previous session.
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,
}

fn default_keep_alive() -> u16 {
    DEFAULT_KEEP_ALIVE
}

fn default_clean_session() -> bool {
    true
}

impl<'a> ClientInfo<'a> {
    /// Client info with only an identifier, default keep-alive and a clean
    /// session.
    pub const fn new(id: &'a str) -> Self {
        Self {
            id,
            user: None,
            pass: None,
            keep_alive: DEFAULT_KEEP_ALIVE,
            will: None,
            clean_session: true,
        }
    }

    /// Set the user name and password.
    pub const fn with_credentials(mut self, user: &'a str, pass: Option<&'a str>) -> Self {
        self.user = Some(user);
        self.pass = pass;
        self
    }

    /// Set the keep-alive interval in seconds.
    pub const fn with_keep_alive(mut self, keep_alive: u16) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set the last will.
    pub const fn with_will(mut self, will: Will<'a>) -> Self {
        self.will = Some(will);
        self
    }

    /// Parse client info from a JSON object.
    pub fn from_json(json: &'a str) -> Result<Self, Error> {
        serde_json_core::from_str::<ClientInfo<'a>>(json)
            .map(|(info, _)| info)
            .map_err(|_| Error::InvalidArgument)
    }

    /// Check the fields before they are put on the wire.
    pub fn validate(&self) -> Result<(), Error> {
        if self.id.is_empty() || self.id.len() > u16::MAX as usize {
            return Err(Error::InvalidArgument);
        }
        // MQTT 3.1.1 does not allow a password without a user name.
        if self.pass.is_some() && self.user.is_none() {
            return Err(Error::InvalidArgument);
        }
        if let Some(will) = &self.will {
            if will.topic.is_empty() || will.topic.contains(['+', '#']) {
                return Err(Error::InvalidArgument);
            }
        }
        Ok(())
    }
}

/// Timing knobs of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a request may wait for its acknowledgment, in milliseconds.
    pub request_timeout_ms: u32,
    /// How long the CONNECT may wait for a CONNACK, in milliseconds.
    pub connect_timeout_ms: u32,
    /// PINGRESP deadline as a percentage of the keep-alive interval.
    pub ping_timeout_percent: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            connect_timeout_ms: 10_000,
            ping_timeout_percent: 50,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a JSON object; missing fields keep their
    /// defaults.
    ///
    /// ```rust
    /// use libmqtt::network::application::mqtt::EngineConfig;
    ///
    /// let config = EngineConfig::from_json(r#"{"request_timeout_ms":2500}"#).unwrap();
    /// assert_eq!(config.request_timeout_ms, 2500);
    /// assert_eq!(config.ping_timeout_percent, 50);
    /// ```
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json_core::from_str::<EngineConfig>(json)
            .map(|(config, _)| config)
            .map_err(|_| Error::InvalidArgument)
    }
}
