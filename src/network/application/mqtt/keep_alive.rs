//! Keep-alive scheduling.
//!
//! A PINGREQ is due once nothing has been transmitted for a full keep-alive
//! interval. The matching PINGRESP must arrive within a configurable share of
//! that interval, otherwise the connection is considered dead.

use super::request::elapsed;

/// What the scheduler wants done at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeepAliveAction {
    /// Nothing to do.
    Idle,
    /// Queue a PINGREQ.
    SendPing,
    /// The outstanding PINGREQ was never answered.
    Expired,
}

/// Keep-alive timer state for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeepAlive {
    interval_ms: u32,
    response_timeout_ms: u32,
    last_tx: u32,
    ping_sent_at: Option<u32>,
}

impl KeepAlive {
    /// A scheduler that never asks for anything.
    pub const fn disabled() -> Self {
        Self {
            interval_ms: 0,
            response_timeout_ms: 0,
            last_tx: 0,
            ping_sent_at: None,
        }
    }

    /// Start the timer for a session with `keep_alive` seconds.
    ///
    /// `ping_timeout_percent` is clamped to at least 1.
    pub fn arm(&mut self, keep_alive: u16, ping_timeout_percent: u8, now: u32) {
        let interval_ms = u32::from(keep_alive) * 1000;
        let percent = u64::from(ping_timeout_percent.max(1));
        *self = Self {
            interval_ms,
            response_timeout_ms: (u64::from(interval_ms) * percent / 100) as u32,
            last_tx: now,
            ping_sent_at: None,
        };
    }

    /// Stop the timer.
    pub fn disarm(&mut self) {
        *self = Self::disabled();
    }

    /// Whether the timer is running.
    pub const fn is_enabled(&self) -> bool {
        self.interval_ms != 0
    }

    /// Bytes went out at `now`.
    pub fn on_transmit(&mut self, now: u32) {
        self.last_tx = now;
    }

    /// A PINGREQ was queued at `now`.
    pub fn on_ping_sent(&mut self, now: u32) {
        self.ping_sent_at = Some(now);
    }

    /// A PINGRESP arrived. Returns `false` when no ping was outstanding.
    pub fn on_pingresp(&mut self) -> bool {
        self.ping_sent_at.take().is_some()
    }

    /// Whether a PINGREQ is waiting for its response.
    pub const fn ping_outstanding(&self) -> bool {
        self.ping_sent_at.is_some()
    }

    /// Decide what is due at `now`.
    pub fn poll(&self, now: u32) -> KeepAliveAction {
        if !self.is_enabled() {
            return KeepAliveAction::Idle;
        }
        match self.ping_sent_at {
            Some(sent) if elapsed(now, sent) >= self.response_timeout_ms => {
                KeepAliveAction::Expired
            }
            Some(_) => KeepAliveAction::Idle,
            None if elapsed(now, self.last_tx) >= self.interval_ms => KeepAliveAction::SendPing,
            None => KeepAliveAction::Idle,
        }
    }
}
