//! # Request pool
//!
//! Fixed-capacity table of requests that wait for an acknowledgment from the
//! server: QoS 1 and QoS 2 publishes, subscribes and unsubscribes.
//!
//! A slot is *free* (`None`), *in use* (allocated, bytes queued but not yet
//! confirmed by the transport) or *pending* (in use and fully on the wire, so
//! an acknowledgment may be matched against it). Packet identifiers are
//! allocated from a wrapping counter that skips zero and any identifier still
//! held by a live slot.
//!
//! ```text
//!  allocate ──▶ in use ──mark_sent──▶ pending ──release──▶ free
//!                 ▲ │                    │
//!                 │ └──── pop_expired ───┴───────────────▶ free
//!                 └──── rearm (PUBREL) ──┘
//! ```
//!
//! The timeout window opens at allocation and restarts whenever the request
//! becomes pending or is rearmed, so a request stuck behind a stalled write
//! still expires.
//!
//! Progress on the wire is tracked with a cumulative, wrapping byte counter.
//! Each request remembers the counter value at which its last packet ends
//! (`expected_sent_len`); once the transport has confirmed that many bytes the
//! request becomes pending.

use core::array;

use super::error::Error;

/// Default pool capacity.
pub const MAX_REQUESTS: usize = 8;

/// Acknowledgment a request is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack {
    /// QoS 1 publish.
    Puback,
    /// QoS 2 publish, first stage.
    Pubrec,
    /// QoS 2 publish, after PUBREL went out.
    Pubcomp,
    /// Subscribe.
    Suback,
    /// Unsubscribe.
    Unsuback,
}

/// The application operation a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// `publish` with QoS 1 or 2.
    Publish,
    /// `subscribe`.
    Subscribe,
    /// `unsubscribe`.
    Unsubscribe,
}

impl Ack {
    /// Operation that is waiting on this acknowledgment.
    pub const fn operation(self) -> Operation {
        match self {
            Ack::Puback | Ack::Pubrec | Ack::Pubcomp => Operation::Publish,
            Ack::Suback => Operation::Subscribe,
            Ack::Unsuback => Operation::Unsubscribe,
        }
    }
}

/// One in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<A> {
    /// Identifier of the packet on the wire, never zero.
    pub packet_id: u16,
    /// Acknowledgment that completes the current stage.
    pub awaiting: Ack,
    /// User argument returned with the completion event.
    pub arg: A,
    /// Byte counter value at which the current packet is fully sent.
    pub expected_sent_len: u32,
    /// Start of the acknowledgment timeout, in milliseconds.
    pub timeout_start: u32,
    /// The current packet is on the wire and an acknowledgment can match.
    pub pending: bool,
}

/// Whether the wrapping byte counter `confirmed` has reached `mark`.
///
/// Marks are never more than half the counter range ahead, so the wrapped
/// difference tells the two apart.
pub fn reached(confirmed: u32, mark: u32) -> bool {
    confirmed.wrapping_sub(mark) < 0x8000_0000
}

/// Milliseconds between `start` and `now` on a wrapping clock.
pub const fn elapsed(now: u32, start: u32) -> u32 {
    now.wrapping_sub(start)
}

/// Bounded table of in-flight requests.
#[derive(Debug)]
pub struct RequestPool<A, const N: usize = MAX_REQUESTS> {
    slots: [Option<Request<A>>; N],
    last_id: u16,
}

impl<A, const N: usize> Default for RequestPool<A, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, const N: usize> RequestPool<A, N> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            slots: array::from_fn(|_| None),
            last_id: 0,
        }
    }

    /// Number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of slots in use.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// No slot is free.
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// No slot is in use.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Claim a free slot and assign it a fresh packet identifier.
    ///
    /// Fails with [`Error::NoFreeRequest`] instead of waiting when the pool is
    /// full.
    pub fn allocate(&mut self, awaiting: Ack, arg: A, now: u32) -> Result<u16, Error> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::NoFreeRequest)?;
        let packet_id = self.next_packet_id().ok_or(Error::NoFreeRequest)?;
        self.slots[index] = Some(Request {
            packet_id,
            awaiting,
            arg,
            expected_sent_len: 0,
            timeout_start: now,
            pending: false,
        });
        Ok(packet_id)
    }

    fn next_packet_id(&mut self) -> Option<u16> {
        for _ in 0..u16::MAX {
            self.last_id = self.last_id.wrapping_add(1);
            if self.last_id != 0 && self.find(self.last_id).is_none() {
                return Some(self.last_id);
            }
        }
        None
    }

    /// Record where the request's packet ends in the outgoing byte stream.
    pub fn set_expected_sent_len(&mut self, packet_id: u16, mark: u32) -> bool {
        match self.find_mut(packet_id) {
            Some(request) => {
                request.expected_sent_len = mark;
                true
            }
            None => false,
        }
    }

    /// Move a pending request to its next stage, waiting for `awaiting` once
    /// the byte counter reaches `mark`.
    pub fn rearm(&mut self, packet_id: u16, awaiting: Ack, mark: u32, now: u32) -> bool {
        match self.find_mut(packet_id) {
            Some(request) => {
                request.awaiting = awaiting;
                request.expected_sent_len = mark;
                request.timeout_start = now;
                request.pending = false;
                true
            }
            None => false,
        }
    }

    /// Look up a live request by packet identifier.
    pub fn find(&self, packet_id: u16) -> Option<&Request<A>> {
        self.slots
            .iter()
            .flatten()
            .find(|request| request.packet_id == packet_id)
    }

    fn find_mut(&mut self, packet_id: u16) -> Option<&mut Request<A>> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|request| request.packet_id == packet_id)
    }

    /// Look up a request that is fully sent and may be acknowledged.
    pub fn find_pending(&self, packet_id: u16) -> Option<&Request<A>> {
        self.find(packet_id).filter(|request| request.pending)
    }

    /// Free the slot holding `packet_id` and hand back its request.
    pub fn release(&mut self, packet_id: u16) -> Option<Request<A>> {
        self.slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(request) if request.packet_id == packet_id))
            .and_then(Option::take)
    }

    /// Mark requests whose packet is now fully confirmed as pending and start
    /// their acknowledgment timeout. Returns how many changed.
    pub fn mark_sent(&mut self, confirmed: u32, now: u32) -> usize {
        let mut changed = 0;
        for request in self.slots.iter_mut().flatten() {
            if !request.pending && reached(confirmed, request.expected_sent_len) {
                request.pending = true;
                request.timeout_start = now;
                changed += 1;
            }
        }
        changed
    }

    /// Remove one in-use request whose timeout has run out, pending or not.
    pub fn pop_expired(&mut self, now: u32, timeout: u32) -> Option<Request<A>> {
        self.slots
            .iter_mut()
            .find(|slot| {
                matches!(slot, Some(request)
                    if elapsed(now, request.timeout_start) >= timeout)
            })
            .and_then(Option::take)
    }

    /// Remove any live request.
    pub fn pop_any(&mut self) -> Option<Request<A>> {
        self.slots.iter_mut().find_map(Option::take)
    }

    /// Free every slot without reporting.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Iterate over live requests.
    pub fn iter(&self) -> impl Iterator<Item = &Request<A>> {
        self.slots.iter().flatten()
    }
}
