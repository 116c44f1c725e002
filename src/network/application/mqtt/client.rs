//! Event-driven MQTT 3.1.1 client engine.
//!
//! The [`Client`] never blocks and never owns a thread. The host drives it
//! with two entry points:
//!
//! - [`Client::process`] for every [`TransportEvent`] the socket reports
//! - [`Client::tick`] periodically, for timeouts and keep-alive
//!
//! Everything the engine has to say comes back through one application
//! callback as an [`Event`]. Commands such as [`Client::publish`] only queue
//! bytes and return; their outcome is reported later by a completion event
//! carrying the argument given to the command.
//!
//! # Connection states
//!
//! ```text
//!                 connect()             Connected             CONNACK(0)
//!  Disconnected ────────────▶ TcpConnecting ──────▶ MqttConnecting ──────▶ MqttConnected
//!       ▲                          │                     │    │                 │
//!       │       ConnectFailed      │      CONNACK(1..5)  │    │ disconnect()    │
//!       ├──────────────────────────┘      or timeout     │    ▼                 │
//!       ├────────────────────────────────────────────────┘ TcpDisconnecting ◀───┘
//!       │                        Closed                          │
//!       └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Buffers
//!
//! The caller lends one transmit and one receive buffer. Outgoing packets are
//! appended to the transmit buffer and handed to the transport one chunk at a
//! time; the next chunk leaves only after [`TransportEvent::Sent`] has
//! confirmed the previous one entirely. Incoming bytes are accumulated in the
//! receive buffer until a whole packet is present. A packet larger than the
//! receive buffer is skipped.
//!
//! # Example
//!
//! ```rust
//! use libmqtt::network::application::mqtt::{Client, ClientInfo, Event, QoS};
//! use libmqtt::network::{Transport, TransportEvent};
//! # struct Socket;
//! # impl Transport for Socket {
//! #     type Error = ();
//! #     fn open(&mut self, _host: &str, _port: u16) -> Result<(), ()> { Ok(()) }
//! #     fn send(&mut self, _data: &[u8]) -> Result<(), ()> { Ok(()) }
//! #     fn close(&mut self) -> Result<(), ()> { Ok(()) }
//! # }
//!
//! fn on_event(client: &mut Client<'_, Socket, u32>, event: &Event<'_, u32>) {
//!     if let Event::Connect { status } = event {
//!         if status.is_accepted() {
//!             client.subscribe("sensors/+", QoS::AtLeastOnce, 1).ok();
//!         }
//!     }
//! }
//!
//! let mut tx = [0u8; 256];
//! let mut rx = [0u8; 256];
//! let mut client: Client<'_, Socket, u32> = Client::new(Socket, &mut tx, &mut rx);
//! client.connect("broker.local", 1883, on_event, &ClientInfo::new("sensor-7")).unwrap();
//!
//! client.process(0, TransportEvent::Connected);
//! client.process(1, TransportEvent::Received(&[0x20, 0x02, 0x00, 0x00]));
//! assert!(client.is_connected());
//! ```

use core::fmt;

use heapless::Deque;

use super::config::{ClientInfo, EngineConfig};
use super::error::Error;
use super::event::{ConnectStatus, Event};
use super::keep_alive::{KeepAlive, KeepAliveAction};
use super::packet::{self, Frame, Packet, PacketType, Publish, QoS, SUBACK_FAILURE};
use super::request::{self, Ack, Operation, Request, RequestPool, MAX_REQUESTS};
use crate::log::{debug, error, info, trace, warn};
use crate::network::{Transport, TransportEvent};

/// Connection state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// No connection.
    Disconnected,
    /// Waiting for the transport to open.
    TcpConnecting,
    /// Closing the transport after draining the transmit buffer.
    TcpDisconnecting,
    /// Transport open, CONNECT sent, waiting for CONNACK.
    MqttConnecting,
    /// Session established.
    MqttConnected,
}

impl State {
    const fn accepts_inbound(self) -> bool {
        matches!(self, State::MqttConnecting | State::MqttConnected)
    }

    const fn can_transmit(self) -> bool {
        matches!(
            self,
            State::MqttConnecting | State::MqttConnected | State::TcpDisconnecting
        )
    }
}

/// Application callback receiving every [`Event`].
///
/// The client is passed back so the callback can issue new commands, which is
/// safe from inside any event.
pub type EventFn<'b, T, A, const N: usize> = fn(&mut Client<'b, T, A, N>, &Event<'_, A>);

/// Outgoing byte queue over a caller-supplied buffer.
///
/// `written` and `confirmed` are cumulative wrapping counters of bytes queued
/// and bytes confirmed by the transport; request completion is measured
/// against them.
struct TxBuffer<'b> {
    buf: &'b mut [u8],
    len: usize,
    in_flight: usize,
    in_flight_confirmed: usize,
    written: u32,
    confirmed: u32,
}

impl<'b> TxBuffer<'b> {
    fn new(buf: &'b mut [u8]) -> Self {
        Self {
            buf,
            len: 0,
            in_flight: 0,
            in_flight_confirmed: 0,
            written: 0,
            confirmed: 0,
        }
    }

    /// Append one encoded packet; returns the byte mark at which it ends.
    fn push<F>(&mut self, encode: F) -> Result<u32, Error>
    where
        F: FnOnce(&mut [u8]) -> Result<usize, packet::Error>,
    {
        let n = encode(&mut self.buf[self.len..])?;
        self.len += n;
        self.written = self.written.wrapping_add(n as u32);
        Ok(self.written)
    }

    /// Everything queued so far, unless a chunk is already in flight.
    fn next_chunk(&mut self) -> Option<&[u8]> {
        if self.in_flight != 0 || self.len == 0 {
            return None;
        }
        self.in_flight = self.len;
        Some(&self.buf[..self.in_flight])
    }

    /// Account for `n` bytes confirmed by the transport. Returns how many of
    /// them belonged to the in-flight chunk.
    fn confirm(&mut self, n: usize) -> usize {
        let n = n.min(self.in_flight - self.in_flight_confirmed);
        self.in_flight_confirmed += n;
        self.confirmed = self.confirmed.wrapping_add(n as u32);
        if self.in_flight != 0 && self.in_flight_confirmed == self.in_flight {
            self.buf.copy_within(self.in_flight..self.len, 0);
            self.len -= self.in_flight;
            self.in_flight = 0;
            self.in_flight_confirmed = 0;
        }
        n
    }

    fn is_drained(&self) -> bool {
        self.len == 0
    }

    fn reset(&mut self) {
        self.len = 0;
        self.in_flight = 0;
        self.in_flight_confirmed = 0;
        self.written = self.confirmed;
    }
}

/// Incoming byte accumulator over a caller-supplied buffer.
struct RxBuffer<'b> {
    buf: &'b mut [u8],
    len: usize,
    /// Bytes still to discard from a packet too large for `buf`.
    skip: usize,
}

impl RxBuffer<'_> {
    fn reset(&mut self) {
        self.len = 0;
        self.skip = 0;
    }
}

/// A QoS 0 publish waiting for its bytes to leave the socket.
struct SentMarker<A> {
    mark: u32,
    arg: A,
}

/// Event-driven MQTT client.
///
/// * `T` - the host [`Transport`]
/// * `A` - user argument attached to each request and returned with its
///   completion event
/// * `N` - capacity of the request pool and of the QoS 0 completion queue
pub struct Client<'b, T, A = usize, const N: usize = MAX_REQUESTS> {
    transport: T,
    state: State,
    /// The server accepted the current session.
    accepted: bool,
    /// `close` was already requested on the transport.
    closing: bool,
    /// A close requested by the engine has not been reported back yet.
    /// Survives the link reset so the late `Closed` is not taken for the
    /// next connection's.
    close_pending: bool,
    tx: TxBuffer<'b>,
    rx: RxBuffer<'b>,
    requests: RequestPool<A, N>,
    unconfirmed: Deque<SentMarker<A>, N>,
    /// Acknowledgments owed to the server that did not fit the transmit
    /// buffer, in arrival order.
    deferred_acks: Deque<(PacketType, u16), N>,
    keep_alive: KeepAlive,
    keep_alive_secs: u16,
    connect_started: u32,
    now: u32,
    config: EngineConfig,
    user_arg: Option<A>,
    evt_fn: Option<EventFn<'b, T, A, N>>,
}

impl<'b, T: Transport, A, const N: usize> Client<'b, T, A, N> {
    /// Create a disconnected client with default [`EngineConfig`].
    pub fn new(transport: T, tx_buf: &'b mut [u8], rx_buf: &'b mut [u8]) -> Self {
        Self::with_config(transport, tx_buf, rx_buf, EngineConfig::default())
    }

    /// Create a disconnected client with explicit timing configuration.
    pub fn with_config(
        transport: T,
        tx_buf: &'b mut [u8],
        rx_buf: &'b mut [u8],
        config: EngineConfig,
    ) -> Self {
        Self {
            transport,
            state: State::Disconnected,
            accepted: false,
            closing: false,
            close_pending: false,
            tx: TxBuffer::new(tx_buf),
            rx: RxBuffer {
                buf: rx_buf,
                len: 0,
                skip: 0,
            },
            requests: RequestPool::new(),
            unconfirmed: Deque::new(),
            deferred_acks: Deque::new(),
            keep_alive: KeepAlive::disabled(),
            keep_alive_secs: 0,
            connect_started: 0,
            now: 0,
            config,
            user_arg: None,
            evt_fn: None,
        }
    }

    /// Hand the transport back. Only possible while disconnected; otherwise
    /// the client is returned unchanged.
    pub fn into_transport(self) -> Result<T, Self> {
        if self.state == State::Disconnected {
            Ok(self.transport)
        } else {
            Err(self)
        }
    }

    /// Current connection state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the session is established.
    pub fn is_connected(&self) -> bool {
        self.state == State::MqttConnected
    }

    /// Timing configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Client-level user argument.
    pub fn user_arg(&self) -> Option<&A> {
        self.user_arg.as_ref()
    }

    /// Replace the client-level user argument, returning the previous one.
    pub fn set_user_arg(&mut self, arg: A) -> Option<A> {
        self.user_arg.replace(arg)
    }

    /// Number of request pool slots in use.
    pub fn requests_in_use(&self) -> usize {
        self.requests.in_use()
    }

    /// Shared access to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Exclusive access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Start connecting to `host:port`.
    ///
    /// The CONNECT packet is built from `info` right away and sent once the
    /// transport reports [`TransportEvent::Connected`]. The outcome arrives as
    /// [`Event::Connect`] on `evt_fn`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless disconnected
    /// - [`Error::InvalidArgument`] for an unusable `info`
    /// - [`Error::BufferFull`] when CONNECT does not fit the transmit buffer
    /// - [`Error::Transport`] when the transport refuses to open
    pub fn connect(
        &mut self,
        host: &str,
        port: u16,
        evt_fn: EventFn<'b, T, A, N>,
        info: &ClientInfo<'_>,
    ) -> Result<(), Error> {
        if self.state != State::Disconnected {
            return Err(Error::InvalidState);
        }
        info.validate()?;

        self.reset_link();
        self.tx.push(|buf| packet::encode_connect(buf, info))?;
        self.keep_alive_secs = info.keep_alive;
        self.evt_fn = Some(evt_fn);

        if self.transport.open(host, port).is_err() {
            error!("transport refused to open {}:{}", host, port);
            self.tx.reset();
            return Err(Error::Transport);
        }
        info!("connecting to {}:{} as {}", host, port, info.id);
        self.set_state(State::TcpConnecting);
        Ok(())
    }

    /// Close the connection gracefully.
    ///
    /// Sends DISCONNECT when the session was accepted, then closes the
    /// transport once everything queued has left. In-flight requests fail with
    /// [`Error::ConnectionLost`] when the close completes.
    pub fn disconnect(&mut self) -> Result<(), Error> {
        if !self.state.accepts_inbound() {
            return Err(Error::InvalidState);
        }
        if self.accepted && self.tx.push(packet::encode_disconnect).is_err() {
            warn!("no room for DISCONNECT, closing anyway");
        }
        self.keep_alive.disarm();
        self.set_state(State::TcpDisconnecting);
        if self.tx.is_drained() {
            self.close_transport();
        } else {
            self.flush(self.now);
        }
        Ok(())
    }

    /// Subscribe to one topic filter.
    ///
    /// Completion is reported as [`Event::Subscribe`] with `arg`; a refusal
    /// by the server yields [`Error::Rejected`].
    pub fn subscribe(&mut self, filter: &str, qos: QoS, arg: A) -> Result<(), Error> {
        self.ensure_connected()?;
        validate_filter(filter)?;
        let packet_id = self.requests.allocate(Ack::Suback, arg, self.now)?;
        self.queue_request(packet_id, |buf| {
            packet::encode_subscribe(buf, packet_id, filter, qos)
        })?;
        debug!("SUBSCRIBE {} queued as {}", filter, packet_id);
        self.flush(self.now);
        Ok(())
    }

    /// Unsubscribe from one topic filter.
    ///
    /// Completion is reported as [`Event::Unsubscribe`] with `arg`.
    pub fn unsubscribe(&mut self, filter: &str, arg: A) -> Result<(), Error> {
        self.ensure_connected()?;
        validate_filter(filter)?;
        let packet_id = self.requests.allocate(Ack::Unsuback, arg, self.now)?;
        self.queue_request(packet_id, |buf| {
            packet::encode_unsubscribe(buf, packet_id, filter)
        })?;
        debug!("UNSUBSCRIBE {} queued as {}", filter, packet_id);
        self.flush(self.now);
        Ok(())
    }

    /// Publish a message.
    ///
    /// QoS 0 completes once the bytes have left the socket and does not use a
    /// request slot. QoS 1 completes on PUBACK, QoS 2 on PUBCOMP. Completion
    /// is reported as [`Event::Publish`] with `arg`.
    pub fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
        arg: A,
    ) -> Result<(), Error> {
        self.ensure_connected()?;
        validate_topic(topic)?;

        let mut publish = Publish {
            topic,
            packet_id: None,
            payload,
            qos,
            dup: false,
            retain,
        };

        match qos {
            QoS::AtMostOnce => {
                if self.unconfirmed.is_full() {
                    return Err(Error::BufferFull);
                }
                let mark = self.tx.push(|buf| packet::encode_publish(buf, &publish))?;
                if self.unconfirmed.push_back(SentMarker { mark, arg }).is_err() {
                    return Err(Error::BufferFull);
                }
            }
            QoS::AtLeastOnce | QoS::ExactlyOnce => {
                let ack = if qos == QoS::AtLeastOnce {
                    Ack::Puback
                } else {
                    Ack::Pubrec
                };
                let packet_id = self.requests.allocate(ack, arg, self.now)?;
                publish.packet_id = Some(packet_id);
                self.queue_request(packet_id, |buf| packet::encode_publish(buf, &publish))?;
            }
        }

        trace!("PUBLISH {} ({} bytes) queued", topic, payload.len());
        self.flush(self.now);
        Ok(())
    }

    /// Feed one transport event into the engine.
    ///
    /// `now` is a millisecond clock that may wrap.
    pub fn process(&mut self, now: u32, event: TransportEvent<'_>) {
        self.now = now;
        match event {
            TransportEvent::Connected => self.on_connected(now),
            TransportEvent::ConnectFailed => self.on_connect_failed(),
            TransportEvent::Sent(n) => self.on_sent(now, n),
            TransportEvent::Received(data) => self.on_received(now, data),
            TransportEvent::Closed => self.on_closed(),
        }
    }

    /// Periodic housekeeping: connect timeout, request timeouts and
    /// keep-alive.
    pub fn tick(&mut self, now: u32) {
        self.now = now;
        match self.state {
            State::MqttConnecting => {
                if request::elapsed(now, self.connect_started) >= self.config.connect_timeout_ms {
                    warn!("no CONNACK within {} ms", self.config.connect_timeout_ms);
                    self.refuse(ConnectStatus::Timeout);
                }
            }
            State::MqttConnected => {
                self.expire_requests(now);
                if self.state == State::MqttConnected {
                    self.poll_keep_alive(now);
                }
            }
            _ => {}
        }
    }

    fn on_connected(&mut self, now: u32) {
        if self.state != State::TcpConnecting {
            warn!("unexpected transport connect in {}", self.state);
            return;
        }
        self.set_state(State::MqttConnecting);
        self.connect_started = now;
        self.flush(now);
    }

    fn on_connect_failed(&mut self) {
        if self.state != State::TcpConnecting {
            warn!("unexpected transport connect failure in {}", self.state);
            return;
        }
        self.reset_link();
        self.set_state(State::Disconnected);
        self.dispatch(&Event::Connect {
            status: ConnectStatus::TcpFailed,
        });
    }

    fn on_sent(&mut self, now: u32, n: usize) {
        if !self.state.can_transmit() {
            return;
        }
        let accounted = self.tx.confirm(n);
        if accounted != n {
            warn!("transport confirmed {} bytes, {} were in flight", n, accounted);
        }

        let confirmed = self.tx.confirmed;
        self.requests.mark_sent(confirmed, now);
        while let Some(marker) = self.unconfirmed.front() {
            if !request::reached(confirmed, marker.mark) {
                break;
            }
            if let Some(marker) = self.unconfirmed.pop_front() {
                self.dispatch(&Event::Publish {
                    arg: marker.arg,
                    result: Ok(()),
                });
            }
        }

        if self.state == State::MqttConnected {
            self.queue_deferred_acks();
        }
        if self.state == State::TcpDisconnecting && self.tx.is_drained() {
            self.close_transport();
        } else {
            self.flush(now);
        }
    }

    fn on_received(&mut self, now: u32, mut data: &[u8]) {
        if !self.state.accepts_inbound() {
            debug!("dropping {} bytes received in {}", data.len(), self.state);
            return;
        }
        if self.rx.buf.is_empty() {
            error!("receive buffer has no capacity");
            self.abort(Error::BufferFull);
            return;
        }

        while !data.is_empty() && self.state.accepts_inbound() {
            if self.rx.skip > 0 {
                let n = self.rx.skip.min(data.len());
                self.rx.skip -= n;
                data = &data[n..];
                continue;
            }
            let free = self.rx.buf.len() - self.rx.len;
            let n = free.min(data.len());
            self.rx.buf[self.rx.len..self.rx.len + n].copy_from_slice(&data[..n]);
            self.rx.len += n;
            data = &data[n..];
            self.process_rx(now);
        }
    }

    /// Handle every complete packet in the receive buffer.
    fn process_rx(&mut self, now: u32) {
        // Events borrow from the buffer while handlers need `&mut self`, so
        // the buffer is taken out for the duration.
        let rx = core::mem::take(&mut self.rx.buf);
        let mut start = 0;

        while start < self.rx.len && self.state.accepts_inbound() {
            let pending = &rx[start..self.rx.len];
            match packet::decode(pending) {
                Ok(frame) => {
                    start += frame.header.frame_len();
                    if !self.handle_frame(now, &frame) {
                        break;
                    }
                }
                Err(packet::Error::Incomplete) => {
                    if start == 0 && self.rx.len == rx.len() {
                        self.drop_oversized(pending);
                    }
                    break;
                }
                Err(e) => {
                    error!("undecodable packet: {}", e);
                    self.abort(Error::Protocol);
                    break;
                }
            }
        }

        if self.state.accepts_inbound() {
            rx.copy_within(start..self.rx.len, 0);
            self.rx.len -= start;
        } else {
            self.rx.reset();
        }
        self.rx.buf = rx;
    }

    /// The buffer is full and still holds no complete packet.
    fn drop_oversized(&mut self, pending: &[u8]) {
        match packet::FixedHeader::parse(pending) {
            Ok(header) => {
                warn!(
                    "dropping {} packet of {} bytes, receive buffer holds {}",
                    header.packet_type,
                    header.frame_len(),
                    pending.len()
                );
                self.rx.skip = header.frame_len() - pending.len();
                self.rx.len = 0;
            }
            Err(e) => {
                error!("fixed header does not fit the receive buffer: {}", e);
                self.abort(Error::BufferFull);
            }
        }
    }

    /// Returns `false` once the session was torn down.
    fn handle_frame(&mut self, now: u32, frame: &Frame<'_>) -> bool {
        let packet = match Packet::parse(frame) {
            Ok(packet) => packet,
            Err(e) => {
                error!("malformed {} packet: {}", frame.header.packet_type, e);
                self.abort(Error::Protocol);
                return false;
            }
        };
        trace!("received {}", packet.packet_type());

        match self.state {
            State::MqttConnecting => match packet {
                Packet::Connack { return_code, .. } => self.on_connack(now, return_code),
                other => {
                    error!("{} before CONNACK", other.packet_type());
                    self.abort(Error::Protocol);
                    false
                }
            },
            State::MqttConnected => self.on_session_packet(now, packet),
            _ => false,
        }
    }

    fn on_connack(&mut self, now: u32, return_code: u8) -> bool {
        match ConnectStatus::from_return_code(return_code) {
            Some(ConnectStatus::Accepted) => {
                self.accepted = true;
                self.set_state(State::MqttConnected);
                self.keep_alive
                    .arm(self.keep_alive_secs, self.config.ping_timeout_percent, now);
                info!("session accepted");
                self.dispatch(&Event::Connect {
                    status: ConnectStatus::Accepted,
                });
                true
            }
            Some(status) => {
                warn!("connection refused: {}", status);
                self.refuse(status);
                false
            }
            None => {
                error!("reserved CONNACK return code {}", return_code);
                self.abort(Error::Protocol);
                false
            }
        }
    }

    fn on_session_packet(&mut self, now: u32, packet: Packet<'_>) -> bool {
        match packet {
            Packet::Connack { .. } => {
                error!("CONNACK on an established session");
                self.abort(Error::Protocol);
                false
            }
            Packet::Publish(publish) => {
                self.on_publish(publish);
                true
            }
            Packet::Puback(id) => self.on_ack(now, id, Ack::Puback, Ok(())),
            Packet::Pubrec(id) => self.on_ack(now, id, Ack::Pubrec, Ok(())),
            Packet::Pubcomp(id) => self.on_ack(now, id, Ack::Pubcomp, Ok(())),
            Packet::Unsuback(id) => self.on_ack(now, id, Ack::Unsuback, Ok(())),
            Packet::Suback {
                packet_id,
                return_codes,
            } => {
                let result = if return_codes.contains(&SUBACK_FAILURE) {
                    Err(Error::Rejected)
                } else {
                    Ok(())
                };
                self.on_ack(now, packet_id, Ack::Suback, result)
            }
            Packet::Pubrel(id) => {
                self.queue_ack(PacketType::Pubcomp, id);
                true
            }
            Packet::Pingresp => {
                if self.keep_alive.on_pingresp() {
                    self.dispatch(&Event::KeepAlive);
                } else {
                    debug!("unsolicited PINGRESP");
                }
                true
            }
        }
    }

    fn on_publish(&mut self, publish: Publish<'_>) {
        let Publish {
            topic,
            packet_id,
            payload,
            qos,
            dup,
            retain,
        } = publish;
        self.dispatch(&Event::PublishReceived {
            topic,
            payload,
            qos,
            dup,
            retain,
        });
        if self.state != State::MqttConnected {
            return;
        }
        match (qos, packet_id) {
            (QoS::AtLeastOnce, Some(id)) => self.queue_ack(PacketType::Puback, id),
            (QoS::ExactlyOnce, Some(id)) => self.queue_ack(PacketType::Pubrec, id),
            _ => {}
        }
    }

    /// Match an acknowledgment against the pool. Returns `false` once the
    /// session was torn down.
    fn on_ack(&mut self, now: u32, packet_id: u16, ack: Ack, result: Result<(), Error>) -> bool {
        let awaiting = match self.requests.find_pending(packet_id) {
            Some(request) => request.awaiting,
            None => {
                warn!("{} for unknown packet id {}", ack, packet_id);
                return true;
            }
        };

        if awaiting != ack {
            error!(
                "packet id {} expected {} but got {}",
                packet_id, awaiting, ack
            );
            if let Some(request) = self.requests.release(packet_id) {
                self.resolve(request, Err(Error::Protocol));
            }
            if self.state.can_transmit() {
                self.abort(Error::Protocol);
            }
            return false;
        }

        if ack == Ack::Pubrec {
            match self
                .tx
                .push(|buf| packet::encode_ack(buf, PacketType::Pubrel, packet_id))
            {
                Ok(mark) => {
                    self.requests.rearm(packet_id, Ack::Pubcomp, mark, now);
                    self.flush(now);
                }
                Err(e) => {
                    warn!("no room for PUBREL {}", packet_id);
                    if let Some(request) = self.requests.release(packet_id) {
                        self.resolve(request, Err(e));
                    }
                }
            }
            return true;
        }

        if let Some(request) = self.requests.release(packet_id) {
            self.resolve(request, result);
        }
        true
    }

    fn queue_ack(&mut self, packet_type: PacketType, packet_id: u16) {
        if self.deferred_acks.is_empty()
            && self
                .tx
                .push(|buf| packet::encode_ack(buf, packet_type, packet_id))
                .is_ok()
        {
            self.flush(self.now);
            return;
        }
        match self.deferred_acks.push_back((packet_type, packet_id)) {
            Ok(()) => debug!("{} {} waits for transmit buffer space", packet_type, packet_id),
            // The server redelivers the unacknowledged packet.
            Err(_) => warn!("no room for {} {}, dropped", packet_type, packet_id),
        }
    }

    /// Move deferred acknowledgments into the transmit buffer while they fit.
    fn queue_deferred_acks(&mut self) {
        while let Some(&(packet_type, packet_id)) = self.deferred_acks.front() {
            if self
                .tx
                .push(|buf| packet::encode_ack(buf, packet_type, packet_id))
                .is_err()
            {
                break;
            }
            self.deferred_acks.pop_front();
        }
    }

    fn queue_request<F>(&mut self, packet_id: u16, encode: F) -> Result<(), Error>
    where
        F: FnOnce(&mut [u8]) -> Result<usize, packet::Error>,
    {
        match self.tx.push(encode) {
            Ok(mark) => {
                self.requests.set_expected_sent_len(packet_id, mark);
                Ok(())
            }
            Err(e) => {
                self.requests.release(packet_id);
                Err(e)
            }
        }
    }

    fn expire_requests(&mut self, now: u32) {
        let timeout = self.config.request_timeout_ms;
        while let Some(request) = self.requests.pop_expired(now, timeout) {
            warn!("packet id {} timed out waiting for {}", request.packet_id, request.awaiting);
            self.resolve(request, Err(Error::Timeout));
        }
    }

    fn poll_keep_alive(&mut self, now: u32) {
        match self.keep_alive.poll(now) {
            KeepAliveAction::Idle => {}
            KeepAliveAction::SendPing => match self.tx.push(packet::encode_pingreq) {
                Ok(_) => {
                    trace!("PINGREQ");
                    self.keep_alive.on_ping_sent(now);
                    self.flush(now);
                }
                Err(_) => warn!("no room for PINGREQ"),
            },
            KeepAliveAction::Expired => {
                warn!("PINGRESP overdue");
                self.abort(Error::Timeout);
            }
        }
    }

    /// Hand the next chunk to the transport if nothing is in flight.
    fn flush(&mut self, now: u32) {
        if !self.state.can_transmit() || self.closing {
            return;
        }
        let Some(chunk) = self.tx.next_chunk() else {
            return;
        };
        let len = chunk.len();
        match self.transport.send(chunk) {
            Ok(()) => {
                trace!("handed {} bytes to transport", len);
                self.keep_alive.on_transmit(now);
            }
            Err(_) => {
                error!("transport send of {} bytes failed", len);
                self.abort(Error::Transport);
            }
        }
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.state == State::MqttConnected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn on_closed(&mut self) {
        if self.close_pending {
            self.close_pending = false;
            if self.state != State::TcpDisconnecting {
                debug!("close completed after the link was already reported down");
                return;
            }
        }
        match self.state {
            State::Disconnected => debug!("transport closed while disconnected"),
            State::TcpConnecting => {
                self.reset_link();
                self.set_state(State::Disconnected);
                self.dispatch(&Event::Connect {
                    status: ConnectStatus::TcpFailed,
                });
            }
            _ => self.finish_disconnect(),
        }
    }

    fn close_transport(&mut self) {
        if self.closing {
            return;
        }
        self.closing = true;
        match self.transport.close() {
            Ok(()) => self.close_pending = true,
            Err(_) => {
                warn!("transport close failed, treating as closed");
                self.finish_disconnect();
            }
        }
    }

    /// Tear the session down right away: close the transport without waiting
    /// for the transmit buffer, then report.
    fn abort(&mut self, cause: Error) {
        warn!("aborting connection: {}", cause);
        if !self.closing {
            self.closing = true;
            self.request_close();
        }
        self.finish_disconnect();
    }

    /// Connection attempt ended before a session existed.
    fn refuse(&mut self, status: ConnectStatus) {
        self.requests.clear();
        self.unconfirmed.clear();
        if !self.closing {
            self.request_close();
        }
        self.reset_link();
        self.set_state(State::Disconnected);
        self.dispatch(&Event::Connect { status });
    }

    /// Close without waiting for the completion.
    fn request_close(&mut self) {
        match self.transport.close() {
            Ok(()) => self.close_pending = true,
            Err(_) => debug!("transport close failed"),
        }
    }

    fn finish_disconnect(&mut self) {
        let is_accepted = self.accepted;
        self.reset_link();
        self.set_state(State::Disconnected);
        info!("disconnected, session accepted: {}", is_accepted);
        self.dispatch(&Event::Disconnect { is_accepted });
        self.fail_all(Error::ConnectionLost);
    }

    fn fail_all(&mut self, cause: Error) {
        while let Some(marker) = self.unconfirmed.pop_front() {
            self.dispatch(&Event::Publish {
                arg: marker.arg,
                result: Err(cause),
            });
        }
        while let Some(request) = self.requests.pop_any() {
            self.resolve(request, Err(cause));
        }
    }

    fn resolve(&mut self, request: Request<A>, result: Result<(), Error>) {
        let Request { arg, awaiting, .. } = request;
        let event = match awaiting.operation() {
            Operation::Publish => Event::Publish { arg, result },
            Operation::Subscribe => Event::Subscribe { arg, result },
            Operation::Unsubscribe => Event::Unsubscribe { arg, result },
        };
        self.dispatch(&event);
    }

    fn dispatch(&mut self, event: &Event<'_, A>) {
        if let Some(evt_fn) = self.evt_fn {
            evt_fn(self, event);
        }
    }

    fn reset_link(&mut self) {
        self.tx.reset();
        self.rx.reset();
        self.deferred_acks.clear();
        self.keep_alive.disarm();
        self.accepted = false;
        self.closing = false;
    }

    fn set_state(&mut self, state: State) {
        if self.state != state {
            debug!("state {} -> {}", self.state, state);
            self.state = state;
        }
    }
}

impl<T, A, const N: usize> fmt::Debug for Client<'_, T, A, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("accepted", &self.accepted)
            .field("close_pending", &self.close_pending)
            .field("requests_in_use", &self.requests.in_use())
            .field("tx_queued", &self.tx.len)
            .field("rx_buffered", &self.rx.len)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Topic names for PUBLISH must not be empty or contain wildcards.
fn validate_topic(topic: &str) -> Result<(), Error> {
    if topic.is_empty() || topic.contains(['+', '#']) {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

fn validate_filter(filter: &str) -> Result<(), Error> {
    if filter.is_empty() {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}
