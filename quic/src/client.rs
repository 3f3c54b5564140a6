//! single-connection benchmark client
//!
//! [`Client`] owns the socket, the engine connection, the request schedule,
//! the timers and the timing ledger. the event loop in [`Client::run`] waits
//! on socket readability or the nearest timer deadline and calls exactly one
//! handler at a time. every handler that touches the engine ends with
//! [`Client::flush_egress`] so nothing the engine produced is left unsent
//! while the loop sleeps.

use crate::config::{BenchConfig, MAX_DATAGRAM_SIZE, MAX_RECV_SIZE};
use crate::engine::{Engine, TransportStats};
use crate::error::{Error, Result};
use crate::socket::DatagramSocket;
use crate::timer::{TimerKind, Timers};
use mio::{Events, Interest, Poll, Token};
use std::io::{self, Write};
use std::time::Instant;
use volley_timing::TimingLedger;

/// first client-initiated bidirectional stream used for requests
pub const FIRST_STREAM_ID: u64 = 4;

/// distance between consecutive client-initiated bidirectional streams
pub const STREAM_ID_STRIDE: u64 = 4;

const SOCKET_TOKEN: Token = Token(0);

/// stream id carrying request `index`
#[inline(always)]
pub fn stream_id_for(index: usize) -> u64 {
    FIRST_STREAM_ID + STREAM_ID_STRIDE * index as u64
}

/// request index carried by `stream_id`, None for streams the client never opens
#[inline(always)]
pub fn request_index(stream_id: u64) -> Option<usize> {
    if stream_id < FIRST_STREAM_ID || (stream_id - FIRST_STREAM_ID) % STREAM_ID_STRIDE != 0 {
        return None;
    }
    Some(((stream_id - FIRST_STREAM_ID) / STREAM_ID_STRIDE) as usize)
}

/// connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Handshaking,
    /// issuing requests
    Established,
    /// budget exhausted, waiting out the grace period
    Draining,
    Closed,
}

/// how a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// grace period elapsed and the engine accepted the close
    Finished,
    /// grace period elapsed but the engine refused to close
    CloseRejected,
    /// the engine closed the connection itself (idle timeout, peer close)
    Closed(TransportStats),
}

impl Outcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::CloseRejected)
    }
}

/// result of one handler invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done(Outcome),
}

/// benchmark client for one connection
pub struct Client<E, S, W> {
    engine: E,
    socket: S,
    /// response bytes and the latency report
    out: W,
    bench: BenchConfig,
    ledger: TimingLedger,
    timers: Timers,
    phase: Phase,
    next_stream_id: u64,
    /// requests fully written
    issued: usize,
    /// bytes of the current request already accepted by the engine
    request_offset: usize,
    shutdown_fired: bool,
    send_buf: Box<[u8]>,
    recv_buf: Box<[u8]>,
}

impl<E: Engine, S: DatagramSocket, W: Write> Client<E, S, W> {
    pub fn new(engine: E, socket: S, out: W, bench: BenchConfig) -> Self {
        let ledger = TimingLedger::new(bench.requests);
        Self {
            engine,
            socket,
            out,
            bench,
            ledger,
            timers: Timers::new(),
            phase: Phase::Handshaking,
            next_stream_id: FIRST_STREAM_ID,
            issued: 0,
            request_offset: 0,
            shutdown_fired: false,
            send_buf: vec![0u8; MAX_DATAGRAM_SIZE].into_boxed_slice(),
            recv_buf: vec![0u8; MAX_RECV_SIZE].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[inline]
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    #[inline]
    pub fn socket(&self) -> &S {
        &self.socket
    }

    #[inline]
    pub fn output(&self) -> &W {
        &self.out
    }

    #[inline]
    pub fn ledger(&self) -> &TimingLedger {
        &self.ledger
    }

    #[inline]
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// requests fully written so far
    #[inline]
    pub fn issued(&self) -> usize {
        self.issued
    }

    #[inline]
    pub fn next_stream_id(&self) -> u64 {
        self.next_stream_id
    }

    /// arm the request cadence and send the first flight
    pub fn start(&mut self, now: Instant) -> Result<()> {
        self.timers
            .arm_after(TimerKind::Request, now, self.bench.request_interval);
        let packets = self.flush_egress(now)?;
        log::debug!("start: sent {} packets", packets);
        Ok(())
    }

    /// write every pending engine packet to the socket, then re-arm the
    /// retransmission timer from the engine's timeout.
    ///
    /// returns the number of datagrams written. a short or would-block send
    /// is fatal: datagrams cannot be resumed.
    pub fn flush_egress(&mut self, now: Instant) -> Result<usize> {
        let mut packets = 0;

        loop {
            let len = match self.engine.send(&mut self.send_buf) {
                Ok(Some(len)) => len,
                Ok(None) => {
                    log::trace!("flush_egress: done writing");
                    break;
                }
                Err(e) => {
                    log::error!("flush_egress: failed to create packet: {}", e);
                    break;
                }
            };

            let sent = match self.socket.send(&self.send_buf[..len]) {
                Ok(sent) => sent,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    log::error!("flush_egress: send would block ({} bytes)", len);
                    return Err(Error::SendWouldBlock);
                }
                Err(e) => {
                    log::error!("flush_egress: failed to send: {}", e);
                    return Err(Error::Io(e));
                }
            };

            if sent != len {
                log::error!("flush_egress: short write {} of {} bytes", sent, len);
                return Err(Error::ShortWrite { sent, len });
            }

            log::trace!("flush_egress: sent {} bytes", sent);
            packets += 1;
        }

        match self.engine.timeout() {
            Some(timeout) => self.timers.arm_after(TimerKind::Retransmit, now, timeout),
            None => self.timers.stop(TimerKind::Retransmit),
        }

        Ok(packets)
    }

    /// drain the socket into the engine, read responses, flush.
    pub fn on_socket_readable(&mut self, now: Instant) -> Result<Flow> {
        // readiness is edge-triggered: always drain to WouldBlock
        loop {
            let len = match self.socket.recv(&mut self.recv_buf) {
                Ok(len) => len,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    log::trace!("on_socket_readable: recv would block");
                    break;
                }
                Err(e) => {
                    log::error!("on_socket_readable: failed to read: {}", e);
                    return Err(Error::Io(e));
                }
            };

            match self.engine.recv(&mut self.recv_buf[..len]) {
                Ok(Some(done)) => log::trace!("on_socket_readable: recv {} bytes", done),
                Ok(None) => log::trace!("on_socket_readable: {} bytes not processed", len),
                Err(e) => log::warn!("on_socket_readable: failed to process packet: {}", e),
            }
        }

        if self.engine.is_closed() {
            return self.finish_closed().map(Flow::Done);
        }

        if self.engine.is_established() {
            self.mark_established();
            self.read_streams(now)?;
        }

        self.flush_egress(now)?;
        Ok(Flow::Continue)
    }

    /// copy every readable stream to the output, closing ledger slots on fin
    fn read_streams(&mut self, now: Instant) -> Result<()> {
        let readable = self.engine.readable();

        for stream_id in readable {
            log::trace!("read_streams: stream {} is readable", stream_id);

            loop {
                match self.engine.stream_recv(stream_id, &mut self.recv_buf) {
                    Ok(Some((len, fin))) => {
                        self.out.write_all(&self.recv_buf[..len])?;
                        if fin {
                            self.complete(stream_id, now);
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("read_streams: stream {} read failed: {}", stream_id, e);
                        break;
                    }
                }
            }
        }

        self.out.flush()?;
        Ok(())
    }

    fn complete(&mut self, stream_id: u64, now: Instant) {
        match request_index(stream_id) {
            Some(index) if self.ledger.end(index, now) => {
                log::debug!("complete: request {} (stream {}) finished", index, stream_id);
            }
            _ => log::debug!("complete: fin on untracked stream {}", stream_id),
        }
    }

    /// cadence tick: issue the next request while the budget lasts, then
    /// switch to the shutdown countdown.
    pub fn on_request_tick(&mut self, now: Instant) -> Result<Flow> {
        if self.engine.is_established() {
            self.mark_established();
            if self.issued < self.bench.requests {
                self.issue_request(now);
            }
        } else {
            log::trace!("on_request_tick: handshake not complete");
        }

        if self.issued >= self.bench.requests {
            self.timers.stop(TimerKind::Request);
            if matches!(self.phase, Phase::Handshaking | Phase::Established) {
                log::info!(
                    "on_request_tick: {} requests issued, closing in {:?}",
                    self.issued,
                    self.bench.shutdown_grace
                );
                self.timers
                    .arm_after(TimerKind::Shutdown, now, self.bench.shutdown_grace);
                self.phase = Phase::Draining;
            }
        } else {
            self.timers
                .arm_after(TimerKind::Request, now, self.bench.request_interval);
        }

        self.flush_egress(now)?;

        if self.engine.is_closed() {
            return self.finish_closed().map(Flow::Done);
        }
        Ok(Flow::Continue)
    }

    /// write (the rest of) the current request with fin.
    ///
    /// the stream only advances once the whole payload is accepted; failures
    /// are retried on the next tick.
    fn issue_request(&mut self, now: Instant) {
        let stream_id = self.next_stream_id;
        let index = self.issued;
        let remaining = &self.bench.request[self.request_offset..];

        match self.engine.stream_send(stream_id, remaining, true) {
            Ok(0) if !remaining.is_empty() => {
                log::warn!(
                    "issue_request: no capacity on stream {}, retrying next tick",
                    stream_id
                );
            }
            Ok(written) => {
                if self.request_offset == 0 {
                    self.ledger.begin(index, now);
                }
                self.request_offset += written;

                if self.request_offset < self.bench.request.len() {
                    log::debug!(
                        "issue_request: stream {} partial write {}/{}",
                        stream_id,
                        self.request_offset,
                        self.bench.request.len()
                    );
                    return;
                }

                log::debug!("issue_request: sent request {} on stream {}", index, stream_id);
                self.request_offset = 0;
                self.next_stream_id += STREAM_ID_STRIDE;
                self.issued += 1;
            }
            Err(e) => {
                log::warn!(
                    "issue_request: failed to send request on stream {}: {}",
                    stream_id,
                    e
                );
            }
        }
    }

    /// engine timer fired: let it run loss detection / idle timeout, flush,
    /// and stop if that closed the connection.
    pub fn on_retransmission_timeout(&mut self, now: Instant) -> Result<Flow> {
        self.engine.on_timeout();
        log::debug!("on_retransmission_timeout: timeout");

        self.flush_egress(now)?;

        if self.engine.is_closed() {
            return self.finish_closed().map(Flow::Done);
        }
        Ok(Flow::Continue)
    }

    /// grace period over: report latencies and close. runs at most once.
    pub fn on_shutdown_grace_expired(&mut self, now: Instant) -> Result<Flow> {
        if self.shutdown_fired {
            log::debug!("on_shutdown_grace_expired: already handled");
            return Ok(Flow::Continue);
        }
        self.shutdown_fired = true;
        self.timers.stop(TimerKind::Shutdown);

        self.report()?;

        let outcome = match self.engine.close(true, 0, b"") {
            Ok(()) => {
                log::info!("on_shutdown_grace_expired: connection closed");
                Outcome::Finished
            }
            Err(e) => {
                log::error!("on_shutdown_grace_expired: failed to close connection: {}", e);
                Outcome::CloseRejected
            }
        };

        self.flush_egress(now)?;
        self.phase = Phase::Closed;
        Ok(Flow::Done(outcome))
    }

    fn mark_established(&mut self) {
        if self.phase == Phase::Handshaking {
            log::info!("handshake completed");
            self.phase = Phase::Established;
        }
    }

    /// the engine closed on its own
    fn finish_closed(&mut self) -> Result<Outcome> {
        let stats = self.engine.stats();
        log::info!("connection closed, {}", stats);

        self.phase = Phase::Closed;
        self.report()?;
        Ok(Outcome::Closed(stats))
    }

    /// per-request latency lines on the output, summary in the log
    fn report(&mut self) -> Result<()> {
        let lines = self.ledger.write_report(&mut self.out)?;

        let incomplete: Vec<usize> = self.ledger.incomplete().collect();
        if !incomplete.is_empty() {
            log::warn!(
                "report: {} of {} requests incomplete: {:?}",
                incomplete.len(),
                self.ledger.len(),
                incomplete
            );
        }

        log::info!(
            "report: {} complete, latency {}",
            lines,
            self.ledger.histogram().summary()
        );
        Ok(())
    }

    /// run one expired timer's handler
    pub fn dispatch(&mut self, kind: TimerKind, now: Instant) -> Result<Flow> {
        match kind {
            TimerKind::Retransmit => self.on_retransmission_timeout(now),
            TimerKind::Request => self.on_request_tick(now),
            TimerKind::Shutdown => self.on_shutdown_grace_expired(now),
        }
    }
}

impl<E, S, W> Client<E, S, W>
where
    E: Engine,
    S: DatagramSocket + mio::event::Source,
    W: Write,
{
    /// drive the connection until it finishes or a fatal error occurs
    pub fn run(&mut self) -> Result<Outcome> {
        let mut poll = Poll::new()?;
        let mut events = Events::with_capacity(16);

        poll.registry()
            .register(&mut self.socket, SOCKET_TOKEN, Interest::READABLE)?;

        self.start(Instant::now())?;

        loop {
            let timeout = self.timers.poll_timeout(Instant::now());
            if let Err(e) = poll.poll(&mut events, timeout) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(Error::Io(e));
            }

            let readable = events
                .iter()
                .any(|event| event.token() == SOCKET_TOKEN && event.is_readable());
            if readable {
                if let Flow::Done(outcome) = self.on_socket_readable(Instant::now())? {
                    return Ok(outcome);
                }
            }

            let now = Instant::now();
            for kind in self.timers.take_expired(now) {
                log::trace!("run: {:?} timer fired", kind);
                if let Flow::Done(outcome) = self.dispatch(kind, now)? {
                    return Ok(outcome);
                }
            }
        }
    }
}
