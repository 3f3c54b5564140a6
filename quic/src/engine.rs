//! QUIC protocol engine seam
//!
//! the client only drives the engine through [`Engine`]: packet in, packet
//! out, stream reads/writes, timers and close. [`QuicheEngine`] is the
//! production implementation over `quiche::Connection`.

use crate::config::Config;
use crate::error::{Error, Result};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// local connection id length
pub const LOCAL_CONN_ID_LEN: usize = 16;

/// transport counters reported when the connection ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// packets sent
    pub sent: usize,
    /// packets received
    pub recv: usize,
    /// packets declared lost
    pub lost: usize,
    pub sent_bytes: u64,
    pub lost_bytes: u64,
    /// smoothed RTT of the active path
    pub rtt: Option<Duration>,
}

impl fmt::Display for TransportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent={} lost={} rtt={}ns (packets sent={} recv={} lost={})",
            self.sent_bytes,
            self.lost_bytes,
            self.rtt.map_or(0, |rtt| rtt.as_nanos()),
            self.sent,
            self.recv,
            self.lost
        )
    }
}

/// operations the client needs from a QUIC connection.
///
/// `Ok(None)` is the engine's "done": nothing to send, nothing processed,
/// nothing readable.
pub trait Engine {
    /// readable stream ids, snapshotted when [`Engine::readable`] is called
    type Readable: Iterator<Item = u64>;

    /// write the next outbound packet into `out`
    fn send(&mut self, out: &mut [u8]) -> Result<Option<usize>>;

    /// process one inbound datagram
    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>>;

    fn is_established(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// time until [`Engine::on_timeout`] must be called, None if no timer is pending
    fn timeout(&self) -> Option<Duration>;

    fn on_timeout(&mut self);

    fn readable(&self) -> Self::Readable;

    /// read stream data, returns `(len, fin)`
    fn stream_recv(&mut self, stream_id: u64, buf: &mut [u8]) -> Result<Option<(usize, bool)>>;

    /// write stream data, returns bytes accepted (0 when out of capacity)
    fn stream_send(&mut self, stream_id: u64, data: &[u8], fin: bool) -> Result<usize>;

    /// request connection close; an error means the engine refused
    fn close(&mut self, app: bool, code: u64, reason: &[u8]) -> Result<()>;

    fn stats(&self) -> TransportStats;
}

/// random source connection id from the OS CSPRNG
pub fn generate_scid() -> Result<[u8; LOCAL_CONN_ID_LEN]> {
    let mut scid = [0u8; LOCAL_CONN_ID_LEN];
    SystemRandom::new()
        .fill(&mut scid)
        .map_err(|_| Error::Entropy)?;
    Ok(scid)
}

/// client connection backed by quiche
pub struct QuicheEngine {
    inner: quiche::Connection,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
}

impl QuicheEngine {
    /// create an outbound connection.
    ///
    /// `server_name` is used for SNI and certificate verification.
    pub fn connect(
        server_name: &str,
        scid: &[u8],
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        config: &Config,
    ) -> Result<Self> {
        let mut quic_config = Self::create_quic_config(config)?;
        let scid = quiche::ConnectionId::from_ref(scid);

        let inner = quiche::connect(
            Some(server_name),
            &scid,
            local_addr,
            peer_addr,
            &mut quic_config,
        )?;

        log::info!(
            "connect: {} ({}) from {} scid={:?}",
            server_name,
            peer_addr,
            local_addr,
            scid
        );

        Ok(Self {
            inner,
            local_addr,
            peer_addr,
        })
    }

    /// quiche config
    fn create_quic_config(config: &Config) -> Result<quiche::Config> {
        let mut quic_config = quiche::Config::new(quiche::PROTOCOL_VERSION)?;

        let protos: Vec<&[u8]> = config
            .application_protos
            .iter()
            .map(Vec::as_slice)
            .collect();
        quic_config.set_application_protos(&protos)?;

        quic_config.set_max_idle_timeout(config.idle_timeout_ms);

        quic_config.set_max_recv_udp_payload_size(config.max_datagram_size);
        quic_config.set_max_send_udp_payload_size(config.max_datagram_size);

        // flow control
        quic_config.set_initial_max_data(config.initial_max_data);
        quic_config.set_initial_max_stream_data_bidi_local(config.initial_max_stream_data_bidi_local);
        quic_config
            .set_initial_max_stream_data_bidi_remote(config.initial_max_stream_data_bidi_remote);
        quic_config.set_initial_max_stream_data_uni(config.initial_max_stream_data_uni);
        quic_config.set_initial_max_streams_bidi(config.initial_max_streams_bidi);
        quic_config.set_initial_max_streams_uni(config.initial_max_streams_uni);

        quic_config.set_disable_active_migration(config.disable_active_migration);
        quic_config.verify_peer(config.verify_peer);

        log::debug!(
            "create_quic_config: idle_timeout={}ms max_datagram={} verify_peer={}",
            config.idle_timeout_ms,
            config.max_datagram_size,
            config.verify_peer
        );
        Ok(quic_config)
    }

    /// get inner connection
    #[inline(always)]
    pub fn inner(&self) -> &quiche::Connection {
        &self.inner
    }
}

impl Engine for QuicheEngine {
    type Readable = quiche::StreamIter;

    #[inline]
    fn send(&mut self, out: &mut [u8]) -> Result<Option<usize>> {
        match self.inner.send(out) {
            Ok((len, _info)) => Ok(Some(len)),
            Err(quiche::Error::Done) => Ok(None),
            Err(e) => Err(Error::Quic(e)),
        }
    }

    #[inline]
    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let info = quiche::RecvInfo {
            from: self.peer_addr,
            to: self.local_addr,
        };
        match self.inner.recv(buf, info) {
            Ok(len) => Ok(Some(len)),
            Err(quiche::Error::Done) => Ok(None),
            Err(e) => Err(Error::Quic(e)),
        }
    }

    #[inline(always)]
    fn is_established(&self) -> bool {
        self.inner.is_established()
    }

    #[inline(always)]
    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    #[inline(always)]
    fn timeout(&self) -> Option<Duration> {
        self.inner.timeout()
    }

    #[inline]
    fn on_timeout(&mut self) {
        self.inner.on_timeout();
    }

    #[inline]
    fn readable(&self) -> Self::Readable {
        self.inner.readable()
    }

    #[inline]
    fn stream_recv(&mut self, stream_id: u64, buf: &mut [u8]) -> Result<Option<(usize, bool)>> {
        match self.inner.stream_recv(stream_id, buf) {
            Ok(read) => Ok(Some(read)),
            Err(quiche::Error::Done) => Ok(None),
            Err(e) => Err(Error::Quic(e)),
        }
    }

    #[inline]
    fn stream_send(&mut self, stream_id: u64, data: &[u8], fin: bool) -> Result<usize> {
        match self.inner.stream_send(stream_id, data, fin) {
            Ok(written) => Ok(written),
            Err(quiche::Error::Done) => Ok(0),
            Err(e) => Err(Error::Quic(e)),
        }
    }

    #[inline]
    fn close(&mut self, app: bool, code: u64, reason: &[u8]) -> Result<()> {
        self.inner.close(app, code, reason)?;
        Ok(())
    }

    fn stats(&self) -> TransportStats {
        let stats = self.inner.stats();
        TransportStats {
            sent: stats.sent,
            recv: stats.recv,
            lost: stats.lost,
            sent_bytes: stats.sent_bytes,
            lost_bytes: stats.lost_bytes,
            rtt: self.inner.path_stats().next().map(|path| path.rtt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs() -> (SocketAddr, SocketAddr) {
        (
            "127.0.0.1:40000".parse().unwrap(),
            "127.0.0.1:4433".parse().unwrap(),
        )
    }

    #[test]
    fn test_generate_scid() {
        let a = generate_scid().unwrap();
        let b = generate_scid().unwrap();
        assert_eq!(a.len(), LOCAL_CONN_ID_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn test_connect_emits_initial() {
        let (local, peer) = addrs();
        let scid = generate_scid().unwrap();
        let mut engine =
            QuicheEngine::connect("localhost", &scid, local, peer, &Config::default()).unwrap();

        assert!(!engine.is_established());
        assert!(!engine.is_closed());

        let mut out = [0u8; crate::config::MAX_DATAGRAM_SIZE];
        let len = engine.send(&mut out).unwrap().unwrap();

        // client Initial datagrams are padded to at least 1200 bytes
        assert!(len >= 1200);
        assert!(engine.timeout().is_some());
        assert_eq!(engine.readable().count(), 0);
    }

    #[test]
    fn test_stream_send_before_handshake_is_refused() {
        let (local, peer) = addrs();
        let scid = generate_scid().unwrap();
        let mut engine =
            QuicheEngine::connect("localhost", &scid, local, peer, &Config::default()).unwrap();

        // the peer has not advertised any bidirectional streams yet
        let err = engine.stream_send(4, b"GET /\r\n", true).unwrap_err();
        assert!(matches!(err, Error::Quic(quiche::Error::StreamLimit)));
    }

    #[test]
    fn test_stats_start_empty() {
        let (local, peer) = addrs();
        let scid = generate_scid().unwrap();
        let engine =
            QuicheEngine::connect("localhost", &scid, local, peer, &Config::default()).unwrap();

        let stats = engine.stats();
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.lost_bytes, 0);
    }
}
