//! connected non-blocking UDP socket

use crate::error::{Error, Result};
use mio::net::UdpSocket;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

/// datagram I/O on a socket already connected to the peer
pub trait DatagramSocket {
    /// send one datagram, returns bytes accepted
    fn send(&self, buf: &[u8]) -> io::Result<usize>;

    /// receive one datagram, `WouldBlock` when none is queued
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

impl DatagramSocket for UdpSocket {
    #[inline(always)]
    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, buf)
    }

    #[inline(always)]
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        UdpSocket::recv(self, buf)
    }
}

/// resolve `host:port` to the first UDP-reachable address
pub fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs.next().ok_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no address for {}:{}", host, port),
        ))
    })
}

/// bind an ephemeral port of the peer's family and connect to `peer`.
///
/// mio sockets are non-blocking from creation.
pub fn connect(peer: SocketAddr) -> Result<UdpSocket> {
    let bind_addr: SocketAddr = match peer {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    };

    let socket = UdpSocket::bind(bind_addr)?;
    socket.connect(peer)?;

    log::debug!(
        "socket: {} connected to {}",
        socket.local_addr()?,
        peer
    );
    Ok(socket)
}
