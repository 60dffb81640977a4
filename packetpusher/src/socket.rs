//! Non-blocking UDP socket wrapper with raw datagram statistics.
//!
//! Backed by [`mio::net::UdpSocket`] so an endpoint can wait on socket
//! readiness and its outbound-queue waker in a single poll.
use std::io::{self, Error as IoError, ErrorKind};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Instant;

use mio::event::Source;
use mio::net::UdpSocket as MioUdpSocket;
use mio::{Interest, Registry, Token};

use crate::stats::SocketStats;

/// Large enough to notice datagrams bigger than a packet.
const RECV_BUFFER_SIZE: usize = 2048;

/// Errors that can occur during socket operations.
#[derive(Debug)]
pub enum SocketError {
    Io(IoError),
    InvalidAddress,
    SocketClosed,
    WouldBlock,
}

impl std::fmt::Display for SocketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketError::Io(e) => write!(f, "IO error: {}", e),
            SocketError::InvalidAddress => write!(f, "Invalid address"),
            SocketError::SocketClosed => write!(f, "Socket closed"),
            SocketError::WouldBlock => write!(f, "Operation would block"),
        }
    }
}

impl std::error::Error for SocketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SocketError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for SocketError {
    fn from(err: IoError) -> Self {
        match err.kind() {
            ErrorKind::WouldBlock => SocketError::WouldBlock,
            ErrorKind::AddrNotAvailable => SocketError::InvalidAddress,
            _ => SocketError::Io(err),
        }
    }
}

/// Non-blocking UDP socket with per-socket statistics.
pub struct UdpSocket {
    inner: MioUdpSocket,
    peer: Option<SocketAddr>,
    recv_buffer: Vec<u8>,
    stats: SocketStats,
}

impl UdpSocket {
    /// Creates a socket bound to `addr`, accepting datagrams from any source.
    pub fn bind(addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = MioUdpSocket::bind(addr)?;
        Ok(Self::wrap(inner, None))
    }

    /// Creates a socket on an ephemeral local port, connected to `remote`.
    pub fn connect(remote: SocketAddr) -> Result<Self, SocketError> {
        if remote.port() == 0 || remote.ip().is_unspecified() {
            return Err(SocketError::InvalidAddress);
        }
        let local = match remote.ip() {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        };
        let inner = MioUdpSocket::bind(local)?;
        inner.connect(remote)?;
        Ok(Self::wrap(inner, Some(remote)))
    }

    fn wrap(inner: MioUdpSocket, peer: Option<SocketAddr>) -> Self {
        Self {
            inner,
            peer,
            recv_buffer: vec![0u8; RECV_BUFFER_SIZE],
            stats: SocketStats::default(),
        }
    }

    /// Returns the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.inner.local_addr()?)
    }

    pub fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    /// Sends a datagram to the connected peer.
    pub fn send(&mut self, data: &[u8]) -> Result<usize, SocketError> {
        if self.peer.is_none() {
            return Err(SocketError::InvalidAddress);
        }
        let sent = self.inner.send(data)?;
        self.record_send(sent);
        Ok(sent)
    }

    fn record_send(&mut self, sent: usize) {
        self.stats.bytes_sent += sent as u64;
        self.stats.datagrams_sent += 1;
        self.stats.last_send_time = Some(Instant::now());
    }

    /// Receives one datagram (returns data slice and sender address).
    ///
    /// An empty read on a connected socket is reported as `SocketClosed`.
    pub fn recv_from(&mut self) -> Result<(&[u8], SocketAddr), SocketError> {
        let (len, addr) = self.inner.recv_from(&mut self.recv_buffer)?;
        if len == 0 && self.peer.is_some() {
            return Err(SocketError::SocketClosed);
        }
        self.stats.bytes_received += len as u64;
        self.stats.datagrams_received += 1;
        self.stats.last_receive_time = Some(Instant::now());
        Ok((&self.recv_buffer[..len], addr))
    }

    /// Returns socket statistics
    pub fn stats(&self) -> &SocketStats {
        &self.stats
    }
}

impl Source for UdpSocket {
    fn register(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> io::Result<()> {
        self.inner.register(registry, token, interests)
    }

    fn reregister(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> io::Result<()> {
        self.inner.reregister(registry, token, interests)
    }

    fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        self.inner.deregister(registry)
    }
}
