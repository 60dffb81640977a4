// stats.rs - Endpoint and socket counters
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Raw datagram totals kept by [`UdpSocket`](crate::UdpSocket), regardless of
/// whether the datagram later decoded.
#[derive(Debug, Default, Clone)]
pub struct SocketStats {
    pub datagrams_sent: u64,
    pub datagrams_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub last_receive_time: Option<Instant>,
    pub last_send_time: Option<Instant>,
}

/// Live counters of one endpoint.
///
/// Only the endpoint's I/O loop writes; the status reporter reads them while
/// the loop runs and the worker reads them after the loop has been joined.
/// With a single writer a relaxed load/store pair is enough, no locking.
#[derive(Debug, Default)]
pub struct EndpointStats {
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    packets_received: AtomicU64,
    bytes_received: AtomicU64,
    control_sent: AtomicU64,
    control_received: AtomicU64,
    send_errors: AtomicU64,
    recv_errors: AtomicU64,
    malformed: AtomicU64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.store(counter.load(Ordering::Relaxed) + by, Ordering::Relaxed);
}

impl EndpointStats {
    pub(crate) fn record_sent(&self, bytes: usize, control: bool) {
        if control {
            bump(&self.control_sent, 1);
        } else {
            bump(&self.packets_sent, 1);
            bump(&self.bytes_sent, bytes as u64);
        }
    }

    pub(crate) fn record_received(&self, bytes: usize, control: bool) {
        if control {
            bump(&self.control_received, 1);
        } else {
            bump(&self.packets_received, 1);
            bump(&self.bytes_received, bytes as u64);
        }
    }

    pub(crate) fn record_send_error(&self) {
        bump(&self.send_errors, 1);
    }

    pub(crate) fn record_recv_error(&self) {
        bump(&self.recv_errors, 1);
    }

    pub(crate) fn record_malformed(&self) {
        bump(&self.malformed, 1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            control_sent: self.control_sent.load(Ordering::Relaxed),
            control_received: self.control_received.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`EndpointStats`]. Data counters exclude START/END.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub bytes_received: u64,
    pub control_sent: u64,
    pub control_received: u64,
    pub send_errors: u64,
    pub recv_errors: u64,
    pub malformed: u64,
}
