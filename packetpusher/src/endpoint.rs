//! UDP endpoint: one socket, one bounded outbound queue, one I/O loop.
//!
//! The producer side talks to an [`EndpointHandle`]; the I/O loop side is
//! the [`Endpoint`] itself, normally driven by [`Endpoint::run`] on its own
//! thread. The only state the two sides share is the outbound queue and the
//! live counters:
//!
//! * [`EndpointHandle::send`] appends to the queue. When the queue grows past
//!   its capacity, or when the caller asks for a flush, the call blocks until
//!   the I/O loop has transmitted the batch containing that packet.
//! * Each [`Endpoint::tick`] waits (bounded by the poll interval) for socket
//!   readiness or for the queue's waker, transmits every queued packet,
//!   wakes blocked producers, then reads whatever datagrams are waiting.
//! * [`EndpointHandle::stop`] clears the running flag and wakes the loop, so
//!   the stop is observed on the next tick.
//!
//! Send and receive failures are counted and logged but never end the loop;
//! only an empty read on a connected socket does.
use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mio::{Events, Interest, Poll, Token, Waker};

use crate::config::{ConfigError, EndpointConfig};
use crate::packet::{Command, Packet, PACKET_SIZE};
use crate::socket::{SocketError, UdpSocket};
use crate::stats::{EndpointStats, SocketStats, StatsSnapshot};
use crate::telemetry::Telemetry;
use crate::trace::LogSink;
use crate::util::now_secs;

const SOCKET: Token = Token(0);
const WAKER: Token = Token(1);
const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
pub enum EndpointError {
    Config(ConfigError),
    Socket(SocketError),
    Io(io::Error),
    /// The I/O loop has exited; nothing more will be transmitted.
    Closed,
}

impl std::fmt::Display for EndpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointError::Config(e) => write!(f, "Configuration error: {}", e),
            EndpointError::Socket(e) => write!(f, "Socket error: {}", e),
            EndpointError::Io(e) => write!(f, "IO error: {}", e),
            EndpointError::Closed => write!(f, "Endpoint closed"),
        }
    }
}

impl std::error::Error for EndpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EndpointError::Config(e) => Some(e),
            EndpointError::Socket(e) => Some(e),
            EndpointError::Io(e) => Some(e),
            EndpointError::Closed => None,
        }
    }
}

impl From<ConfigError> for EndpointError {
    fn from(err: ConfigError) -> Self {
        EndpointError::Config(err)
    }
}

impl From<SocketError> for EndpointError {
    fn from(err: SocketError) -> Self {
        EndpointError::Socket(err)
    }
}

impl From<io::Error> for EndpointError {
    fn from(err: io::Error) -> Self {
        EndpointError::Io(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connected to a single remote address.
    Client,
    /// Bound locally, accepting datagrams from anyone.
    Server,
}

struct Outbound {
    queue: VecDeque<Packet>,
    /// Packets ever enqueued; a producer's ticket is the value after its push.
    enqueued: u64,
    /// Packets ever taken off the wire path, sent or failed.
    drained: u64,
    closed: bool,
}

struct Shared {
    outbound: Mutex<Outbound>,
    drained: Condvar,
    running: AtomicBool,
    stopped_at: AtomicU64,
    stats: EndpointStats,
    /// Status lines the server reporter has logged.
    status_reports: AtomicU64,
    waker: Waker,
    capacity: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Outbound> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn stop(&self) -> bool {
        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.stopped_at.store(now_secs().to_bits(), Ordering::Release);
        let _ = self.waker.wake();
        true
    }

    fn stopped_at(&self) -> Option<f64> {
        match self.stopped_at.load(Ordering::Acquire) {
            0 => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    fn close(&self) {
        self.lock().closed = true;
        self.drained.notify_all();
    }
}

/// Producer-side handle to an endpoint. Cheap to clone.
#[derive(Clone)]
pub struct EndpointHandle {
    shared: Arc<Shared>,
    log: LogSink,
}

impl EndpointHandle {
    /// Queues `packet` for transmission.
    ///
    /// Blocks when the queue holds more than the configured capacity, or when
    /// `flush` is set, until the I/O loop has transmitted this packet's batch.
    /// Fails with [`EndpointError::Closed`] once the I/O loop has exited.
    pub fn send(&self, packet: Packet, flush: bool) -> Result<(), EndpointError> {
        let mut out = self.shared.lock();
        if out.closed {
            return Err(EndpointError::Closed);
        }

        let was_empty = out.queue.is_empty();
        out.queue.push_back(packet);
        out.enqueued += 1;
        let ticket = out.enqueued;
        let over_capacity = out.queue.len() > self.shared.capacity;

        if was_empty {
            self.shared.waker.wake()?;
        }
        if !flush && !over_capacity {
            return Ok(());
        }

        if over_capacity {
            self.log.debug(format_args!("buffer full, pausing io"));
        }
        while out.drained < ticket && !out.closed {
            out = self
                .shared
                .drained
                .wait(out)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if out.drained < ticket {
            return Err(EndpointError::Closed);
        }
        Ok(())
    }

    /// Number of packets waiting for the I/O loop.
    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Asks the I/O loop to exit at its next tick.
    pub fn stop(&self) {
        if self.shared.stop() {
            self.log.debug(format_args!("stop requested"));
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

/// What the receive half of a tick found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inbound {
    /// The socket reported `WouldBlock`.
    Idle,
    /// The read budget ran out with datagrams possibly still waiting.
    Backlog,
    /// Empty read on a connected socket.
    Closed,
}

pub struct Endpoint {
    socket: UdpSocket,
    poll: Poll,
    events: Events,
    role: Role,
    config: EndpointConfig,
    shared: Arc<Shared>,
    /// Batch taken from the queue but not yet fully handed to the socket.
    pending: VecDeque<Packet>,
    pending_taken: u64,
    backlog: bool,
    telemetry: Telemetry,
    log: LogSink,
    status: Option<StatusReporter>,
}

/// Server-side periodic status logger. Dropping `stop` ends the thread.
struct StatusReporter {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

impl Endpoint {
    /// Opens a client endpoint connected to `remote`.
    pub fn connect(
        remote: SocketAddr,
        config: EndpointConfig,
        log: LogSink,
    ) -> Result<Self, EndpointError> {
        config.validate()?;
        let socket = UdpSocket::connect(remote)?;
        log.debug(format_args!(
            "connected {} -> {}",
            socket.local_addr()?,
            remote
        ));
        Self::new(socket, Role::Client, config, log)
    }

    /// Opens a server endpoint bound to `local` and starts its status
    /// reporter.
    pub fn bind(
        local: SocketAddr,
        config: EndpointConfig,
        log: LogSink,
    ) -> Result<Self, EndpointError> {
        config.validate()?;
        let socket = UdpSocket::bind(local)?;
        log.info(format_args!("Server started on {}", socket.local_addr()?));
        let mut endpoint = Self::new(socket, Role::Server, config, log)?;
        endpoint.status = Some(endpoint.spawn_status_reporter()?);
        Ok(endpoint)
    }

    fn new(
        mut socket: UdpSocket,
        role: Role,
        config: EndpointConfig,
        log: LogSink,
    ) -> Result<Self, EndpointError> {
        let poll = Poll::new()?;
        poll.registry()
            .register(&mut socket, SOCKET, Interest::READABLE | Interest::WRITABLE)?;
        let waker = Waker::new(poll.registry(), WAKER)?;

        let shared = Arc::new(Shared {
            outbound: Mutex::new(Outbound {
                queue: VecDeque::new(),
                enqueued: 0,
                drained: 0,
                closed: false,
            }),
            drained: Condvar::new(),
            running: AtomicBool::new(true),
            stopped_at: AtomicU64::new(0),
            stats: EndpointStats::default(),
            status_reports: AtomicU64::new(0),
            waker,
            capacity: config.queue_capacity,
        });

        let mut telemetry = Telemetry::new();
        telemetry.start();

        Ok(Self {
            socket,
            poll,
            events: Events::with_capacity(EVENT_CAPACITY),
            role,
            config,
            shared,
            pending: VecDeque::new(),
            pending_taken: 0,
            backlog: false,
            telemetry,
            log,
            status: None,
        })
    }

    fn spawn_status_reporter(&self) -> Result<StatusReporter, EndpointError> {
        let (tx, rx) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let interval = self.config.status_interval;
        let started = self.telemetry.start_time;
        let log = self.log.child("status");

        let thread = thread::Builder::new()
            .name("status".to_string())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let stats = shared.stats.snapshot();
                        log.info(format_args!(
                            "packets in: {} packets out: {} uptime: {} sec",
                            stats.packets_received + stats.control_received,
                            stats.packets_sent + stats.control_sent,
                            (now_secs() - started) as u64
                        ));
                        shared.status_reports.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => break,
                }
            })?;
        Ok(StatusReporter { stop: tx, thread })
    }

    /// Ends the status reporter, if any, and waits for its thread.
    fn stop_status_reporter(&mut self) {
        if let Some(reporter) = self.status.take() {
            drop(reporter.stop);
            if reporter.thread.join().is_err() {
                self.log.warn(format_args!("status reporter panicked"));
            }
        }
    }

    /// Number of status lines logged so far. Always 0 for a client.
    pub fn status_reports(&self) -> u64 {
        self.shared.status_reports.load(Ordering::Relaxed)
    }

    /// Whether the server status reporter thread is still attached.
    pub fn has_status_reporter(&self) -> bool {
        self.status.is_some()
    }

    pub fn handle(&self) -> EndpointHandle {
        EndpointHandle {
            shared: Arc::clone(&self.shared),
            log: self.log.clone(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn local_addr(&self) -> Result<SocketAddr, EndpointError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn socket_stats(&self) -> &SocketStats {
        self.socket.stats()
    }

    /// The endpoint's own window: opened at creation, closed by `stop`.
    pub fn telemetry(&self) -> Telemetry {
        let mut telemetry = self.telemetry;
        telemetry.record(&self.stats());
        telemetry
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Runs the I/O loop until stopped or the connected peer closes.
    pub fn run(&mut self) -> Result<(), EndpointError> {
        self.log.debug(format_args!("I/O loop started"));
        let result = loop {
            match self.tick() {
                Ok(true) => continue,
                Ok(false) => break Ok(()),
                Err(e) => {
                    self.log.error(format_args!("I/O loop failed: {}", e));
                    break Err(e);
                }
            }
        };
        self.finish();
        result
    }

    /// One loop iteration: wait for readiness, drain the outbound queue,
    /// read inbound datagrams. Returns whether the loop should keep going.
    pub fn tick(&mut self) -> Result<bool, EndpointError> {
        if !self.shared.is_running() {
            return Ok(false);
        }

        let timeout = if self.backlog {
            Duration::ZERO
        } else {
            self.config.poll_interval
        };
        if let Err(e) = self.poll.poll(&mut self.events, Some(timeout)) {
            if e.kind() == ErrorKind::Interrupted {
                return Ok(true);
            }
            return Err(e.into());
        }

        self.flush_outbound();

        match self.receive() {
            Inbound::Idle => self.backlog = false,
            Inbound::Backlog => self.backlog = true,
            Inbound::Closed => {
                self.log.info(format_args!("peer closed the connection"));
                self.shared.stop();
                return Ok(false);
            }
        }

        Ok(self.shared.is_running())
    }

    fn flush_outbound(&mut self) {
        if self.pending.is_empty() {
            let mut out = self.shared.lock();
            std::mem::swap(&mut out.queue, &mut self.pending);
        }
        if self.pending.is_empty() {
            return;
        }

        let mut buf = [0u8; PACKET_SIZE];
        while let Some(packet) = self.pending.front() {
            let control = packet.is_control();
            packet.encode_into(&mut buf);

            match self.socket.send(&buf) {
                Ok(sent) => self.shared.stats.record_sent(sent, control),
                // Resume with this packet once the socket turns writable.
                Err(SocketError::WouldBlock) => return,
                Err(e) => {
                    self.shared.stats.record_send_error();
                    if self.shared.stats.snapshot().send_errors == 1 {
                        self.log.warn(format_args!("send failed: {}", e));
                    } else {
                        self.log.debug(format_args!("send failed: {}", e));
                    }
                }
            }
            self.pending.pop_front();
            self.pending_taken += 1;
        }

        let mut out = self.shared.lock();
        out.drained += std::mem::take(&mut self.pending_taken);
        drop(out);
        self.shared.drained.notify_all();
    }

    fn receive(&mut self) -> Inbound {
        for _ in 0..self.config.recv_budget {
            let (decoded, len, from) = match self.socket.recv_from() {
                Ok((data, from)) => (Packet::decode(data), data.len(), from),
                Err(SocketError::WouldBlock) => return Inbound::Idle,
                Err(SocketError::SocketClosed) => return Inbound::Closed,
                Err(e) => {
                    self.shared.stats.record_recv_error();
                    self.log.debug(format_args!("receive failed: {}", e));
                    continue;
                }
            };

            match decoded {
                Ok(packet) => self.dispatch(&packet, len, from),
                Err(e) => {
                    self.shared.stats.record_malformed();
                    self.log
                        .debug(format_args!("dropping datagram from {}: {}", from, e));
                }
            }
        }
        Inbound::Backlog
    }

    fn dispatch(&mut self, packet: &Packet, len: usize, from: SocketAddr) {
        self.shared.stats.record_received(len, packet.is_control());
        match packet.command {
            Command::Start => {
                self.log.info(format_args!("new test session from: {}", from));
            }
            Command::End => {
                self.log.info(format_args!(
                    "ending test session from: {} ({} packets announced)",
                    from, packet.sequence
                ));
            }
            Command::Syn | Command::Ack => {}
        }
    }

    fn finish(&mut self) {
        self.telemetry.end_time = self
            .shared
            .stopped_at()
            .unwrap_or_else(now_secs)
            .max(self.telemetry.start_time);
        self.shared.close();
        self.stop_status_reporter();

        let stats = self.stats();
        self.log.info(format_args!(
            "network node stopped (out: {} in: {} send errors: {} receive errors: {} malformed: {})",
            stats.packets_sent,
            stats.packets_received,
            stats.send_errors,
            stats.recv_errors,
            stats.malformed
        ));
        if stats.malformed > 0 {
            self.log.warn(format_args!(
                "dropped {} malformed datagrams",
                stats.malformed
            ));
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        // Producers blocked on a flush must not outlive the loop.
        self.shared.running.store(false, Ordering::Release);
        self.shared.close();
        self.stop_status_reporter();
    }
}
