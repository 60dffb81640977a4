//! One client-side test run.
//!
//! A worker connects its own endpoint, starts the endpoint's I/O loop on a
//! dedicated thread, waits at the start gate, then pushes a START packet,
//! data packets until its bound is hit, and an END packet. It returns a
//! finalized [`Telemetry`] holding its window and the endpoint's counters.
use std::io;
use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{EndpointConfig, TestConfig};
use crate::endpoint::{Endpoint, EndpointError, EndpointHandle};
use crate::gate::StartGate;
use crate::packet::{Command, Packet, PAYLOAD_SIZE};
use crate::telemetry::Telemetry;
use crate::trace::LogSink;

const PAYLOAD_BYTE: u8 = b'x';

#[derive(Debug)]
pub enum WorkerError {
    Endpoint(EndpointError),
    Spawn(io::Error),
    /// The gate was aborted because another worker failed to get ready.
    Aborted,
    IoThreadPanicked,
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Endpoint(e) => write!(f, "Endpoint error: {}", e),
            WorkerError::Spawn(e) => write!(f, "Failed to spawn I/O thread: {}", e),
            WorkerError::Aborted => write!(f, "Test aborted before start"),
            WorkerError::IoThreadPanicked => write!(f, "I/O thread panicked"),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Endpoint(e) => Some(e),
            WorkerError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EndpointError> for WorkerError {
    fn from(err: EndpointError) -> Self {
        WorkerError::Endpoint(err)
    }
}

/// What a single worker pushes, and where.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerParams {
    pub remote: SocketAddr,
    /// Data packets to send; 0 leaves the run bounded by `timeout` only.
    pub packet_count: u32,
    /// Run length; zero leaves the run bounded by `packet_count` only.
    pub timeout: Duration,
    pub endpoint: EndpointConfig,
}

impl WorkerParams {
    pub fn new(remote: SocketAddr, packet_count: u32, timeout: Duration) -> Self {
        Self {
            remote,
            packet_count,
            timeout,
            endpoint: EndpointConfig::default(),
        }
    }
}

impl From<&TestConfig> for WorkerParams {
    fn from(config: &TestConfig) -> Self {
        Self {
            remote: config.remote,
            packet_count: config.packet_count,
            timeout: config.timeout,
            endpoint: config.endpoint.clone(),
        }
    }
}

/// Stops the endpoint however the worker leaves, so its I/O thread never
/// outlives the run.
struct StopOnDrop(EndpointHandle);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Runs one worker to completion. Blocks at `gate` between connecting and
/// sending the first packet.
pub fn run_worker(
    params: &WorkerParams,
    gate: &StartGate,
    log: &LogSink,
) -> Result<Telemetry, WorkerError> {
    let ticket = gate.ticket();

    let mut endpoint = Endpoint::connect(params.remote, params.endpoint.clone(), log.child("io"))?;
    let handle = endpoint.handle();
    let guard = StopOnDrop(handle.clone());

    let io = thread::Builder::new()
        .name(format!("{}-io", log.label()))
        .spawn(move || {
            let result = endpoint.run();
            (result, endpoint.stats())
        })
        .map_err(WorkerError::Spawn)?;

    log.info(format_args!("started, waiting on go-ahead"));
    if !ticket.arrive_and_wait() {
        drop(guard);
        let _ = io.join();
        return Err(WorkerError::Aborted);
    }

    let outcome = push(&handle, params, log);
    drop(guard);

    let (loop_result, stats) = io.join().map_err(|_| WorkerError::IoThreadPanicked)?;
    loop_result?;
    let mut telemetry = outcome?;
    telemetry.record(&stats);

    log.debug(format_args!(
        "finished: {} packets out, {} in, {} send errors",
        stats.packets_sent, stats.packets_received, stats.send_errors
    ));
    Ok(telemetry)
}

fn push(
    handle: &EndpointHandle,
    params: &WorkerParams,
    log: &LogSink,
) -> Result<Telemetry, EndpointError> {
    let mut telemetry = Telemetry::new();
    telemetry.start();
    let started = Instant::now();
    let total = params.packet_count;

    handle.send(Packet::control(Command::Start, 0, total), true)?;

    let payload = [PAYLOAD_BYTE; PAYLOAD_SIZE];
    let mut sequence: u32 = 0;
    loop {
        if total > 0 && sequence >= total {
            break;
        }
        if !params.timeout.is_zero() && started.elapsed() > params.timeout {
            break;
        }
        handle.send(Packet::data(sequence, total, &payload), false)?;
        sequence = sequence.wrapping_add(1);
    }

    handle.send(Packet::control(Command::End, sequence, total), true)?;
    telemetry.end();

    log.info(format_args!(
        "pushed {} packets in {:.4} sec",
        sequence,
        telemetry.elapsed()
    ));
    Ok(telemetry)
}
