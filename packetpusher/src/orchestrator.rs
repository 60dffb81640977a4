//! Client-side fan-out of workers and the server entry point.
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::{ConfigError, EndpointConfig, TestConfig};
use crate::endpoint::{Endpoint, EndpointError};
use crate::gate::StartGate;
use crate::telemetry::Telemetry;
use crate::trace::LogSink;
use crate::worker::{run_worker, WorkerError, WorkerParams};

#[derive(Debug)]
pub enum OrchestratorError {
    Config(ConfigError),
    Endpoint(EndpointError),
    Spawn(io::Error),
    Worker { index: usize, source: WorkerError },
    WorkerPanicked(usize),
}

impl std::fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorError::Config(e) => write!(f, "Configuration error: {}", e),
            OrchestratorError::Endpoint(e) => write!(f, "Endpoint error: {}", e),
            OrchestratorError::Spawn(e) => write!(f, "Failed to spawn worker: {}", e),
            OrchestratorError::Worker { index, source } => {
                write!(f, "{} failed: {}", worker_label(*index), source)
            }
            OrchestratorError::WorkerPanicked(index) => {
                write!(f, "{} panicked", worker_label(*index))
            }
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OrchestratorError::Config(e) => Some(e),
            OrchestratorError::Endpoint(e) => Some(e),
            OrchestratorError::Spawn(e) => Some(e),
            OrchestratorError::Worker { source, .. } => Some(source),
            OrchestratorError::WorkerPanicked(_) => None,
        }
    }
}

impl From<ConfigError> for OrchestratorError {
    fn from(err: ConfigError) -> Self {
        OrchestratorError::Config(err)
    }
}

impl From<EndpointError> for OrchestratorError {
    fn from(err: EndpointError) -> Self {
        OrchestratorError::Endpoint(err)
    }
}

/// Label used for a worker's thread, log lines and report row.
pub fn worker_label(index: usize) -> String {
    format!("worker-{}", index)
}

/// Runs `config.workers` workers against `config.remote` and returns their
/// telemetry in worker-index order, unmerged.
///
/// Workers start pushing together: the start gate opens only after every
/// worker has connected its endpoint. If any worker fails before that point
/// the gate is aborted and the first failure is returned.
pub fn run_client_test(
    config: &TestConfig,
    log: &LogSink,
) -> Result<Vec<Telemetry>, OrchestratorError> {
    config.validate()?;

    let gate = Arc::new(StartGate::new(config.workers));
    let params = WorkerParams::from(config);
    let mut workers: Vec<JoinHandle<Result<Telemetry, WorkerError>>> =
        Vec::with_capacity(config.workers);

    for index in 0..config.workers {
        let label = worker_label(index);
        let gate_ref = Arc::clone(&gate);
        let params = params.clone();
        let worker_log = LogSink::new(label.clone());

        let spawned = thread::Builder::new()
            .name(label)
            .spawn(move || run_worker(&params, &gate_ref, &worker_log));
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                gate.abort();
                for worker in workers {
                    let _ = worker.join();
                }
                return Err(OrchestratorError::Spawn(e));
            }
        }
    }

    let readiness = gate.wait_ready();
    if readiness.all_arrived() {
        log.info(format_args!(
            "all {} workers ready, starting test",
            readiness.arrived
        ));
        gate.open();
        log.info(format_args!("test running..."));
    } else {
        log.warn(format_args!(
            "{} of {} workers failed to start, aborting",
            readiness.withdrawn,
            gate.parties()
        ));
        gate.abort();
    }

    let mut results = Vec::with_capacity(workers.len());
    let mut first_error = None;
    for (index, worker) in workers.into_iter().enumerate() {
        match worker.join() {
            Ok(Ok(telemetry)) => results.push(telemetry),
            // Aborted workers only echo the failure that caused the abort.
            Ok(Err(WorkerError::Aborted)) => {}
            Ok(Err(source)) => {
                log.error(format_args!("{} failed: {}", worker_label(index), source));
                first_error.get_or_insert(OrchestratorError::Worker { index, source });
            }
            Err(_) => {
                log.error(format_args!("{} panicked", worker_label(index)));
                first_error.get_or_insert(OrchestratorError::WorkerPanicked(index));
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }
    log.info(format_args!("test is finished, tabulating telemetry"));
    Ok(results)
}

/// Binds a server endpoint on `local` and serves forever.
pub fn run_server(
    local: SocketAddr,
    config: EndpointConfig,
    log: &LogSink,
) -> Result<(), OrchestratorError> {
    let mut endpoint = Endpoint::bind(local, config, log.clone())?;
    endpoint.run()?;
    Ok(())
}
