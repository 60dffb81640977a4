//! # packetpusher
//!
//! Measures achievable UDP throughput between a client ("pusher") and a
//! server ("receiver") by flooding fixed-size datagrams and reporting bytes,
//! packets and elapsed time per worker.
//!
//! ## Pieces
//!
//! - [`Packet`]: the 1024-byte wire format (16-byte big-endian header plus a
//!   1008-byte data block)
//! - [`Endpoint`]: a UDP socket with a bounded outbound queue, producer
//!   backpressure, and a readiness-driven I/O loop
//! - [`run_worker`]: one test run against a remote receiver
//! - [`run_client_test`]: N workers released together through a [`StartGate`]
//! - [`Telemetry`]: per-run counters and time window, merged into a total
//!
//! ## Quick Start
//!
//! ```no_run
//! use packetpusher::prelude::*;
//!
//! // Receiver (runs forever)
//! let local = "127.0.0.1:9999".parse().unwrap();
//! std::thread::spawn(move || {
//!     run_server(local, EndpointConfig::default(), &LogSink::new("server"))
//! });
//!
//! // Pushers
//! let config = TestConfig::new(local).with_workers(4).with_packet_count(10_000);
//! let results = run_client_test(&config, &LogSink::new("client")).unwrap();
//! println!("{}", Report::new(&results).render());
//! ```

pub mod cli;
pub mod config;
pub mod endpoint;
pub mod gate;
pub mod orchestrator;
pub mod packet;
pub mod report;
pub mod socket;
pub mod stats;
pub mod telemetry;
pub mod trace;
pub mod util;
pub mod worker;


pub use config::{resolve_addr, ConfigError, EndpointConfig, TestConfig};
pub use endpoint::{Endpoint, EndpointError, EndpointHandle, Role};
pub use gate::{GateTicket, Readiness, StartGate};
pub use orchestrator::{run_client_test, run_server, worker_label, OrchestratorError};
pub use packet::{Command, FormatError, Packet, DATA_SIZE, HEADER_SIZE, PACKET_SIZE, PAYLOAD_SIZE};
pub use report::{Report, ReportRow};
pub use socket::{SocketError, UdpSocket};
pub use stats::{EndpointStats, SocketStats, StatsSnapshot};
pub use telemetry::Telemetry;
pub use trace::LogSink;
pub use worker::{run_worker, WorkerError, WorkerParams};

pub use std::net::SocketAddr;

/// Prelude: import everything commonly needed.
pub mod prelude {
    pub use crate::{
        run_client_test, run_server, run_worker, Command, Endpoint, EndpointConfig,
        EndpointHandle, LogSink, Packet, Report, ReportRow, SocketAddr, StartGate, Telemetry,
        TestConfig, WorkerParams,
    };
}
