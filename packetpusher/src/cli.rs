//! Command line front end.
//!
//! Parses arguments, installs the logger, and hands plain parameters to the
//! orchestrator. Holds no test logic of its own.
use std::time::Duration;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use log::LevelFilter;

use crate::config::{
    default_worker_count, resolve_addr, EndpointConfig, TestConfig, DEFAULT_HOST,
    DEFAULT_PACKET_COUNT, DEFAULT_PORT,
};
use crate::orchestrator::{run_client_test, run_server};
use crate::report::Report;
use crate::trace::LogSink;

/// packetpusher command line arguments
#[derive(Parser, Debug)]
#[command(name = "packetpusher")]
#[command(author, version, about = "Packet Pusher - Network speed tester")]
#[command(group(ArgGroup::new("mode").required(true).args(["server", "client"])))]
pub struct Cli {
    /// Run in server mode
    #[arg(short, long)]
    pub server: bool,

    /// Run in client mode
    #[arg(short, long)]
    pub client: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// The port to use for the data transfer
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// The name/ip to listen on (if server) or to send to (if client)
    #[arg(short, long, default_value = DEFAULT_HOST)]
    pub address: String,

    /// Number of packets to send before quitting
    #[arg(
        short = 'n',
        long,
        default_value_t = DEFAULT_PACKET_COUNT,
        help_heading = "Client options"
    )]
    pub packet_count: u32,

    /// Number of workers; 0 uses the number of cpus minus one
    #[arg(short, long, default_value_t = 0, help_heading = "Client options")]
    pub workers: usize,

    /// Stop the test after this many seconds (overrides the packet count)
    #[arg(short, long, default_value_t = 0, help_heading = "Client options")]
    pub timeout: u64,
}

impl Cli {
    /// Builds the client test parameters. A non-zero timeout makes the run
    /// purely time-bounded.
    pub fn test_config(&self) -> anyhow::Result<TestConfig> {
        let remote = resolve_addr(&self.address, self.port)?;
        let workers = if self.workers > 0 {
            self.workers
        } else {
            default_worker_count()
        };
        let packet_count = if self.timeout > 0 { 0 } else { self.packet_count };

        let config = TestConfig::new(remote)
            .with_workers(workers)
            .with_packet_count(packet_count)
            .with_timeout(Duration::from_secs(self.timeout));
        config.validate()?;
        Ok(config)
    }

    fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

/// Parses the process arguments and runs.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Runs with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let log = LogSink::new("main");
    if cli.verbose {
        log.info(format_args!("running in verbose mode"));
    }

    if cli.server {
        let local = resolve_addr(&cli.address, cli.port)?;
        run_server(local, EndpointConfig::default(), &LogSink::new("server"))
            .context("server stopped")?;
        return Ok(());
    }

    let config = cli.test_config()?;
    log.info(format_args!("running in client mode"));
    if cli.workers > 0 {
        log.info(format_args!("using custom number of workers ({})", config.workers));
    } else {
        log.info(format_args!("will utilize {} workers", config.workers));
    }
    if config.timeout.is_zero() {
        log.info(format_args!(
            "test will stop after sending {} packets",
            config.packet_count
        ));
    } else {
        log.info(format_args!(
            "test will run for {} seconds",
            config.timeout.as_secs()
        ));
    }

    let results = run_client_test(&config, &log).context("client test failed")?;
    let report = Report::new(&results);

    println!();
    println!("Results:");
    print!("{}", report.render());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_defaults() {
        let cli = Cli::try_parse_from(["packetpusher", "-c"]).unwrap();
        assert!(cli.client);
        assert!(!cli.server);
        assert_eq!(cli.port, 9999);
        assert_eq!(cli.address, "127.0.0.1");
        assert_eq!(cli.packet_count, 10_000_000);

        let config = cli.test_config().unwrap();
        assert_eq!(config.packet_count, 10_000_000);
        assert!(config.timeout.is_zero());
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_timeout_overrides_packet_count() {
        let cli = Cli::try_parse_from(["packetpusher", "-c", "-t", "5", "-n", "100", "-w", "3"])
            .unwrap();
        let config = cli.test_config().unwrap();
        assert_eq!(config.packet_count, 0);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.workers, 3);
    }

    #[test]
    fn test_mode_is_required_and_exclusive() {
        assert!(Cli::try_parse_from(["packetpusher"]).is_err());
        assert!(Cli::try_parse_from(["packetpusher", "-s", "-c"]).is_err());
        assert!(Cli::try_parse_from(["packetpusher", "--server", "-p", "7000"]).is_ok());
    }

    #[test]
    fn test_zero_port_rejected() {
        let cli = Cli::try_parse_from(["packetpusher", "-c", "-p", "0"]).unwrap();
        assert!(cli.test_config().is_err());
    }
}
