//! Runs a receiver and a short multi-worker push over loopback, then prints
//! the results table.
//!
//! Run with: `cargo run --example loopback`

use packetpusher::prelude::*;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut server = Endpoint::bind(
        "127.0.0.1:0".parse()?,
        EndpointConfig::default(),
        LogSink::new("server"),
    )?;
    let remote = SocketAddr::new("127.0.0.1".parse()?, server.local_addr()?.port());
    let server_handle = server.handle();
    let receiver = std::thread::spawn(move || {
        let outcome = server.run();
        (outcome, server.telemetry())
    });

    let config = TestConfig::new(remote)
        .with_workers(2)
        .with_packet_count(50_000);
    let results = run_client_test(&config, &LogSink::new("client"))?;

    std::thread::sleep(Duration::from_millis(200));
    server_handle.stop();
    let (outcome, received) = receiver
        .join()
        .map_err(|_| anyhow::anyhow!("receiver thread panicked"))?;
    outcome?;

    println!("Sender:");
    print!("{}", Report::new(&results).render());
    println!(
        "Receiver saw {} of {} packets ({:.2}% loss)",
        received.packets_in,
        config.packet_count as u64 * config.workers as u64,
        100.0 - 100.0 * received.packets_in as f64
            / (config.packet_count as u64 * config.workers as u64) as f64
    );
    Ok(())
}
