//! Builds and validates client test configurations without touching the
//! network.
//!
//! Run with: `cargo run --example custom_config`

use packetpusher::{resolve_addr, EndpointConfig, TestConfig};
use std::time::Duration;

fn main() {
    let remote = resolve_addr("localhost", 9999).expect("localhost should resolve");

    let config = TestConfig::new(remote)
        .with_workers(8)
        .with_packet_count(0)
        .with_timeout(Duration::from_secs(10))
        .with_endpoint_config(
            EndpointConfig::default()
                .with_queue_capacity(10_000)
                .with_poll_interval(Duration::from_millis(100))
                .with_recv_budget(256),
        );
    config.validate().expect("Config should be valid");

    println!("Test configuration:");
    println!("  Remote:         {}", config.remote);
    println!("  Workers:        {}", config.workers);
    println!("  Packet count:   {} (0 = time-bounded)", config.packet_count);
    println!("  Timeout:        {:?}", config.timeout);
    println!("  Queue capacity: {}", config.endpoint.queue_capacity);
    println!("  Poll interval:  {:?}", config.endpoint.poll_interval);

    let unbounded = TestConfig::new(remote).with_packet_count(0);
    match unbounded.validate() {
        Ok(()) => println!("unexpected: unbounded test accepted"),
        Err(e) => println!("Rejected as expected: {}", e),
    }
}
