//! packetpusher - UDP throughput tester.

fn main() -> anyhow::Result<()> {
    packetpusher::cli::run()
}
