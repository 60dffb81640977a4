#![no_main]
use libfuzzer_sys::fuzz_target;
use packetpusher::{Packet, PACKET_SIZE};

fuzz_target!(|data: &[u8]| {
    // Never panics; anything that decodes must re-encode to the same bytes.
    if let Ok(packet) = Packet::decode(data) {
        assert_eq!(data.len(), PACKET_SIZE);
        assert_eq!(&packet.encode()[..], data);
    }
});
