//! Fuzz target: `PacketDecoder`
//!
//! Feeds arbitrary broker bytes into the streaming MQTT decoder, split at
//! a fuzzer-chosen point, and checks that it never panics and never holds
//! more than it was given.
//!
//! cargo fuzz run fuzz_packet_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use radiocaching::mqtt::packet::{Packet, PacketDecoder};

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let (a, b) = rest.split_at(split);

    let mut decoder = PacketDecoder::new();
    for piece in [a, b] {
        decoder.push(piece);
        loop {
            match decoder.next_packet() {
                Ok(Some(Packet::Other { packet_type })) => assert!(packet_type < 16),
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }
        assert!(decoder.buffered() <= rest.len());
    }

    decoder.reset();
    assert_eq!(decoder.buffered(), 0);
});
