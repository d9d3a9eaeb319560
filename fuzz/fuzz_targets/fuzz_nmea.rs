//! Fuzz target: NMEA sentence parser
//!
//! Any line either fails to parse or yields a fix inside WGS-84 ranges.
//!
//! cargo fuzz run fuzz_nmea

#![no_main]

use libfuzzer_sys::fuzz_target;
use radiocaching::adapters::nmea::parse_sentence;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(Some(fix)) = parse_sentence(line) {
        assert!(fix.latitude.abs() <= 90.0, "latitude {}", fix.latitude);
        assert!(fix.longitude.abs() <= 180.0, "longitude {}", fix.longitude);
    }
});
