#![no_main]

// Harness: parse_sid
// Strategy: any string that parses as a SID must print to a canonical form
// that parses to the same SID.

use libfuzzer_sys::fuzz_target;
use urlacl::Sid;

fuzz_target!(|input: &str| {
    if let Ok(sid) = input.parse::<Sid>() {
        let canonical = sid.to_string();
        assert_eq!(canonical.parse::<Sid>().ok(), Some(sid));
    }
});
