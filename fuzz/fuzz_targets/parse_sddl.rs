#![no_main]

// Harness: parse_sddl
// Strategy: feed arbitrary text to the SDDL parser. Parsing must never panic,
// and any DACL that converts to a rule set must render to an SDDL string that
// parses back to the same rule set.

use libfuzzer_sys::fuzz_target;
use urlacl::sddl;
use urlacl::RuleSet;

fuzz_target!(|input: &str| {
    let Ok(descriptor) = sddl::parse(input) else {
        return;
    };
    let _ = descriptor.to_access_sddl();
    if let Ok(rules) = RuleSet::from_descriptor(&descriptor) {
        let again = RuleSet::from_sddl(&rules.to_sddl()).expect("rendered SDDL must parse");
        assert_eq!(again, rules);
    }
});
