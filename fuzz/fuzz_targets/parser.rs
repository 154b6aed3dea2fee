#![no_main]

use libfuzzer_sys::fuzz_target;

// Any text either reads or fails with an error, and whatever reads prints
// back into text that reads to the same thing
fuzz_target!(|input: &str| {
    if let Ok(data) = skeme::parse_all(input) {
        for datum in data {
            let printed = datum.to_string();
            let reread = skeme::parse(&printed).expect("printed data should read back");
            assert_eq!(printed, reread.to_string());
        }
    }
});
