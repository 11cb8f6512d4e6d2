#![no_main]

use libfuzzer_sys::fuzz_target;
use spa::OscMessage;

fuzz_target!(|data: &[u8]| {
    if let Ok(msg) = OscMessage::parse(data) {
        assert!(msg.path().starts_with('/'));
        for index in 0..msg.len() {
            let _ = msg.arg(index);
        }
        let _ = msg.args().count();
    }
});
