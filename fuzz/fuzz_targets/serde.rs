#![no_main]

use hyperloglog_ldp::HyperLogLog;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(mut sketch) = serde_json::from_slice::<HyperLogLog>(data) {
        sketch.insert("item");
        assert!(sketch.max_register() > 0);
    }
});
