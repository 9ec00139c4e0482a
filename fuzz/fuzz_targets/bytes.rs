#![no_main]

use hyperloglog_ldp::HyperLogLog;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut sketch = HyperLogLog::default();
    sketch.insert("existing");
    let snapshot = sketch.clone();

    match sketch.load_bytes(data) {
        Ok(()) => {
            assert_eq!(sketch.to_bytes(), data);
            sketch.insert("item");
            let _ = sketch.estimate();
        }
        Err(_) => assert_eq!(sketch, snapshot),
    }
});
