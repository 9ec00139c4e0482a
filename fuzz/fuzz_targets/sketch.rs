#![no_main]

use hyperloglog_ldp::HyperLogLog;
use libfuzzer_sys::fuzz_target;
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let precision = 4 + data[0] % 13;
    let split_index = wyhash(data, 0) as usize % data.len();
    let (first_half, second_half) = data.split_at(split_index);

    let mut sketch1 = HyperLogLog::new(precision).unwrap();
    for chunk in first_half.chunks(4) {
        sketch1.insert(chunk);
        assert!(sketch1.estimate() > 0.0);
    }

    let mut sketch2 = HyperLogLog::new(precision).unwrap();
    for chunk in second_half.chunks(4) {
        sketch2.insert(chunk);
        assert!(sketch2.estimate() > 0.0);
    }

    let mut reversed = sketch2.clone();
    reversed.merge(&sketch1).unwrap();
    sketch1.merge(&sketch2).unwrap();
    assert_eq!(reversed, sketch1);

    let restored = HyperLogLog::from_bytes(&sketch1.to_bytes()).unwrap();
    assert_eq!(restored, sketch1);
});
