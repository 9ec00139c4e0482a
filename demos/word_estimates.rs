use hyperloglog_ldp::ldp::segment_keys;
use hyperloglog_ldp::{HyperLogLog, HyperLogLogLdp, SketchConfig};

fn main() -> hyperloglog_ldp::Result<()> {
    let mut sketch1 = HyperLogLog::new(12)?;
    for i in 0..10 {
        sketch1.insert(&format!("item{}", i));
    }
    println!("sketch1 estimate = {:.2}", sketch1.estimate());

    let mut sketch2 = HyperLogLog::new(12)?;
    for i in 10..15 {
        sketch2.insert(&format!("item{}", i));
    }
    println!("sketch2 estimate = {:.2}", sketch2.estimate());

    sketch1.merge(&sketch2)?;
    println!("merged estimate = {:.2}", sketch1.estimate());

    let cfg = SketchConfig::default();
    let mut ldp = HyperLogLogLdp::new(cfg)?;
    for word in ["apple", "banana", "grape", "orange", "banana"] {
        let mut segments = segment_keys(word, cfg.segment_count);
        segments.push("noise_A".to_string());
        segments.push("noise_B".to_string());
        ldp.insert_segments(&segments);
    }

    for query in ["applle", "banana", "orenge", "grape", "pineapple"] {
        let estimate = ldp.estimate_word_detailed(query);
        println!(
            "{} -> estimate = {:.2} ({} of {} required segments)",
            query, estimate.estimate, estimate.matched_segments, estimate.required_segments
        );
    }

    Ok(())
}
