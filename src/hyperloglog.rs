//! ## HyperLogLog sketch
//! Estimates the number of distinct items in a stream using `M = 2^P` byte registers,
//! where `P` is the configured precision in `[4..16]` range.
//!
//! Every inserted 64-bit hash is split into:
//! - top `P` bits      - register index
//! - low `64 - P` bits - suffix whose leading zero count plus one is the rank
//!
//! Each register holds the maximum rank observed for its index, so registers only
//! grow (until `reset`) and two sketches merge by taking register-wise maximum.
//!
//! [Original HyperLogLog paper](https://algo.inria.fr/flajolet/Publications/FlFuGaMe07.pdf)
//!
//! Expected error is `1.04 / sqrt(M)`:
//!     P = 4:  26.0%
//!     P = 10: 3.25%
//!     P = 12: 1.62%
//!     P = 16: 0.41%
//!
//! # Data storage format
//! Sketch is serialized into `1 + M` bytes:
//! - data[0]       - precision `P`
//! - data[1..]     - register ranks in index order, one byte per register
//!
//! Register ranks never exceed `65 - P`, which is why a single byte per register suffices.

use std::fmt::{Debug, Formatter};
use std::mem::size_of;

use tracing::debug;

use crate::config::SketchConfig;
use crate::error::{Result, SketchError};
use crate::hash::hash_bytes;

/// `2^32`, threshold base of the large range correction
const TWO_POW_32: f64 = 4_294_967_296.0;

/// HyperLogLog sketch with one byte per register
#[derive(Clone)]
pub struct HyperLogLog {
    /// Configuration the sketch was created with (precision follows the last `load_bytes`)
    config: SketchConfig,
    /// Bias correction constant derived from the number of registers or overridden
    alpha: f64,
    /// Register ranks
    registers: Vec<u8>,
}

impl HyperLogLog {
    /// Create new sketch with given `precision` and default options
    pub fn new(precision: u8) -> Result<Self> {
        Self::with_config(SketchConfig::default().with_precision(precision))
    }

    /// Create new sketch from `config`, rejecting unsupported precision
    pub fn with_config(config: SketchConfig) -> Result<Self> {
        if !SketchConfig::is_valid_precision(config.precision) {
            debug!(precision = config.precision, "rejected sketch precision");
            return Err(SketchError::InvalidConfig {
                precision: config.precision,
            });
        }
        Ok(Self::from_valid_config(config))
    }

    /// Create new sketch from serialized bytes using default options
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut hll = Self::default();
        hll.load_bytes(bytes)?;
        Ok(hll)
    }

    /// Create new sketch assuming `config.precision` was already validated
    #[inline]
    pub(crate) fn from_valid_config(config: SketchConfig) -> Self {
        let m = 1usize << config.precision;
        Self {
            config,
            alpha: alpha(m, &config),
            registers: vec![0; m],
        }
    }

    /// Insert an item hashed with the default hash function and seed
    #[inline]
    pub fn insert<T: AsRef<[u8]> + ?Sized>(&mut self, item: &T) {
        self.insert_hash(hash_bytes(item.as_ref()));
    }

    /// Insert 64-bit hash into sketch
    #[inline]
    pub fn insert_hash(&mut self, hash: u64) {
        let (idx, rank) = decode_hash(hash, self.config.precision);
        let register = &mut self.registers[idx];
        *register = (*register).max(rank);
    }

    /// Return cardinality estimate
    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let sum: f64 = self
            .registers
            .iter()
            .map(|&rank| (-f64::from(rank)).exp2())
            .sum();
        let estimate = self.alpha * m * m / sum;

        if !self.config.use_bias_correction {
            return estimate;
        }

        if estimate <= 2.5 * m {
            // small range correction: linear counting while empty registers remain
            let zeros = self.count_zero_registers();
            if zeros > 0 {
                return m * (m / zeros as f64).ln();
            }
        } else if estimate > TWO_POW_32 / 30.0 && estimate < TWO_POW_32 {
            // large range correction for hash collisions in 32-bit space
            return -TWO_POW_32 * (1.0 - estimate / TWO_POW_32).ln();
        }

        estimate
    }

    /// Merge `rhs` into `self` by taking register-wise maximum.
    ///
    /// Both sketches must have the same precision, otherwise `self` is left unchanged.
    pub fn merge(&mut self, rhs: &HyperLogLog) -> Result<()> {
        if self.config.precision != rhs.config.precision
            || self.registers.len() != rhs.registers.len()
        {
            debug!(
                lhs = self.config.precision,
                rhs = rhs.config.precision,
                "rejected merge of mismatched sketches"
            );
            return Err(SketchError::ShapeMismatch {
                lhs: self.config.precision,
                rhs: rhs.config.precision,
            });
        }

        self.registers
            .iter_mut()
            .zip(rhs.registers.iter())
            .for_each(|(lhs, &rhs)| *lhs = (*lhs).max(rhs));
        Ok(())
    }

    /// Set every register back to zero
    #[inline]
    pub fn reset(&mut self) {
        self.registers.fill(0);
    }

    /// Serialize sketch into precision byte followed by one byte per register
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + self.registers.len());
        data.push(self.config.precision);
        data.extend_from_slice(&self.registers);
        data
    }

    /// Replace sketch state with serialized `bytes`.
    ///
    /// Precision and registers are taken from `bytes`, alpha is recomputed for the new
    /// register count unless overridden. On error the sketch is left unchanged.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let (&precision, registers) = bytes.split_first().ok_or(SketchError::EmptyInput)?;

        if !SketchConfig::is_valid_precision(precision) {
            debug!(precision, "rejected serialized sketch precision");
            return Err(SketchError::OutOfRange { precision });
        }

        let m = 1usize << precision;
        if registers.len() != m {
            debug!(
                precision,
                expected = m,
                actual = registers.len(),
                "rejected serialized sketch length"
            );
            return Err(SketchError::SizeMismatch {
                expected: m,
                actual: registers.len(),
            });
        }

        self.config.precision = precision;
        self.registers.clear();
        self.registers.extend_from_slice(registers);
        self.alpha = alpha(m, &self.config);
        Ok(())
    }

    /// Return number of registers set to zero
    #[inline]
    pub fn count_zero_registers(&self) -> usize {
        self.registers.iter().filter(|&&rank| rank == 0).count()
    }

    /// Return number of registers set to non-zero rank
    #[inline]
    pub fn count_nonzero_registers(&self) -> usize {
        self.registers.len() - self.count_zero_registers()
    }

    /// Return maximum register rank
    #[inline]
    pub fn max_register(&self) -> u8 {
        self.registers.iter().copied().max().unwrap_or(0)
    }

    /// Rough signal of how much a single new observation could move the estimate:
    /// `1 / nonzero registers`, or `1.0` for an empty sketch.
    ///
    /// This is a heuristic, not a differential privacy sensitivity bound.
    pub fn local_sensitivity(&self) -> f64 {
        match self.count_nonzero_registers() {
            0 => 1.0,
            nonzero => 1.0 / nonzero as f64,
        }
    }

    /// Return approximate memory size of the sketch in bytes
    #[inline]
    pub fn size_of(&self) -> usize {
        size_of::<Self>() + self.registers.capacity()
    }

    /// Whether no register has been set since creation or last reset
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|&rank| rank == 0)
    }

    #[inline]
    pub fn precision(&self) -> u8 {
        self.config.precision
    }

    #[inline]
    pub fn num_registers(&self) -> usize {
        self.registers.len()
    }

    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    #[inline]
    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    #[inline]
    pub fn config(&self) -> &SketchConfig {
        &self.config
    }
}

impl Default for HyperLogLog {
    fn default() -> Self {
        Self::from_valid_config(SketchConfig::default())
    }
}

impl PartialEq for HyperLogLog {
    /// Compare sketch shapes and registers
    fn eq(&self, rhs: &Self) -> bool {
        self.config.precision == rhs.config.precision && self.registers == rhs.registers
    }
}

impl Debug for HyperLogLog {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ precision: {}, estimate: {:.2}, size: {} }}",
            self.config.precision,
            self.estimate(),
            self.size_of()
        )
    }
}

/// Return register index and rank of `hash` for given `precision`
#[inline]
fn decode_hash(hash: u64, precision: u8) -> (usize, u8) {
    let idx = (hash >> (64 - precision)) as usize;
    // Suffix moved into the high bits. The sentinel bit just below it caps the rank
    // at `65 - P` for an all-zero suffix without branching.
    let suffix = (hash << precision) | (1u64 << (precision - 1));
    let rank = suffix.leading_zeros() as u8 + 1;
    (idx, rank)
}

/// Parameter for bias correction
#[inline]
fn alpha(m: usize, config: &SketchConfig) -> f64 {
    if let Some(alpha) = config.effective_alpha_override() {
        return alpha;
    }
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / (m as f64)),
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use test_case::test_case;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "values differ: {} vs {} (tolerance {})",
            actual,
            expected,
            tolerance
        );
    }

    #[test_case(0 => Err(SketchError::InvalidConfig { precision: 0 }))]
    #[test_case(3 => Err(SketchError::InvalidConfig { precision: 3 }))]
    #[test_case(4 => Ok(16))]
    #[test_case(12 => Ok(4096))]
    #[test_case(16 => Ok(65536))]
    #[test_case(17 => Err(SketchError::InvalidConfig { precision: 17 }))]
    fn test_new(precision: u8) -> Result<usize> {
        HyperLogLog::new(precision).map(|hll| hll.num_registers())
    }

    #[test_case(4 => 0.673)]
    #[test_case(5 => 0.697)]
    #[test_case(6 => 0.709)]
    #[test_case(12 => 0.7213 / (1.0 + 1.079 / 4096.0))]
    fn test_alpha(precision: u8) -> f64 {
        HyperLogLog::new(precision).unwrap().alpha()
    }

    #[test]
    fn test_alpha_override() {
        let cfg = SketchConfig::default().with_precision(10).with_alpha_override(0.5);
        let hll = HyperLogLog::with_config(cfg).unwrap();
        assert_eq!(hll.alpha(), 0.5);

        let cfg = SketchConfig::default().with_precision(10).with_alpha_override(-1.0);
        let hll = HyperLogLog::with_config(cfg).unwrap();
        assert_eq!(hll.alpha(), 0.7213 / (1.0 + 1.079 / 1024.0));
    }

    #[test_case(0xF000_0000_0000_0001 => (15, 60); "lowest suffix bit")]
    #[test_case(0xF000_0000_0000_0000 => (15, 61); "zero suffix saturates")]
    #[test_case(0x1800_0000_0000_0000 => (1, 1); "highest suffix bit")]
    #[test_case(0x0200_0000_0000_0000 => (0, 3); "two leading zeros")]
    #[test_case(u64::MAX => (15, 1); "all bits set")]
    fn test_decode_hash_p4(hash: u64) -> (usize, u8) {
        decode_hash(hash, 4)
    }

    #[test_case(4 => 61)]
    #[test_case(12 => 53)]
    #[test_case(16 => 49)]
    fn test_decode_hash_max_rank(precision: u8) -> u8 {
        decode_hash(0, precision).1
    }

    #[test]
    fn test_insert_hash_keeps_maximum() {
        let mut hll = HyperLogLog::new(4).unwrap();
        hll.insert_hash(0x0200_0000_0000_0000);
        assert_eq!(hll.registers()[0], 3);

        // lower rank must not overwrite
        hll.insert_hash(0x0800_0000_0000_0000);
        assert_eq!(hll.registers()[0], 3);

        hll.insert_hash(0x0000_0000_0000_0001);
        assert_eq!(hll.registers()[0], 60);
        assert_eq!(hll.count_nonzero_registers(), 1);
    }

    #[test]
    fn test_insert() {
        let mut hll = HyperLogLog::new(4).unwrap();

        // Ensure initial estimate is 0.
        assert_eq!(hll.estimate(), 0.0);
        assert!(hll.is_empty());

        hll.insert("hello");
        let mut expected = vec![0u8; 16];
        expected[13] = 2;
        assert_eq!(hll.registers(), expected.as_slice());
        assert_close(hll.estimate(), 16.0 * (16.0f64 / 15.0).ln(), 1e-12);

        // Re-insert the same item, registers should remain the same.
        hll.insert("hello");
        assert_eq!(hll.registers(), expected.as_slice());
    }

    #[test]
    fn test_insert_is_deterministic() {
        let mut once = HyperLogLog::new(10).unwrap();
        once.insert("same item");

        let mut many = HyperLogLog::new(10).unwrap();
        for _ in 0..100 {
            many.insert("same item");
        }
        assert_eq!(once, many);

        many.reset();
        many.insert("same item");
        assert_eq!(once, many);
    }

    #[test]
    fn test_empty_estimate_without_bias_correction() {
        let cfg = SketchConfig::default().with_bias_correction(false);
        let hll = HyperLogLog::with_config(cfg).unwrap();
        // raw estimate of empty sketch is alpha * m
        assert_close(hll.estimate(), 0.673 * 16.0, 1e-12);
    }

    #[test]
    fn test_large_range_correction() {
        let mut bytes = vec![24u8; 17];
        bytes[0] = 4;
        let corrected = HyperLogLog::from_bytes(&bytes).unwrap();

        let cfg = SketchConfig::default().with_bias_correction(false);
        let mut raw = HyperLogLog::with_config(cfg).unwrap();
        raw.load_bytes(&bytes).unwrap();

        assert_close(raw.estimate(), 180_657_061.888, 1e-3);
        assert_close(corrected.estimate(), 184_566_526.762_236_3, 1e-3);
    }

    #[test]
    fn test_estimate_beyond_hash_space_stays_finite() {
        let mut bytes = vec![61u8; 17];
        bytes[0] = 4;
        let hll = HyperLogLog::from_bytes(&bytes).unwrap();
        assert!(hll.estimate().is_finite());
        assert!(hll.estimate() > TWO_POW_32);
    }

    #[test]
    fn test_estimate_is_monotonic_in_linear_counting_range() {
        let mut hll = HyperLogLog::new(12).unwrap();
        let mut previous = hll.estimate();
        for i in 0..5000 {
            hll.insert(&format!("item-{}", i));
            let estimate = hll.estimate();
            assert!(estimate >= previous, "estimate dropped at {}", i);
            previous = estimate;
        }
    }

    #[test]
    fn test_merge() {
        let mut lhs = HyperLogLog::new(8).unwrap();
        let mut rhs = HyperLogLog::new(8).unwrap();
        let mut union = HyperLogLog::new(8).unwrap();
        for i in 0..300 {
            let item = format!("item{}", i);
            if i % 3 == 0 {
                lhs.insert(&item);
            } else {
                rhs.insert(&item);
            }
            union.insert(&item);
        }

        let mut reversed = rhs.clone();
        lhs.merge(&rhs).unwrap();
        reversed.merge(&lhs).unwrap();

        assert_eq!(lhs, union);
        assert_eq!(reversed, union);
        assert_eq!(lhs.estimate(), union.estimate());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut hll = HyperLogLog::new(6).unwrap();
        for i in 0..50 {
            hll.insert(&format!("item{}", i));
        }
        let snapshot = hll.clone();
        hll.merge(&snapshot).unwrap();
        assert_eq!(hll, snapshot);
        assert_eq!(hll.registers(), snapshot.registers());
    }

    #[test]
    fn test_merge_shape_mismatch() {
        let mut lhs = HyperLogLog::new(4).unwrap();
        lhs.insert("a");
        let snapshot = lhs.clone();

        let mut rhs = HyperLogLog::new(5).unwrap();
        rhs.insert("b");

        assert_eq!(
            lhs.merge(&rhs),
            Err(SketchError::ShapeMismatch { lhs: 4, rhs: 5 })
        );
        assert_eq!(lhs, snapshot);
    }

    #[test]
    fn test_reset() {
        let cfg = SketchConfig::default().with_precision(6).with_alpha_override(0.9);
        let mut hll = HyperLogLog::with_config(cfg).unwrap();
        for i in 0..100 {
            hll.insert(&format!("item{}", i));
        }
        assert!(!hll.is_empty());

        hll.reset();
        assert!(hll.is_empty());
        assert_eq!(hll.num_registers(), 64);
        assert_eq!(hll.alpha(), 0.9);
        assert_eq!(hll.estimate(), 0.0);
    }

    #[test]
    fn test_to_bytes_layout() {
        let mut hll = HyperLogLog::new(4).unwrap();
        hll.insert_hash(0xF000_0000_0000_0001);
        hll.insert_hash(0x1800_0000_0000_0000);

        let bytes = hll.to_bytes();
        assert_eq!(bytes.len(), 17);
        assert_eq!(bytes[0], 4);
        assert_eq!(bytes[2], 1);
        assert_eq!(bytes[16], 60);
        assert_eq!(&bytes[1..], hll.registers());
    }

    #[test_case(4, 0)]
    #[test_case(4, 50)]
    #[test_case(10, 1000)]
    #[test_case(16, 10_000)]
    fn test_bytes_round_trip(precision: u8, n: usize) {
        let mut hll = HyperLogLog::new(precision).unwrap();
        for i in 0..n {
            hll.insert(&format!("item{}", i));
        }

        let restored = HyperLogLog::from_bytes(&hll.to_bytes()).unwrap();
        assert_eq!(restored, hll);
        assert_eq!(restored.alpha(), hll.alpha());
        assert_eq!(restored.estimate().to_bits(), hll.estimate().to_bits());
    }

    #[test_case(&[] => SketchError::EmptyInput; "empty input")]
    #[test_case(&[3; 9] => SketchError::OutOfRange { precision: 3 }; "precision too small")]
    #[test_case(&[17] => SketchError::OutOfRange { precision: 17 }; "precision too large")]
    #[test_case(&[4; 16] => SketchError::SizeMismatch { expected: 16, actual: 15 }; "too short")]
    #[test_case(&[4; 18] => SketchError::SizeMismatch { expected: 16, actual: 17 }; "too long")]
    #[test_case(&[5; 17] => SketchError::SizeMismatch { expected: 32, actual: 16 }; "length of other precision")]
    fn test_load_bytes_errors(bytes: &[u8]) -> SketchError {
        let mut hll = HyperLogLog::new(4).unwrap();
        hll.insert("existing");
        let snapshot = hll.clone();

        let err = hll.load_bytes(bytes).unwrap_err();
        assert_eq!(hll, snapshot);
        err
    }

    #[test]
    fn test_load_bytes_replaces_state() {
        let mut source = HyperLogLog::new(6).unwrap();
        for i in 0..20 {
            source.insert(&format!("item{}", i));
        }

        let cfg = SketchConfig::default().with_precision(4);
        let mut target = HyperLogLog::with_config(cfg).unwrap();
        target.insert("unrelated");
        target.load_bytes(&source.to_bytes()).unwrap();

        assert_eq!(target.precision(), 6);
        assert_eq!(target.num_registers(), 64);
        assert_eq!(target.alpha(), 0.709);
        assert_eq!(target, source);
    }

    #[test]
    fn test_load_bytes_keeps_alpha_override() {
        let cfg = SketchConfig::default().with_alpha_override(0.5);
        let mut hll = HyperLogLog::with_config(cfg).unwrap();

        let mut bytes = vec![0u8; 1 + 4096];
        bytes[0] = 12;
        hll.load_bytes(&bytes).unwrap();

        assert_eq!(hll.num_registers(), 4096);
        assert_eq!(hll.alpha(), 0.5);
    }

    #[test]
    fn test_diagnostics() {
        let mut hll = HyperLogLog::new(4).unwrap();
        assert_eq!(hll.count_zero_registers(), 16);
        assert_eq!(hll.count_nonzero_registers(), 0);
        assert_eq!(hll.max_register(), 0);
        assert_eq!(hll.local_sensitivity(), 1.0);

        hll.insert_hash(0xF000_0000_0000_0001);
        hll.insert_hash(0x1800_0000_0000_0000);
        hll.insert_hash(0x0400_0000_0000_0000);
        hll.insert_hash(0x2800_0000_0000_0000);

        assert_eq!(hll.count_zero_registers(), 12);
        assert_eq!(hll.count_nonzero_registers(), 4);
        assert_eq!(hll.max_register(), 60);
        assert_eq!(hll.local_sensitivity(), 0.25);
    }

    #[test]
    fn test_size_of() {
        let small = HyperLogLog::new(4).unwrap();
        let large = HyperLogLog::new(12).unwrap();
        assert!(small.size_of() >= 16);
        assert_eq!(large.size_of() - small.size_of(), 4096 - 16);
    }

    #[test]
    fn test_debug() {
        let mut hll = HyperLogLog::new(4).unwrap();
        hll.insert("hello");
        assert_eq!(
            format!("{:?}", hll),
            format!("{{ precision: 4, estimate: 1.03, size: {} }}", hll.size_of())
        );
    }
}
