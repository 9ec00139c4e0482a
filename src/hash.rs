//! ## Hash function
//! 64-bit MurmurHash2 variant (`MurmurHash64A`) used to map items onto sketch registers.
//!
//! Input is consumed in 8-byte little-endian blocks with multiply/shift/xor mixing,
//! the remaining 0..7 tail bytes are folded in, and a final avalanche pass spreads
//! entropy evenly across high and low bits. Register index is taken from the high
//! bits and rank from the low bits, so both halves have to be well mixed.
//!
//! [Reference implementation](https://github.com/aappleby/smhasher/blob/master/src/MurmurHash2.cpp)

/// Seed used whenever no explicit seed is provided.
///
/// Sketches only merge meaningfully when built with the same seed, and serialized
/// register arrays carry no seed, so this value is effectively part of the wire format.
pub const DEFAULT_SEED: u64 = 42;

/// Multiplication constant of `MurmurHash64A`
const MULTIPLIER: u64 = 0xc6a4_a793_5bd1_e995;
/// Shift used by the mixing steps
const SHIFT: u32 = 47;

/// Hash `bytes` with the given `seed`.
#[inline]
pub fn murmur64a(bytes: &[u8], seed: u64) -> u64 {
    let mut h = seed ^ (bytes.len() as u64).wrapping_mul(MULTIPLIER);

    let mut blocks = bytes.chunks_exact(8);
    for block in blocks.by_ref() {
        let mut k = u64::from_le_bytes([
            block[0], block[1], block[2], block[3], block[4], block[5], block[6], block[7],
        ]);
        k = k.wrapping_mul(MULTIPLIER);
        k ^= k >> SHIFT;
        k = k.wrapping_mul(MULTIPLIER);

        h ^= k;
        h = h.wrapping_mul(MULTIPLIER);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        for (i, &byte) in tail.iter().enumerate() {
            h ^= u64::from(byte) << (8 * i);
        }
        h = h.wrapping_mul(MULTIPLIER);
    }

    h ^= h >> SHIFT;
    h = h.wrapping_mul(MULTIPLIER);
    h ^= h >> SHIFT;
    h
}

/// Hash `bytes` with [`DEFAULT_SEED`].
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    murmur64a(bytes, DEFAULT_SEED)
}
