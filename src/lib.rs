//! `hyperloglog-ldp` estimates the number of distinct items in a stream using a small, fixed amount of memory.
//!
//! [`HyperLogLog`] is a mergeable cardinality sketch with a compact byte serialization.
//! [`HyperLogLogLdp`] builds on it to recover per-word counts from segment reports privatized
//! with randomized response (local differential privacy).
//!
//! Neither type synchronizes internally: wrap an instance in a lock if it is shared between threads.
pub mod config;
pub mod error;
pub mod hash;
pub mod hyperloglog;
pub mod ldp;
#[cfg(feature = "with_serde")]
mod serde;

pub use config::SketchConfig;
pub use error::{Result, SketchError};
pub use hyperloglog::HyperLogLog;
pub use ldp::{HyperLogLogLdp, WordEstimate};
