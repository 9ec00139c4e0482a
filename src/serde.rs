//! # Serde module for HyperLogLog
//!
//! This module provides serde-based (serialization and deserialization) features for
//! `HyperLogLog`. It uses `serde`'s custom serialization and deserialization mechanisms.
//!
//! The compact byte format (`HyperLogLog::to_bytes`) only carries precision and registers,
//! so during serialization it is wrapped into a tuple together with the options that
//! influence estimation: `(use_bias_correction, alpha_override, bytes)`.
//!
//! During deserialization the options are restored first and the bytes are then loaded
//! with `HyperLogLog::load_bytes`, so any malformed payload is rejected with the same
//! errors as the byte format itself.
//!
//! Refer to the serde documentation for more details on custom serialization and deserialization:
//! - [Serialization](https://serde.rs/impl-serialize.html)
//! - [Deserialization](https://serde.rs/impl-deserialize.html)
use serde::de::Error;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize};

use crate::config::SketchConfig;
use crate::hyperloglog::HyperLogLog;

impl Serialize for HyperLogLog {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let config = self.config();
        let mut tup = serializer.serialize_tuple(3)?;
        tup.serialize_element(&config.use_bias_correction)?;
        tup.serialize_element(&config.alpha_override)?;
        tup.serialize_element(&self.to_bytes())?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for HyperLogLog {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (use_bias_correction, alpha_override, bytes): (bool, Option<f64>, Vec<u8>) =
            Deserialize::deserialize(deserializer)?;

        let config = SketchConfig {
            use_bias_correction,
            alpha_override,
            ..Default::default()
        };
        let mut hll = HyperLogLog::from_valid_config(config);
        hll.load_bytes(&bytes).map_err(D::Error::custom)?;
        Ok(hll)
    }
}
