use thiserror::Error;

/// Sketch error
///
/// Every variant is a rejected precondition: the sketch that reported it is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SketchError {
    #[error("precision {precision} is outside of supported range [4..16]")]
    InvalidConfig { precision: u8 },

    #[error("epsilon must be a number, got NaN")]
    InvalidEpsilon,

    #[error("cannot merge sketch with precision {rhs} into sketch with precision {lhs}")]
    ShapeMismatch { lhs: u8, rhs: u8 },

    #[error("cannot deserialize sketch from empty input")]
    EmptyInput,

    #[error("serialized precision {precision} is outside of valid range [4..16]")]
    OutOfRange { precision: u8 },

    #[error("serialized sketch has {actual} register bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

pub type Result<T, E = SketchError> = std::result::Result<T, E>;
