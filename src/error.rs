use thiserror::Error;

use crate::types::DepthRange;

pub type SensorResult<T> = std::result::Result<T, SensorError>;

/// Failures reported by a sensor at the device boundary.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("depth range {0:?} is not supported in the current sensor state")]
    UnsupportedRange(DepthRange),

    #[error("stream is not enabled: {0}")]
    StreamNotEnabled(&'static str),

    #[error("invalid frame: expected {expected} pixels, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },
}
