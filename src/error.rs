use thiserror::Error;

/// Precondition violations from the spectral pipeline.
///
/// Boundary conditions (windows straddling the end of the buffer, missing
/// samples) are not errors: they degrade to zero-valued samples.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpectrumError {
    #[error("transform zoom factor must be at least 1, got {0}")]
    InvalidZoom(usize),

    #[error("transform size must be a power of two >= 2, got {0}")]
    InvalidSize(usize),

    #[error("input window has {actual} samples, engine expects {expected}")]
    WindowLength { expected: usize, actual: usize },

    #[error("no audio buffer has been set")]
    BufferNotSet,
}
