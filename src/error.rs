use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("token id {token} out of range for vocabulary of size {vocab_size}")]
    TokenOutOfRange { token: u32, vocab_size: usize },

    #[error("sequence length {len} outside valid range [1, {max}]")]
    SequenceLength { len: usize, max: usize },

    #[error("shape mismatch for {name}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("allocation of {bytes} bytes failed")]
    Allocation { bytes: usize },
}
