pub mod cli;
pub mod error;
pub mod model;
pub mod ops;
pub mod parallel;
pub mod tensor;

pub use error::InferenceError;
pub use model::config::ModelConfig;
pub use model::weights::{BlockWeights, LinearLayer, ModelWeights};
pub use model::Gpt2Model;
pub use tensor::Tensor;
