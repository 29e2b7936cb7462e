//! Transformer model: embedding, block stack, and output projection.

pub mod config;
pub(crate) mod layer;
pub mod weights;

use tracing::{debug, trace};

use crate::error::InferenceError;
use crate::ops;
use crate::tensor::Tensor;

use self::config::ModelConfig;
use self::weights::ModelWeights;

/// A GPT-2 style transformer holding its configuration and parameter set.
///
/// Construction validates every weight shape against the configuration;
/// a model that exists is ready to run.
pub struct Gpt2Model {
    config: ModelConfig,
    weights: ModelWeights,
}

impl Gpt2Model {
    /// Build a model from a configuration and a matching weight set.
    ///
    /// Rejects inconsistent configurations and mis-shaped weights before
    /// any computation can touch them.
    pub fn new(config: ModelConfig, weights: ModelWeights) -> Result<Self, InferenceError> {
        config.validate()?;
        weights.validate(&config)?;
        Ok(Self { config, weights })
    }

    /// The model's configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Run one forward pass over `tokens`, producing next-token logits.
    ///
    /// The hidden state starts as the element-wise sum of each token's
    /// embedding row and its position's embedding row, passes through every
    /// block in order, and the final position's row is projected to a
    /// `vocab_size`-length logits vector.
    ///
    /// # Errors
    /// - [`InferenceError::SequenceLength`] if `tokens` is empty or longer
    ///   than `max_seq_len`.
    /// - [`InferenceError::TokenOutOfRange`] if any token id is outside the
    ///   vocabulary.
    /// - [`InferenceError::Allocation`] if the vocabulary-sized logits
    ///   buffer cannot be allocated.
    pub fn forward(&self, tokens: &[u32]) -> Result<Vec<f32>, InferenceError> {
        let seq_len = tokens.len();
        if seq_len == 0 || seq_len > self.config.max_seq_len {
            return Err(InferenceError::SequenceLength {
                len: seq_len,
                max: self.config.max_seq_len,
            });
        }
        for &token in tokens {
            if token as usize >= self.config.vocab_size {
                return Err(InferenceError::TokenOutOfRange {
                    token,
                    vocab_size: self.config.vocab_size,
                });
            }
        }

        debug!(seq_len, "forward pass");

        let mut hidden = embed(tokens, &self.weights, &self.config);

        for (i, block) in self.weights.blocks.iter().enumerate() {
            trace!(block = i, "block forward");
            hidden = layer::block_forward(&hidden, block, &self.config);
        }

        let last = hidden.row(seq_len - 1);
        let mut logits = Tensor::try_zeros(&[self.config.vocab_size])?;
        ops::linear_into(
            last,
            self.weights.output_projection.weight(),
            self.weights.output_projection.bias(),
            logits.data_mut(),
        );

        Ok(logits.into_data())
    }
}

/// Initial hidden state: `h[i] = token_embedding[tokens[i]] + position_embedding[i]`.
fn embed(tokens: &[u32], weights: &ModelWeights, config: &ModelConfig) -> Tensor {
    let hidden_size = config.hidden_size;
    let wte = weights.token_embedding.data();
    let wpe = weights.position_embedding.data();

    let mut h = Tensor::zeros(&[tokens.len(), hidden_size]);
    let data = h.data_mut();
    for (pos, &token) in tokens.iter().enumerate() {
        let t = token as usize;
        let token_row = &wte[t * hidden_size..(t + 1) * hidden_size];
        let pos_row = &wpe[pos * hidden_size..(pos + 1) * hidden_size];
        let dst = &mut data[pos * hidden_size..(pos + 1) * hidden_size];
        for j in 0..hidden_size {
            dst[j] = token_row[j] + pos_row[j];
        }
    }
    h
}
