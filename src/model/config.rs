//! Model configuration.

use serde::{Deserialize, Serialize};

use crate::error::InferenceError;

fn default_norm_eps() -> f32 {
    1e-5
}

/// Architectural parameters of the transformer.
///
/// All dimensions are injected through this struct rather than baked in as
/// constants, so tests can run the full pipeline on small synthetic shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Width of token and position embeddings, and of every hidden state row.
    pub hidden_size: usize,
    /// Number of stacked transformer blocks.
    pub num_layers: usize,
    /// Number of attention heads. Must divide `hidden_size`.
    pub num_heads: usize,
    /// Width of the feed-forward hidden layer.
    pub ffn_hidden: usize,
    /// Number of entries in the vocabulary.
    pub vocab_size: usize,
    /// Maximum supported sequence length (size of the position table).
    pub max_seq_len: usize,
    /// Epsilon added to the variance in layer normalization.
    #[serde(default = "default_norm_eps")]
    pub norm_eps: f32,
}

impl ModelConfig {
    /// Configuration of the GPT-2 base model.
    pub fn gpt2_base() -> Self {
        Self {
            hidden_size: 768,
            num_layers: 12,
            num_heads: 12,
            ffn_hidden: 3072,
            vocab_size: 50257,
            max_seq_len: 1024,
            norm_eps: 1e-5,
        }
    }

    /// Per-head width: `hidden_size / num_heads`.
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_heads
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.hidden_size == 0
            || self.num_layers == 0
            || self.num_heads == 0
            || self.ffn_hidden == 0
            || self.vocab_size == 0
            || self.max_seq_len == 0
        {
            return Err(InferenceError::Config(
                "all dimensions must be positive".to_string(),
            ));
        }
        if self.hidden_size % self.num_heads != 0 {
            return Err(InferenceError::Config(format!(
                "hidden_size ({}) must be divisible by num_heads ({})",
                self.hidden_size, self.num_heads
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpt2_base_values() {
        let config = ModelConfig::gpt2_base();
        assert_eq!(config.hidden_size, 768);
        assert_eq!(config.num_layers, 12);
        assert_eq!(config.num_heads, 12);
        assert_eq!(config.ffn_hidden, 3072);
        assert_eq!(config.vocab_size, 50257);
        assert_eq!(config.max_seq_len, 1024);
        assert_eq!(config.head_dim(), 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_head_dim() {
        let config = ModelConfig {
            hidden_size: 8,
            num_heads: 2,
            ..ModelConfig::gpt2_base()
        };
        assert_eq!(config.head_dim(), 4);
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let config = ModelConfig {
            vocab_size: 0,
            ..ModelConfig::gpt2_base()
        };
        assert!(matches!(
            config.validate(),
            Err(InferenceError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_indivisible_heads() {
        let config = ModelConfig {
            hidden_size: 10,
            num_heads: 3,
            ..ModelConfig::gpt2_base()
        };
        assert!(matches!(
            config.validate(),
            Err(InferenceError::Config(_))
        ));
    }

    #[test]
    fn test_serde_round_trip_with_default_eps() {
        let json = r#"{
            "hidden_size": 8,
            "num_layers": 1,
            "num_heads": 2,
            "ffn_hidden": 32,
            "vocab_size": 16,
            "max_seq_len": 8
        }"#;
        let config: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.norm_eps, 1e-5);
        assert!(config.validate().is_ok());

        let serialized = serde_json::to_string(&config).unwrap();
        let restored: ModelConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(restored.hidden_size, config.hidden_size);
        assert_eq!(restored.norm_eps, config.norm_eps);
    }
}
