//! Model weight containers: per-layer linear projections, block weights,
//! and the full parameter set for one forward pass.
//!
//! Weights are immutable once built. [`ModelWeights::validate`] checks every
//! shape against a [`ModelConfig`] up front so a malformed weight set is
//! rejected before any computation starts.

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::error::InferenceError;
use crate::ops;
use crate::tensor::Tensor;

use super::config::ModelConfig;

/// Half-width of the uniform interval used for random initialization.
const INIT_RANGE: f32 = 0.01;

/// A dense linear projection: weight `[out_features, in_features]` plus
/// bias `[out_features]`.
#[derive(Debug, Clone)]
pub struct LinearLayer {
    weight: Tensor,
    bias: Tensor,
}

impl LinearLayer {
    /// Build a layer from a weight matrix and bias vector.
    ///
    /// # Panics
    /// Panics if `weight` is not 2D, `bias` is not 1D, the bias length does
    /// not match the weight row count, or either dimension is zero.
    pub fn new(weight: Tensor, bias: Tensor) -> Self {
        assert_eq!(
            weight.shape().len(),
            2,
            "LinearLayer: weight must be 2D, got shape {:?}",
            weight.shape()
        );
        assert_eq!(
            bias.shape().len(),
            1,
            "LinearLayer: bias must be 1D, got shape {:?}",
            bias.shape()
        );
        assert!(
            weight.rows() > 0 && weight.cols() > 0,
            "LinearLayer: dimensions must be positive, got shape {:?}",
            weight.shape()
        );
        assert_eq!(
            bias.n_elements(),
            weight.rows(),
            "LinearLayer: bias length {} must match weight rows {}",
            bias.n_elements(),
            weight.rows()
        );
        Self { weight, bias }
    }

    /// Random layer: uniform weights in [-0.01, 0.01], zero biases.
    pub fn random(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        let dist = Uniform::new_inclusive(-INIT_RANGE, INIT_RANGE);
        let data: Vec<f32> = (0..out_features * in_features)
            .map(|_| dist.sample(rng))
            .collect();
        Self::new(
            Tensor::new(vec![out_features, in_features], data),
            Tensor::zeros(&[out_features]),
        )
    }

    /// All-zero layer. Its output is identically zero for every input.
    pub fn zeros(in_features: usize, out_features: usize) -> Self {
        Self::new(
            Tensor::zeros(&[out_features, in_features]),
            Tensor::zeros(&[out_features]),
        )
    }

    /// Input width accepted by this layer.
    pub fn in_features(&self) -> usize {
        self.weight.cols()
    }

    /// Output width produced by this layer.
    pub fn out_features(&self) -> usize {
        self.weight.rows()
    }

    /// The weight matrix, `[out_features, in_features]`.
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// The bias vector, `[out_features]`.
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Project a single position's activations.
    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        ops::linear(input, &self.weight, &self.bias)
    }

    /// Project every row of a `[rows, in_features]` tensor, producing
    /// `[rows, out_features]`.
    pub fn forward_2d(&self, input: &Tensor) -> Tensor {
        assert_eq!(
            input.cols(),
            self.in_features(),
            "LinearLayer: input cols ({}) must match in_features ({})",
            input.cols(),
            self.in_features()
        );
        let rows = input.rows();
        let mut out = Tensor::zeros(&[rows, self.out_features()]);
        for i in 0..rows {
            ops::linear_into(input.row(i), &self.weight, &self.bias, out.row_mut(i));
        }
        out
    }
}

/// Weights of one transformer block: query, key, and value projections
/// plus the two feed-forward layers.
#[derive(Debug, Clone)]
pub struct BlockWeights {
    pub attn_q: LinearLayer,
    pub attn_k: LinearLayer,
    pub attn_v: LinearLayer,
    pub ffn_up: LinearLayer,
    pub ffn_down: LinearLayer,
}

impl BlockWeights {
    /// Randomly initialized block weights for the given configuration.
    pub fn random(config: &ModelConfig, rng: &mut StdRng) -> Self {
        let hidden = config.hidden_size;
        let ffn = config.ffn_hidden;
        Self {
            attn_q: LinearLayer::random(hidden, hidden, rng),
            attn_k: LinearLayer::random(hidden, hidden, rng),
            attn_v: LinearLayer::random(hidden, hidden, rng),
            ffn_up: LinearLayer::random(hidden, ffn, rng),
            ffn_down: LinearLayer::random(ffn, hidden, rng),
        }
    }

    /// All-zero block weights. A block carrying these is an identity
    /// transformation: both sublayers contribute nothing and only the
    /// residual path remains.
    pub fn zeros(config: &ModelConfig) -> Self {
        let hidden = config.hidden_size;
        let ffn = config.ffn_hidden;
        Self {
            attn_q: LinearLayer::zeros(hidden, hidden),
            attn_k: LinearLayer::zeros(hidden, hidden),
            attn_v: LinearLayer::zeros(hidden, hidden),
            ffn_up: LinearLayer::zeros(hidden, ffn),
            ffn_down: LinearLayer::zeros(ffn, hidden),
        }
    }
}

/// The complete, immutable parameter set for one forward pass.
#[derive(Debug, Clone)]
pub struct ModelWeights {
    /// Token embedding table: `[vocab_size, hidden_size]`.
    pub token_embedding: Tensor,
    /// Position embedding table: `[max_seq_len, hidden_size]`.
    pub position_embedding: Tensor,
    /// Per-block transformer weights.
    pub blocks: Vec<BlockWeights>,
    /// Output projection to vocabulary logits: hidden to vocab.
    pub output_projection: LinearLayer,
}

impl ModelWeights {
    /// Randomly initialized weights for the given configuration.
    ///
    /// Embedding entries and linear weights are uniform in [-0.01, 0.01],
    /// biases are zero. The same seed always produces the same weights.
    pub fn random(config: &ModelConfig, seed: u64) -> Self {
        info!(
            hidden_size = config.hidden_size,
            num_layers = config.num_layers,
            vocab_size = config.vocab_size,
            seed,
            "Initializing random model weights"
        );
        let mut rng = StdRng::seed_from_u64(seed);
        let dist = Uniform::new_inclusive(-INIT_RANGE, INIT_RANGE);
        let hidden = config.hidden_size;

        let token_embedding = Tensor::new(
            vec![config.vocab_size, hidden],
            (0..config.vocab_size * hidden)
                .map(|_| dist.sample(&mut rng))
                .collect(),
        );
        let position_embedding = Tensor::new(
            vec![config.max_seq_len, hidden],
            (0..config.max_seq_len * hidden)
                .map(|_| dist.sample(&mut rng))
                .collect(),
        );

        let blocks = (0..config.num_layers)
            .map(|i| {
                debug!(block = i, "Initializing block weights");
                BlockWeights::random(config, &mut rng)
            })
            .collect();

        let output_projection = LinearLayer::random(hidden, config.vocab_size, &mut rng);

        Self {
            token_embedding,
            position_embedding,
            blocks,
            output_projection,
        }
    }

    /// Check every weight shape against the configuration.
    ///
    /// Returns the first mismatch found, naming the offending tensor, so a
    /// malformed weight set is rejected before any compute begins.
    pub fn validate(&self, config: &ModelConfig) -> Result<(), InferenceError> {
        let hidden = config.hidden_size;

        check_shape(
            "token_embedding",
            &[config.vocab_size, hidden],
            self.token_embedding.shape(),
        )?;
        check_shape(
            "position_embedding",
            &[config.max_seq_len, hidden],
            self.position_embedding.shape(),
        )?;

        if self.blocks.len() != config.num_layers {
            return Err(InferenceError::ShapeMismatch {
                name: "blocks".to_string(),
                expected: vec![config.num_layers],
                actual: vec![self.blocks.len()],
            });
        }

        for (i, block) in self.blocks.iter().enumerate() {
            check_linear(&format!("blocks[{}].attn_q", i), &block.attn_q, hidden, hidden)?;
            check_linear(&format!("blocks[{}].attn_k", i), &block.attn_k, hidden, hidden)?;
            check_linear(&format!("blocks[{}].attn_v", i), &block.attn_v, hidden, hidden)?;
            check_linear(
                &format!("blocks[{}].ffn_up", i),
                &block.ffn_up,
                hidden,
                config.ffn_hidden,
            )?;
            check_linear(
                &format!("blocks[{}].ffn_down", i),
                &block.ffn_down,
                config.ffn_hidden,
                hidden,
            )?;
        }

        check_linear(
            "output_projection",
            &self.output_projection,
            hidden,
            config.vocab_size,
        )?;

        Ok(())
    }
}

fn check_shape(name: &str, expected: &[usize], actual: &[usize]) -> Result<(), InferenceError> {
    if actual != expected {
        return Err(InferenceError::ShapeMismatch {
            name: name.to_string(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

fn check_linear(
    name: &str,
    layer: &LinearLayer,
    in_features: usize,
    out_features: usize,
) -> Result<(), InferenceError> {
    check_shape(name, &[out_features, in_features], layer.weight().shape())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> ModelConfig {
        ModelConfig {
            hidden_size: 8,
            num_layers: 1,
            num_heads: 2,
            ffn_hidden: 32,
            vocab_size: 16,
            max_seq_len: 8,
            norm_eps: 1e-5,
        }
    }

    #[test]
    fn test_linear_layer_accessors() {
        let layer = LinearLayer::zeros(4, 6);
        assert_eq!(layer.in_features(), 4);
        assert_eq!(layer.out_features(), 6);
        assert_eq!(layer.weight().shape(), &[6, 4]);
        assert_eq!(layer.bias().shape(), &[6]);
    }

    #[test]
    #[should_panic(expected = "bias length")]
    fn test_linear_layer_bias_mismatch() {
        LinearLayer::new(Tensor::zeros(&[3, 4]), Tensor::zeros(&[2]));
    }

    #[test]
    #[should_panic(expected = "weight must be 2D")]
    fn test_linear_layer_weight_not_2d() {
        LinearLayer::new(Tensor::zeros(&[12]), Tensor::zeros(&[3]));
    }

    #[test]
    fn test_linear_layer_forward_2d_shape() {
        let layer = LinearLayer::zeros(4, 6);
        let input = Tensor::zeros(&[3, 4]);
        let out = layer.forward_2d(&input);
        assert_eq!(out.shape(), &[3, 6]);
    }

    #[test]
    fn test_random_layer_values_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = LinearLayer::random(16, 8, &mut rng);
        assert!(layer
            .weight()
            .data()
            .iter()
            .all(|&w| (-INIT_RANGE..=INIT_RANGE).contains(&w)));
        assert!(layer.bias().data().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_random_weights_deterministic_by_seed() {
        let config = tiny_config();
        let a = ModelWeights::random(&config, 42);
        let b = ModelWeights::random(&config, 42);
        assert_eq!(a.token_embedding.data(), b.token_embedding.data());
        assert_eq!(
            a.blocks[0].attn_q.weight().data(),
            b.blocks[0].attn_q.weight().data()
        );
        assert_eq!(
            a.output_projection.weight().data(),
            b.output_projection.weight().data()
        );

        let c = ModelWeights::random(&config, 43);
        assert_ne!(a.token_embedding.data(), c.token_embedding.data());
    }

    #[test]
    fn test_random_weights_validate() {
        let config = tiny_config();
        let weights = ModelWeights::random(&config, 1);
        assert!(weights.validate(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_embedding_shape() {
        let config = tiny_config();
        let mut weights = ModelWeights::random(&config, 1);
        weights.token_embedding = Tensor::zeros(&[4, 8]);
        let err = weights.validate(&config).unwrap_err();
        match err {
            InferenceError::ShapeMismatch { name, expected, actual } => {
                assert_eq!(name, "token_embedding");
                assert_eq!(expected, vec![16, 8]);
                assert_eq!(actual, vec![4, 8]);
            }
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_wrong_block_count() {
        let config = tiny_config();
        let mut weights = ModelWeights::random(&config, 1);
        weights.blocks.clear();
        assert!(matches!(
            weights.validate(&config),
            Err(InferenceError::ShapeMismatch { name, .. }) if name == "blocks"
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_ffn_shape() {
        let config = tiny_config();
        let mut weights = ModelWeights::random(&config, 1);
        weights.blocks[0].ffn_down = LinearLayer::zeros(8, 8);
        assert!(matches!(
            weights.validate(&config),
            Err(InferenceError::ShapeMismatch { name, .. }) if name == "blocks[0].ffn_down"
        ));
    }

    #[test]
    fn test_zeros_block_layers_have_expected_shapes() {
        let config = tiny_config();
        let block = BlockWeights::zeros(&config);
        assert_eq!(block.attn_q.weight().shape(), &[8, 8]);
        assert_eq!(block.ffn_up.weight().shape(), &[32, 8]);
        assert_eq!(block.ffn_down.weight().shape(), &[8, 32]);
    }
}
