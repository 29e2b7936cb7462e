//! Transformer block forward pass.
//!
//! Implements the per-block pipeline: layer norm, Q/K/V projection,
//! multi-head attention, residual add, layer norm, feed-forward, residual
//! add. Every step consumes its input by reference and produces a freshly
//! owned tensor; nothing is mutated in place, so the residual terms stay
//! valid until they are added back in.

use tracing::trace;

use crate::ops;
use crate::ops::attention::scaled_dot_product_attention;
use crate::parallel;
use crate::tensor::Tensor;

use super::config::ModelConfig;
use super::weights::BlockWeights;

/// Extract a per-head slice from a `[seq_len, total_dim]` buffer.
///
/// Returns a `[seq_len, head_dim]` tensor for the given head index.
fn extract_head(
    data: &[f32],
    seq_len: usize,
    total_dim: usize,
    head: usize,
    head_dim: usize,
) -> Tensor {
    let mut head_data = vec![0.0f32; seq_len * head_dim];
    for pos in 0..seq_len {
        let src_offset = pos * total_dim + head * head_dim;
        let dst_offset = pos * head_dim;
        head_data[dst_offset..dst_offset + head_dim]
            .copy_from_slice(&data[src_offset..src_offset + head_dim]);
    }
    Tensor::new(vec![seq_len, head_dim], head_data)
}

/// Reassemble per-head outputs into a single `[seq_len, num_heads * head_dim]`
/// tensor, preserving head order.
fn assemble_heads(
    head_outputs: &[Tensor],
    seq_len: usize,
    num_heads: usize,
    head_dim: usize,
) -> Tensor {
    let total_dim = num_heads * head_dim;
    let mut result = vec![0.0f32; seq_len * total_dim];
    for (head, output) in head_outputs.iter().enumerate() {
        let head_data = output.data();
        for pos in 0..seq_len {
            let src_offset = pos * head_dim;
            let dst_offset = pos * total_dim + head * head_dim;
            result[dst_offset..dst_offset + head_dim]
                .copy_from_slice(&head_data[src_offset..src_offset + head_dim]);
        }
    }
    Tensor::new(vec![seq_len, total_dim], result)
}

/// Multi-head attention over projected Q, K, V, each `[seq_len, hidden]`.
///
/// Splits the hidden axis into `num_heads` contiguous slices of `head_dim`
/// columns, runs scaled dot-product attention per head on the rayon pool
/// (heads share no mutable state), and concatenates the head outputs back
/// into `[seq_len, hidden]` rows.
fn multi_head_attention(q: &Tensor, k: &Tensor, v: &Tensor, config: &ModelConfig) -> Tensor {
    let seq_len = q.rows();
    let num_heads = config.num_heads;
    let head_dim = config.head_dim();
    let total_dim = config.hidden_size;

    trace!(seq_len, num_heads, head_dim, "multi_head_attention");

    let q_data = q.data();
    let k_data = k.data();
    let v_data = v.data();

    let head_outputs = parallel::map(num_heads, |h| {
        let q_head = extract_head(q_data, seq_len, total_dim, h, head_dim);
        let k_head = extract_head(k_data, seq_len, total_dim, h, head_dim);
        let v_head = extract_head(v_data, seq_len, total_dim, h, head_dim);
        scaled_dot_product_attention(&q_head, &k_head, &v_head)
    });

    assemble_heads(&head_outputs, seq_len, num_heads, head_dim)
}

/// Single transformer block forward pass.
///
/// 1. normed = layer_norm(x)
/// 2. q, k, v = project(normed)
/// 3. a = multi_head_attention(q, k, v)
/// 4. x1 = x + a
/// 5. normed2 = layer_norm(x1)
/// 6. m = ffn_down(gelu(ffn_up(normed2)))
/// 7. output = x1 + m
pub(crate) fn block_forward(x: &Tensor, weights: &BlockWeights, config: &ModelConfig) -> Tensor {
    trace!(seq_len = x.rows(), "block_forward");

    // 1. Pre-attention normalization
    let normed = ops::layer_norm(x, config.norm_eps);

    // 2. QKV projections
    let q = weights.attn_q.forward_2d(&normed);
    let k = weights.attn_k.forward_2d(&normed);
    let v = weights.attn_v.forward_2d(&normed);

    // 3. Multi-head attention
    let attn_out = multi_head_attention(&q, &k, &v, config);

    // 4. Residual connection
    let x1 = ops::add(x, &attn_out);

    // 5. Pre-FFN normalization
    let normed2 = ops::layer_norm(&x1, config.norm_eps);

    // 6. Feed-forward, applied position-wise
    let ffn_out = feed_forward(&normed2, weights);

    // 7. Residual connection
    ops::add(&x1, &ffn_out)
}

/// Two-layer feed-forward: up projection, GELU, down projection.
fn feed_forward(x: &Tensor, weights: &BlockWeights) -> Tensor {
    let up = weights.ffn_up.forward_2d(x);
    let activated = ops::gelu(&up);
    weights.ffn_down.forward_2d(&activated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::weights::BlockWeights;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

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
    fn test_extract_and_assemble_round_trip() {
        // 3 positions, 2 heads of width 2.
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let h0 = extract_head(&data, 3, 4, 0, 2);
        let h1 = extract_head(&data, 3, 4, 1, 2);
        assert_eq!(h0.data(), &[0.0, 1.0, 4.0, 5.0, 8.0, 9.0]);
        assert_eq!(h1.data(), &[2.0, 3.0, 6.0, 7.0, 10.0, 11.0]);

        let reassembled = assemble_heads(&[h0, h1], 3, 2, 2);
        assert_eq!(reassembled.data(), data.as_slice());
    }

    #[test]
    fn test_multi_head_attention_output_shape() {
        let config = tiny_config();
        let q = Tensor::zeros(&[5, 8]);
        let k = Tensor::zeros(&[5, 8]);
        let v = Tensor::zeros(&[5, 8]);
        let out = multi_head_attention(&q, &k, &v, &config);
        assert_eq!(out.shape(), &[5, 8]);
    }

    #[test]
    fn test_multi_head_attention_uniform_probs() {
        // Zero Q/K give uniform attention per head, so each output row is
        // the column-wise mean of v within that head's slice.
        let config = tiny_config();
        let q = Tensor::zeros(&[2, 8]);
        let k = Tensor::zeros(&[2, 8]);
        let v = Tensor::new(
            vec![2, 8],
            (0..16).map(|i| i as f32).collect(),
        );
        let out = multi_head_attention(&q, &k, &v, &config);
        // Column j of the output is the mean of v[0][j] and v[1][j].
        for pos in 0..2 {
            for j in 0..8 {
                let expected = (v.row(0)[j] + v.row(1)[j]) / 2.0;
                assert!(
                    (out.row(pos)[j] - expected).abs() < 1e-6,
                    "position {}, column {}",
                    pos,
                    j
                );
            }
        }
    }

    #[test]
    fn test_block_output_shape() {
        let config = tiny_config();
        let mut rng = StdRng::seed_from_u64(3);
        let weights = BlockWeights::random(&config, &mut rng);
        let x = Tensor::new(
            vec![4, 8],
            (0..32).map(|i| ((i % 7) as f32 - 3.0) * 0.25).collect(),
        );
        let out = block_forward(&x, &weights, &config);
        assert_eq!(out.shape(), &[4, 8]);
        assert!(out.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_block_with_zero_weights_is_identity() {
        // Zero sublayer weights leave only the residual paths: uniform
        // attention over zero values contributes nothing, and the FFN output
        // is zero, so the block returns its input exactly.
        let config = tiny_config();
        let weights = BlockWeights::zeros(&config);
        let x = Tensor::new(
            vec![3, 8],
            (0..24).map(|i| (i as f32).sin()).collect(),
        );
        let out = block_forward(&x, &weights, &config);
        assert_eq!(out.data(), x.data());
    }

    #[test]
    fn test_block_does_not_mutate_input() {
        let config = tiny_config();
        let mut rng = StdRng::seed_from_u64(9);
        let weights = BlockWeights::random(&config, &mut rng);
        let x = Tensor::new(vec![2, 8], (0..16).map(|i| i as f32 * 0.1).collect());
        let snapshot = x.clone();
        let _ = block_forward(&x, &weights, &config);
        assert_eq!(x.data(), snapshot.data());
    }

    #[test]
    fn test_block_single_position() {
        let config = tiny_config();
        let mut rng = StdRng::seed_from_u64(11);
        let weights = BlockWeights::random(&config, &mut rng);
        let x = Tensor::new(vec![1, 8], (0..8).map(|i| i as f32 * 0.3 - 1.0).collect());
        let out = block_forward(&x, &weights, &config);
        assert_eq!(out.shape(), &[1, 8]);
        assert!(out.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_block_deterministic() {
        let config = tiny_config();
        let mut rng = StdRng::seed_from_u64(21);
        let weights = BlockWeights::random(&config, &mut rng);
        let x = Tensor::new(vec![4, 8], (0..32).map(|i| (i as f32).cos()).collect());
        let first = block_forward(&x, &weights, &config);
        let second = block_forward(&x, &weights, &config);
        assert_eq!(first.data(), second.data());
    }
}
