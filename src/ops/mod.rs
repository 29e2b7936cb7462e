//! CPU compute kernels.
//!
//! Implements the dense primitives behind the transformer forward pass:
//! lane-vectorized dot product, linear projection, layer normalization,
//! GELU activation, element-wise addition, and row softmax. All kernels
//! are pure: they read their inputs and produce freshly owned outputs.
//! Shape misuse is a caller bug and panics; the public model entry points
//! validate untrusted input before any kernel runs.

use tracing::trace;

use crate::tensor::Tensor;

pub mod attention;

/// Number of independent accumulator lanes in [`dot`].
pub const LANE_WIDTH: usize = 4;

/// Dot product over four independent accumulator lanes.
///
/// Processes `LANE_WIDTH` elements per step to keep the four partial sums
/// free of sequential dependencies; a scalar tail handles lengths that are
/// not lane multiples. The reduction order is fixed, so results are
/// identical across calls and threads.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "dot: input lengths must match, got {} and {}",
        a.len(),
        b.len()
    );

    let mut lanes = [0.0f32; LANE_WIDTH];
    let mut a_chunks = a.chunks_exact(LANE_WIDTH);
    let mut b_chunks = b.chunks_exact(LANE_WIDTH);
    for (ca, cb) in (&mut a_chunks).zip(&mut b_chunks) {
        lanes[0] += ca[0] * cb[0];
        lanes[1] += ca[1] * cb[1];
        lanes[2] += ca[2] * cb[2];
        lanes[3] += ca[3] * cb[3];
    }

    let mut sum = (lanes[0] + lanes[1]) + (lanes[2] + lanes[3]);
    for (&x, &y) in a_chunks.remainder().iter().zip(b_chunks.remainder()) {
        sum += x * y;
    }
    sum
}

/// Linear projection of one position's activations into a caller-owned
/// buffer: `out[i] = bias[i] + dot(weight[i], input)`.
///
/// `weight` is `[out_features, in_features]`, `bias` is `[out_features]`.
///
/// # Panics
/// Panics if `input`, `bias`, or `out` lengths disagree with the weight
/// shape.
pub fn linear_into(input: &[f32], weight: &Tensor, bias: &Tensor, out: &mut [f32]) {
    let out_features = weight.rows();
    let in_features = weight.cols();
    assert_eq!(
        input.len(),
        in_features,
        "linear: input length {} must match weight cols {}",
        input.len(),
        in_features
    );
    assert_eq!(
        bias.n_elements(),
        out_features,
        "linear: bias length {} must match weight rows {}",
        bias.n_elements(),
        out_features
    );
    assert_eq!(
        out.len(),
        out_features,
        "linear: output length {} must match weight rows {}",
        out.len(),
        out_features
    );

    let w = weight.data();
    let b = bias.data();
    for i in 0..out_features {
        let w_row = &w[i * in_features..(i + 1) * in_features];
        out[i] = b[i] + dot(w_row, input);
    }
}

/// Linear projection of one position's activations, returning a new vector.
pub fn linear(input: &[f32], weight: &Tensor, bias: &Tensor) -> Vec<f32> {
    let mut out = vec![0.0f32; weight.rows()];
    linear_into(input, weight, bias, &mut out);
    out
}

/// Layer normalization over the feature axis, one row at a time:
/// `(x - mean) / sqrt(variance + eps)` with biased variance.
///
/// This model variant applies no learned scale or shift after
/// normalization.
pub fn layer_norm(t: &Tensor, eps: f32) -> Tensor {
    let rows = t.rows();
    let cols = t.cols();
    trace!(rows, cols, eps, "layer_norm");

    let data = t.data();
    let mut result = vec![0.0f32; data.len()];

    for row in 0..rows {
        let start = row * cols;
        let row_data = &data[start..start + cols];

        let mean: f32 = row_data.iter().sum::<f32>() / cols as f32;

        let variance: f32 = row_data
            .iter()
            .map(|&x| (x - mean) * (x - mean))
            .sum::<f32>()
            / cols as f32;

        let inv_std = 1.0 / (variance + eps).sqrt();

        for i in 0..cols {
            result[start + i] = (row_data[i] - mean) * inv_std;
        }
    }

    Tensor::new(vec![rows, cols], result)
}

/// GELU activation, applied element-wise:
/// `0.5 * x * (1 + tanh(sqrt(2/pi) * (x + 0.044715 * x^3)))`.
pub fn gelu(t: &Tensor) -> Tensor {
    let data = t.data();
    trace!(n_elements = data.len(), "gelu");

    let sqrt_2_over_pi = (2.0f32 / std::f32::consts::PI).sqrt();

    let result: Vec<f32> = data
        .iter()
        .map(|&x| {
            let inner = sqrt_2_over_pi * (x + 0.044715 * x * x * x);
            0.5 * x * (1.0 + inner.tanh())
        })
        .collect();

    Tensor::new(t.shape().to_vec(), result)
}

/// Element-wise addition: a + b. Used for residual connections.
///
/// # Panics
/// Panics if the shapes differ.
pub fn add(a: &Tensor, b: &Tensor) -> Tensor {
    assert_eq!(
        a.shape(),
        b.shape(),
        "add: shapes must match, got {:?} and {:?}",
        a.shape(),
        b.shape()
    );

    trace!(shape = ?a.shape(), "add");

    let result: Vec<f32> = a
        .data()
        .iter()
        .zip(b.data().iter())
        .map(|(&x, &y)| x + y)
        .collect();
    Tensor::new(a.shape().to_vec(), result)
}

/// Row-wise softmax of a 2D tensor, max-subtracted for numerical stability.
pub fn softmax(t: &Tensor) -> Tensor {
    let rows = t.rows();
    let cols = t.cols();
    trace!(rows, cols, "softmax");

    let data = t.data();
    let mut result = vec![0.0f32; data.len()];

    for row in 0..rows {
        let start = row * cols;
        let row_data = &data[start..start + cols];

        let max_val = row_data.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.0f32;
        for i in 0..cols {
            let exp_val = (row_data[i] - max_val).exp();
            result[start + i] = exp_val;
            sum += exp_val;
        }

        if sum > 0.0 {
            for i in 0..cols {
                result[start + i] /= sum;
            }
        }
    }

    Tensor::new(vec![rows, cols], result)
}
