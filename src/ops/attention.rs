//! Tiled scaled dot-product attention for a single head.
//!
//! The score matrix is computed in parallel: its row index space is split
//! into bands of [`TILE`] rows distributed across the rayon pool, and each
//! band walks the column space in [`TILE`]-wide tiles so a K row stays hot
//! while a whole tile consumes it. Every score cell is written exactly once
//! by exactly one worker; the bands are disjoint `&mut` slices, so the
//! discipline is enforced at compile time. Softmax and the value-weighted
//! sum then run row by row in a fixed order, keeping results independent of
//! how the pool scheduled the tiles.

use tracing::trace;

use crate::parallel;
use crate::tensor::Tensor;

use super::{dot, softmax};

/// Edge length of the square tiles the score index space is split into.
pub const TILE: usize = 64;

/// The attention score scale factor: `1 / sqrt(head_dim)`.
pub fn attention_scale(head_dim: usize) -> f32 {
    1.0 / (head_dim as f32).sqrt()
}

/// Compute the scaled attention score matrix for one head.
///
/// `q` and `k` are `[seq_len, head_dim]`; the result is `[seq_len, seq_len]`
/// with `score[i][j] = dot(q[i], k[j]) / sqrt(head_dim)`.
///
/// # Panics
/// Panics if `q` and `k` shapes differ or are not 2D.
pub fn attention_scores(q: &Tensor, k: &Tensor) -> Tensor {
    assert_eq!(
        q.shape(),
        k.shape(),
        "attention_scores: q and k shapes must match, got {:?} and {:?}",
        q.shape(),
        k.shape()
    );

    let seq_len = q.rows();
    let head_dim = q.cols();
    let scale = attention_scale(head_dim);

    trace!(seq_len, head_dim, scale, "attention_scores");

    let q_data = q.data();
    let k_data = k.data();

    let mut scores = Tensor::zeros(&[seq_len, seq_len]);
    parallel::for_each_row_band(scores.data_mut(), seq_len, TILE, |first_row, band| {
        let band_rows = band.len() / seq_len;
        for tile_col in (0..seq_len).step_by(TILE) {
            let col_end = (tile_col + TILE).min(seq_len);
            for r in 0..band_rows {
                let i = first_row + r;
                let q_row = &q_data[i * head_dim..(i + 1) * head_dim];
                let out_row = &mut band[r * seq_len..(r + 1) * seq_len];
                for j in tile_col..col_end {
                    let k_row = &k_data[j * head_dim..(j + 1) * head_dim];
                    out_row[j] = dot(q_row, k_row) * scale;
                }
            }
        }
    });

    scores
}

/// Full scaled dot-product attention for one head:
/// scores, row softmax, then the value-weighted sum
/// `out[i] = sum_j probs[i][j] * v[j]`.
///
/// `q`, `k`, `v` are `[seq_len, head_dim]`; the result is
/// `[seq_len, head_dim]`.
pub fn scaled_dot_product_attention(q: &Tensor, k: &Tensor, v: &Tensor) -> Tensor {
    assert_eq!(
        q.shape(),
        v.shape(),
        "scaled_dot_product_attention: q and v shapes must match, got {:?} and {:?}",
        q.shape(),
        v.shape()
    );

    let scores = attention_scores(q, k);
    let probs = softmax(&scores);
    weighted_values(&probs, v)
}

/// Combine value rows by attention probability:
/// `out[i] = sum_j probs[i][j] * v[j]`.
fn weighted_values(probs: &Tensor, v: &Tensor) -> Tensor {
    let seq_len = probs.rows();
    let head_dim = v.cols();
    assert_eq!(
        probs.cols(),
        v.rows(),
        "weighted_values: probs cols ({}) must match v rows ({})",
        probs.cols(),
        v.rows()
    );

    let p = probs.data();
    let v_data = v.data();

    let mut out = Tensor::zeros(&[seq_len, head_dim]);
    let out_data = out.data_mut();
    for i in 0..seq_len {
        let out_row = &mut out_data[i * head_dim..(i + 1) * head_dim];
        for j in 0..seq_len {
            let weight = p[i * seq_len + j];
            let v_row = &v_data[j * head_dim..(j + 1) * head_dim];
            for (o, &x) in out_row.iter_mut().zip(v_row) {
                *o += weight * x;
            }
        }
    }
    out
}
