//! Parallel execution primitives with disjoint-write contracts.
//!
//! Both helpers run on the rayon worker pool: work items are distributed
//! dynamically via work stealing, with no ordering guarantee between items,
//! and the call returns only after every item has completed. Neither helper
//! takes a lock anywhere: each worker either owns a distinct `&mut` region
//! of the output ([`for_each_row_band`]) or produces an independent value
//! ([`map`]), so no two workers can ever write the same element.

use rayon::prelude::*;

/// Run `f` over disjoint bands of rows of a row-major buffer, in parallel.
///
/// `data` is treated as a matrix of `row_width`-wide rows. It is split into
/// consecutive bands of `band_rows` rows (the final band may be shorter),
/// and `f(first_row, band)` is invoked once per band with exclusive mutable
/// access to that band's storage.
///
/// # Panics
/// Panics if `row_width` or `band_rows` is zero, or if `data.len()` is not
/// a multiple of `row_width`.
pub fn for_each_row_band<F>(data: &mut [f32], row_width: usize, band_rows: usize, f: F)
where
    F: Fn(usize, &mut [f32]) + Send + Sync,
{
    assert!(row_width > 0, "for_each_row_band: row_width must be > 0");
    assert!(band_rows > 0, "for_each_row_band: band_rows must be > 0");
    assert_eq!(
        data.len() % row_width,
        0,
        "for_each_row_band: data length {} is not a multiple of row width {}",
        data.len(),
        row_width
    );

    data.par_chunks_mut(band_rows * row_width)
        .enumerate()
        .for_each(|(band_idx, band)| f(band_idx * band_rows, band));
}

/// Evaluate `f(0), f(1), .., f(n - 1)` in parallel, returning the results
/// in index order.
pub fn map<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    (0..n).into_par_iter().map(f).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_each_row_band_covers_every_row_once() {
        // 10 rows of width 3, bands of 4 rows -> bands of 4, 4, 2 rows.
        let mut data = vec![0.0f32; 30];
        for_each_row_band(&mut data, 3, 4, |first_row, band| {
            let rows = band.len() / 3;
            for r in 0..rows {
                for c in 0..3 {
                    band[r * 3 + c] += (first_row + r) as f32;
                }
            }
        });
        for (i, chunk) in data.chunks(3).enumerate() {
            assert_eq!(chunk, &[i as f32; 3], "row {} written incorrectly", i);
        }
    }

    #[test]
    fn test_for_each_row_band_single_band() {
        // Fewer rows than the band size: one band holding everything.
        let mut data = vec![1.0f32; 6];
        for_each_row_band(&mut data, 2, 64, |first_row, band| {
            assert_eq!(first_row, 0);
            assert_eq!(band.len(), 6);
            for v in band.iter_mut() {
                *v *= 2.0;
            }
        });
        assert!(data.iter().all(|&v| v == 2.0));
    }

    #[test]
    #[should_panic(expected = "not a multiple of row width")]
    fn test_for_each_row_band_bad_length() {
        let mut data = vec![0.0f32; 7];
        for_each_row_band(&mut data, 3, 2, |_, _| {});
    }

    #[test]
    fn test_map_preserves_index_order() {
        let result = map(8, |i| i * i);
        assert_eq!(result, vec![0, 1, 4, 9, 16, 25, 36, 49]);
    }

    #[test]
    fn test_map_empty() {
        let result: Vec<usize> = map(0, |i| i);
        assert!(result.is_empty());
    }
}
