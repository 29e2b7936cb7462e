//! Dense row-major tensor type.
//!
//! Provides the core [`Tensor`] type used throughout gpt2-inference: a single
//! contiguous `f32` buffer plus explicit shape and strides. Rows of 2D
//! tensors are addressed by index arithmetic, never by per-row allocation.

use crate::error::InferenceError;

/// N-dimensional tensor backed by one contiguous `f32` buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    strides: Vec<usize>,
    data: Vec<f32>,
}

/// Compute row-major strides from shape.
/// strides[i] = product of shape[i+1..]
fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0usize; shape.len()];
    if shape.is_empty() {
        return strides;
    }
    strides[shape.len() - 1] = 1;
    for i in (0..shape.len() - 1).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

impl Tensor {
    /// Create a tensor from shape and data.
    ///
    /// # Panics
    /// Panics if `data.len()` does not match the product of `shape`.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        let n_elements: usize = shape.iter().product();
        assert_eq!(
            data.len(),
            n_elements,
            "Data length {} does not match shape {:?} (expected {})",
            data.len(),
            shape,
            n_elements
        );
        let strides = compute_strides(&shape);
        Self {
            shape,
            strides,
            data,
        }
    }

    /// Create a zero-filled tensor.
    pub fn zeros(shape: &[usize]) -> Self {
        let n_elements: usize = shape.iter().product();
        let strides = compute_strides(shape);
        Self {
            shape: shape.to_vec(),
            strides,
            data: vec![0.0f32; n_elements],
        }
    }

    /// Create a zero-filled tensor, surfacing allocation failure as an error
    /// instead of aborting. Intended for vocabulary-sized buffers whose
    /// size is orders of magnitude above the other intermediates.
    pub fn try_zeros(shape: &[usize]) -> Result<Self, InferenceError> {
        let n_elements: usize = shape.iter().product();
        let mut data = Vec::new();
        data.try_reserve_exact(n_elements)
            .map_err(|_| InferenceError::Allocation {
                bytes: n_elements * std::mem::size_of::<f32>(),
            })?;
        data.resize(n_elements, 0.0f32);
        let strides = compute_strides(shape);
        Ok(Self {
            shape: shape.to_vec(),
            strides,
            data,
        })
    }

    /// Returns the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the strides of the tensor.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Returns the total number of elements in the tensor.
    pub fn n_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Returns a reference to the underlying data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns a mutable reference to the underlying data.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the tensor and return its backing buffer.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Reshape the tensor to a new shape. The total number of elements must
    /// remain the same. Returns a new tensor sharing no storage with `self`.
    ///
    /// # Panics
    /// Panics if the new shape has a different number of elements.
    pub fn reshape(&self, new_shape: &[usize]) -> Tensor {
        let new_n_elements: usize = new_shape.iter().product();
        assert_eq!(
            self.n_elements(),
            new_n_elements,
            "Cannot reshape tensor of {} elements to shape {:?} ({} elements)",
            self.n_elements(),
            new_shape,
            new_n_elements
        );
        Tensor::new(new_shape.to_vec(), self.data.clone())
    }

    /// Returns the number of rows (first dimension) for a 2D tensor.
    ///
    /// # Panics
    /// Panics if the tensor is not 2D.
    pub fn rows(&self) -> usize {
        assert_eq!(
            self.shape.len(),
            2,
            "rows() requires a 2D tensor, got shape {:?}",
            self.shape
        );
        self.shape[0]
    }

    /// Returns the number of columns (second dimension) for a 2D tensor.
    ///
    /// # Panics
    /// Panics if the tensor is not 2D.
    pub fn cols(&self) -> usize {
        assert_eq!(
            self.shape.len(),
            2,
            "cols() requires a 2D tensor, got shape {:?}",
            self.shape
        );
        self.shape[1]
    }

    /// Returns row `i` of a 2D tensor as a slice.
    ///
    /// # Panics
    /// Panics if the tensor is not 2D or `i` is out of bounds.
    pub fn row(&self, i: usize) -> &[f32] {
        let cols = self.cols();
        assert!(
            i < self.shape[0],
            "row index {} out of bounds for {} rows",
            i,
            self.shape[0]
        );
        &self.data[i * cols..(i + 1) * cols]
    }

    /// Returns row `i` of a 2D tensor as a mutable slice.
    ///
    /// # Panics
    /// Panics if the tensor is not 2D or `i` is out of bounds.
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        let cols = self.cols();
        assert!(
            i < self.shape[0],
            "row index {} out of bounds for {} rows",
            i,
            self.shape[0]
        );
        &mut self.data[i * cols..(i + 1) * cols]
    }
}
