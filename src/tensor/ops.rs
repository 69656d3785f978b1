//! Tensor operations used by the layers and the message-passing core.
//!
//! Shape violations here are programming errors and panic, the same way an
//! out-of-bounds slice index does. User-facing shape checks happen earlier,
//! when graphs and configurations are validated.

use super::Tensor;

// ============================================================================
// Activation Functions
// ============================================================================

impl Tensor {
    /// `ReLU` activation: z = max(0, self)
    #[must_use]
    pub fn relu(&self) -> Tensor {
        let data: Vec<f32> = self.data().iter().copied().map(trueno::relu_scalar).collect();
        Tensor::from_vec(data, self.shape())
    }

    /// Sigmoid activation: z = 1 / (1 + exp(-self))
    #[must_use]
    pub fn sigmoid(&self) -> Tensor {
        let data: Vec<f32> = self
            .data()
            .iter()
            .copied()
            .map(trueno::sigmoid_scalar)
            .collect();
        Tensor::from_vec(data, self.shape())
    }
}

// ============================================================================
// Matrix Operations
// ============================================================================

impl Tensor {
    /// Matrix multiplication: z = self @ other
    ///
    /// Both operands must be 2D. Zero-row inputs produce a zero-row output.
    #[must_use]
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.ndim(), 2, "matmul requires 2D tensors");
        assert_eq!(other.ndim(), 2, "matmul requires 2D tensors");

        let (m, k1) = (self.shape()[0], self.shape()[1]);
        let (k2, n) = (other.shape()[0], other.shape()[1]);
        assert_eq!(k1, k2, "matmul dimension mismatch: {k1} vs {k2}");

        if m == 0 || n == 0 || k1 == 0 {
            return Tensor::zeros(&[m, n]);
        }

        // SIMD-accelerated matmul; shapes were checked above
        let a_matrix = trueno::Matrix::from_vec(m, k1, self.data().to_vec())
            .unwrap_or_else(|err| panic!("matmul: invalid left operand [{m}, {k1}]: {err:?}"));
        let b_matrix = trueno::Matrix::from_vec(k2, n, other.data().to_vec())
            .unwrap_or_else(|err| panic!("matmul: invalid right operand [{k2}, {n}]: {err:?}"));
        let product = a_matrix
            .matmul(&b_matrix)
            .unwrap_or_else(|err| panic!("matmul dimension mismatch: {err:?}"));

        Tensor::new(product.as_slice(), &[m, n])
    }

    /// Transpose a 2D tensor.
    #[must_use]
    pub fn transpose(&self) -> Tensor {
        assert_eq!(self.ndim(), 2, "transpose requires 2D tensor");

        let (rows, cols) = (self.shape()[0], self.shape()[1]);
        let mut data = vec![0.0; rows * cols];

        for i in 0..rows {
            for j in 0..cols {
                data[j * rows + i] = self.data()[i * cols + j];
            }
        }

        Tensor::from_vec(data, &[cols, rows])
    }

    /// Broadcast addition: z = matrix + vector (broadcasts over rows).
    ///
    /// # Shape
    ///
    /// - self: `[N, M]`
    /// - other: `[M]`
    /// - output: `[N, M]`
    #[must_use]
    pub fn broadcast_add(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.ndim(), 2, "broadcast_add requires 2D matrix");
        assert_eq!(other.ndim(), 1, "broadcast_add requires 1D vector");
        assert_eq!(
            self.shape()[1],
            other.shape()[0],
            "Matrix columns {} must match vector length {}",
            self.shape()[1],
            other.shape()[0]
        );

        let cols = self.shape()[1];
        let bias = other.data();
        let mut data = self.data().to_vec();
        for row in data.chunks_mut(cols.max(1)) {
            for (x, &b) in row.iter_mut().zip(bias) {
                *x += b;
            }
        }

        Tensor::from_vec(data, self.shape())
    }

    /// Reshape tensor to a new shape.
    ///
    /// The total number of elements must remain the same.
    #[must_use]
    pub fn view(&self, new_shape: &[usize]) -> Tensor {
        let new_numel: usize = new_shape.iter().product();
        assert_eq!(
            self.numel(),
            new_numel,
            "view: number of elements must match ({} vs {new_numel})",
            self.numel()
        );
        Tensor::new(self.data(), new_shape)
    }
}

// ============================================================================
// Graph Gather / Concatenate
// ============================================================================

impl Tensor {
    /// Concatenate 2D tensors along the feature dimension.
    ///
    /// All parts must have the same number of rows.
    ///
    /// ```
    /// use mot_mpn::tensor::Tensor;
    ///
    /// let a = Tensor::new(&[1.0, 2.0], &[2, 1]);
    /// let b = Tensor::new(&[3.0, 4.0, 5.0, 6.0], &[2, 2]);
    /// let c = Tensor::cat_cols(&[&a, &b]);
    /// assert_eq!(c.data(), &[1.0, 3.0, 4.0, 2.0, 5.0, 6.0]);
    /// ```
    #[must_use]
    pub fn cat_cols(parts: &[&Tensor]) -> Tensor {
        assert!(!parts.is_empty(), "cat_cols requires at least one tensor");
        let rows = parts[0].rows();
        for p in parts {
            assert_eq!(p.ndim(), 2, "cat_cols requires 2D tensors");
            assert_eq!(
                p.rows(),
                rows,
                "cat_cols: row count mismatch {} vs {rows}",
                p.rows()
            );
        }

        let total_cols: usize = parts.iter().map(|p| p.cols()).sum();
        let mut data = Vec::with_capacity(rows * total_cols);
        for r in 0..rows {
            for p in parts {
                data.extend_from_slice(p.row(r));
            }
        }

        Tensor::from_vec(data, &[rows, total_cols])
    }

    /// Gather rows by index: `out[i] = self[indices[i]]`.
    ///
    /// # Panics
    ///
    /// Panics if any index is out of range.
    #[must_use]
    pub fn index_select(&self, indices: &[usize]) -> Tensor {
        assert_eq!(self.ndim(), 2, "index_select requires 2D tensor");
        let cols = self.cols();
        let mut data = Vec::with_capacity(indices.len() * cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Tensor::from_vec(data, &[indices.len(), cols])
    }

    /// Row-wise Euclidean distance `||a - b + eps||_2`, shape `[rows, 1]`.
    #[must_use]
    pub fn pairwise_distance(&self, other: &Tensor, eps: f32) -> Tensor {
        assert_eq!(
            self.shape(),
            other.shape(),
            "pairwise_distance: shape mismatch {:?} vs {:?}",
            self.shape(),
            other.shape()
        );
        let rows = self.rows();
        let data: Vec<f32> = (0..rows)
            .map(|r| {
                self.row(r)
                    .iter()
                    .zip(other.row(r))
                    .map(|(&a, &b)| (a - b + eps).powi(2))
                    .sum::<f32>()
                    .sqrt()
            })
            .collect();
        Tensor::from_vec(data, &[rows, 1])
    }
}
