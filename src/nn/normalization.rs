//! Batch normalization.
//!
//! # References
//!
//! - Ioffe, S., & Szegedy, C. (2015). Batch normalization: Accelerating
//!   deep network training. ICML.

use super::init::{constant, zeros};
use super::module::Module;
use crate::tensor::Tensor;
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
struct RunningStats {
    mean: Vec<f32>,
    var: Vec<f32>,
}

/// Batch Normalization for `[batch, features]` inputs (Ioffe & Szegedy, 2015).
///
/// Training mode normalizes with the statistics of the current batch and
/// folds them into the running statistics with `momentum`
/// (`running = (1 - momentum) * running + momentum * batch`, unbiased
/// variance). Evaluation mode normalizes with the running statistics, which
/// start at mean 0 / variance 1 and can be replaced with
/// [`BatchNorm1d::set_running_stats`] when loading trained weights.
#[derive(Debug)]
pub struct BatchNorm1d {
    num_features: usize,
    eps: f32,
    momentum: f32,
    /// Learnable scale
    weight: Tensor,
    /// Learnable shift
    bias: Tensor,
    running: Mutex<RunningStats>,
    training: bool,
}

impl BatchNorm1d {
    /// Create a new `BatchNorm1d` layer over `num_features` columns.
    #[must_use]
    pub fn new(num_features: usize) -> Self {
        Self {
            num_features,
            eps: 1e-5,
            momentum: 0.1,
            weight: constant(&[num_features], 1.0),
            bias: zeros(&[num_features]),
            running: Mutex::new(RunningStats {
                mean: vec![0.0; num_features],
                var: vec![1.0; num_features],
            }),
            training: true,
        }
    }

    /// Set epsilon for numerical stability.
    #[must_use]
    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    /// Set the running-statistics momentum.
    #[must_use]
    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    /// Number of normalized features.
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Replace the running statistics used in evaluation mode.
    ///
    /// # Panics
    ///
    /// Panics if either tensor is not `[num_features]`.
    pub fn set_running_stats(&mut self, mean: Tensor, var: Tensor) {
        assert_eq!(mean.shape(), &[self.num_features], "running mean shape");
        assert_eq!(var.shape(), &[self.num_features], "running var shape");
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        running.mean = mean.into_vec();
        running.var = var.into_vec();
    }

    /// Current running `(mean, var)`.
    #[must_use]
    pub fn running_stats(&self) -> (Tensor, Tensor) {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        (
            Tensor::from_slice(&running.mean),
            Tensor::from_slice(&running.var),
        )
    }

    fn normalize_column(&self, input: &[f32], output: &mut [f32], f: usize, mean: f32, var: f32) {
        let features = self.num_features;
        let std_inv = 1.0 / (var + self.eps).sqrt();
        let (gamma, beta) = (self.weight.data()[f], self.bias.data()[f]);
        for (dst, src) in output
            .iter_mut()
            .skip(f)
            .step_by(features)
            .zip(input.iter().skip(f).step_by(features))
        {
            *dst = (src - mean) * std_inv * gamma + beta;
        }
    }
}

impl Module for BatchNorm1d {
    fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(input.ndim(), 2, "BatchNorm1d expects 2D input");

        let (batch_size, features) = (input.shape()[0], input.shape()[1]);
        assert_eq!(
            features, self.num_features,
            "Expected {} features, got {}",
            self.num_features, features
        );

        if batch_size == 0 {
            return input.clone();
        }

        let input_data = input.data();
        let mut output_data = vec![0.0; input_data.len()];
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

        for f in 0..features {
            let (mean, var) = if self.training {
                let column = input_data.iter().skip(f).step_by(features);
                let mean = column.clone().sum::<f32>() / batch_size as f32;
                let sq_dev = column.map(|&x| (x - mean).powi(2)).sum::<f32>();
                let var = sq_dev / batch_size as f32;
                let unbiased = if batch_size > 1 {
                    sq_dev / (batch_size - 1) as f32
                } else {
                    var
                };
                running.mean[f] = (1.0 - self.momentum) * running.mean[f] + self.momentum * mean;
                running.var[f] = (1.0 - self.momentum) * running.var[f] + self.momentum * unbiased;
                (mean, var)
            } else {
                (running.mean[f], running.var[f])
            };
            self.normalize_column(input_data, &mut output_data, f, mean, var);
        }

        Tensor::from_vec(output_data, input.shape())
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }

    fn train(&mut self) {
        self.training = true;
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn training(&self) -> bool {
        self.training
    }
}
