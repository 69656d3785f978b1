//! Dropout regularization.
//!
//! # Reference
//!
//! - Srivastava, N., et al. (2014). Dropout: A simple way to prevent neural
//!   networks from overfitting. JMLR.

use super::init::rng_from;
use super::module::Module;
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Mutex;

/// Dropout regularization layer.
///
/// During training, randomly zeroes elements with probability `p` and scales
/// the survivors by `1/(1-p)`. During evaluation, returns input unchanged.
///
/// ```
/// use mot_mpn::nn::{Dropout, Module};
/// use mot_mpn::tensor::Tensor;
///
/// let mut dropout = Dropout::with_seed(0.5, 7);
/// dropout.eval();
/// let x = Tensor::ones(&[4, 4]);
/// assert_eq!(dropout.forward(&x), x);
/// ```
pub struct Dropout {
    /// Probability of element being zeroed
    p: f32,
    training: bool,
    rng: Mutex<StdRng>,
}

impl Dropout {
    /// Create a new Dropout layer.
    ///
    /// # Panics
    ///
    /// Panics if `p` is not in [0, 1). Configuration validation rejects such
    /// values before layers are built.
    #[must_use]
    pub fn new(p: f32) -> Self {
        Self::build(p, None)
    }

    /// Create a new Dropout layer with a specific seed for reproducibility.
    #[must_use]
    pub fn with_seed(p: f32, seed: u64) -> Self {
        Self::build(p, Some(seed))
    }

    pub(crate) fn build(p: f32, seed: Option<u64>) -> Self {
        assert!(
            (0.0..1.0).contains(&p),
            "Dropout probability must be in [0, 1), got {p}",
        );

        Self {
            p,
            training: true,
            rng: Mutex::new(rng_from(seed)),
        }
    }

    /// Get the dropout probability.
    #[must_use]
    pub fn probability(&self) -> f32 {
        self.p
    }
}

impl Module for Dropout {
    fn forward(&self, input: &Tensor) -> Tensor {
        if !self.training || self.p == 0.0 {
            return input.clone();
        }

        // RNG state survives a poisoned lock.
        let mut rng = self
            .rng
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let scale = 1.0 / (1.0 - self.p);

        let data: Vec<f32> = input
            .data()
            .iter()
            .map(|&x| {
                if rng.gen::<f32>() < self.p {
                    0.0
                } else {
                    x * scale
                }
            })
            .collect();

        Tensor::from_vec(data, input.shape())
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

impl std::fmt::Debug for Dropout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dropout")
            .field("p", &self.p)
            .field("training", &self.training)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropout_training_zeroes_and_scales() {
        let dropout = Dropout::with_seed(0.5, 42);
        let y = dropout.forward(&Tensor::ones(&[100, 10]));

        let zeros = y.data().iter().filter(|&&v| v == 0.0).count();
        assert!(zeros > 300 && zeros < 700, "zeroed {zeros} of 1000");
        assert!(y.data().iter().all(|&v| v == 0.0 || (v - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_dropout_eval_is_identity() {
        let mut dropout = Dropout::new(0.3);
        dropout.eval();
        assert!(!dropout.training());

        let x = Tensor::new(&[1.0, 2.0, 3.0], &[1, 3]);
        assert_eq!(dropout.forward(&x), x);
    }

    #[test]
    fn test_dropout_zero_probability() {
        let dropout = Dropout::new(0.0);
        let x = Tensor::ones(&[3, 3]);
        assert_eq!(dropout.forward(&x), x);
    }

    #[test]
    #[should_panic(expected = "Dropout probability must be in [0, 1)")]
    fn test_dropout_invalid_probability() {
        let _ = Dropout::new(1.0);
    }
}
