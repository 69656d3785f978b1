//! Parameter-free activation layers for [`Sequential`](super::Sequential) stacks.

use super::module::Module;
use crate::tensor::Tensor;

/// `max(0, x)`, applied after every hidden layer and in the node merge.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl ReLU {
    /// Create a ReLU layer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Module for ReLU {
    fn forward(&self, input: &Tensor) -> Tensor {
        input.relu()
    }
}

/// Logistic function `1 / (1 + exp(-x))`; turns edge logits into the
/// confidences that weight node messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Sigmoid {
    /// Create a Sigmoid layer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Module for Sigmoid {
    fn forward(&self, input: &Tensor) -> Tensor {
        input.sigmoid()
    }
}
