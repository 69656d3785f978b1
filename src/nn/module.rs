//! The [`Module`] trait shared by every layer.

use crate::tensor::Tensor;

/// A neural network building block with a forward pass and parameters.
///
/// Forward passes take `&self`; the only state a forward pass may touch is
/// interior (the dropout RNG).
pub trait Module: Send + Sync {
    /// Compute the layer output for `input`.
    fn forward(&self, input: &Tensor) -> Tensor;

    /// All learnable tensors, in a stable order.
    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }

    /// Mutable access to all learnable tensors, same order as [`Module::parameters`].
    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        Vec::new()
    }

    /// Total number of learnable scalars.
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.numel()).sum()
    }

    /// Switch to training mode.
    fn train(&mut self) {}

    /// Switch to evaluation mode.
    fn eval(&mut self) {}

    /// Whether the module is in training mode.
    fn training(&self) -> bool {
        false
    }

    /// Recompute any cached derived tensors after parameters were modified.
    fn refresh_caches(&mut self) {}
}
