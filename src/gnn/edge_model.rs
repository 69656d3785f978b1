//! Edge update step of message passing.

use crate::nn::{Mlp, Module};
use crate::tensor::Tensor;

/// Recomputes every edge embedding from `[source | target | edge]`.
#[derive(Debug)]
pub struct EdgeModel {
    edge_mlp: Mlp,
}

impl EdgeModel {
    /// Wrap the edge update network.
    #[must_use]
    pub fn new(edge_mlp: Mlp) -> Self {
        Self { edge_mlp }
    }

    /// New edge embeddings, one row per edge.
    ///
    /// `source` and `target` are the node embeddings gathered at each edge's
    /// endpoints, so all three inputs have one row per edge.
    #[must_use]
    pub fn forward(&self, source: &Tensor, target: &Tensor, edge_attr: &Tensor) -> Tensor {
        let input = Tensor::cat_cols(&[source, target, edge_attr]);
        self.edge_mlp.forward(&input)
    }

    /// Width the update network expects.
    #[must_use]
    pub fn in_dim(&self) -> usize {
        self.edge_mlp.in_dim()
    }

    pub(crate) fn mlp(&self) -> &Mlp {
        &self.edge_mlp
    }

    pub(crate) fn mlp_mut(&mut self) -> &mut Mlp {
        &mut self.edge_mlp
    }
}
