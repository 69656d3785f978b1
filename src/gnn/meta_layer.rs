//! One round of message passing: edge update, then node messages.

use super::edge_model::EdgeModel;
use super::graph::EdgeIndex;
use super::node_model::{FlowMessages, TimeAwareNodeModel};
use crate::nn::Mlp;
use crate::tensor::Tensor;

/// Composes an [`EdgeModel`] and a [`TimeAwareNodeModel`].
///
/// The node model sees the edge embeddings produced by the edge model in
/// the same round.
#[derive(Debug)]
pub struct MetaLayer {
    edge_model: EdgeModel,
    node_model: TimeAwareNodeModel,
}

impl MetaLayer {
    /// Compose the two update models.
    #[must_use]
    pub fn new(edge_model: EdgeModel, node_model: TimeAwareNodeModel) -> Self {
        Self {
            edge_model,
            node_model,
        }
    }

    /// Run one round; returns the raw node messages and the new edge embeddings.
    #[must_use]
    pub fn forward(
        &self,
        x: &Tensor,
        edge_index: &EdgeIndex,
        edge_attr: &Tensor,
    ) -> (FlowMessages, Tensor) {
        let source = x.index_select(edge_index.sources());
        let target = x.index_select(edge_index.targets());
        let edge_attr = self.edge_model.forward(&source, &target, edge_attr);

        let messages = self.node_model.forward(x, edge_index, &edge_attr);
        (messages, edge_attr)
    }

    pub(crate) fn mlps(&self) -> [&Mlp; 3] {
        let [fwd, bwd] = self.node_model.mlps();
        [self.edge_model.mlp(), fwd, bwd]
    }

    pub(crate) fn mlps_mut(&mut self) -> [&mut Mlp; 3] {
        let [fwd, bwd] = self.node_model.mlps_mut();
        [self.edge_model.mlp_mut(), fwd, bwd]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{MlpConfig, Module};

    fn layer(node_dim: usize, edge_dim: usize) -> MetaLayer {
        let edge_mlp = Mlp::new(2 * node_dim + edge_dim, &MlpConfig::new(vec![edge_dim]), Some(1))
            .unwrap();
        let fwd = Mlp::new(node_dim + edge_dim, &MlpConfig::new(vec![node_dim]), Some(2)).unwrap();
        let bwd = Mlp::new(node_dim + edge_dim, &MlpConfig::new(vec![node_dim]), Some(3)).unwrap();
        MetaLayer::new(EdgeModel::new(edge_mlp), TimeAwareNodeModel::new(fwd, bwd))
    }

    #[test]
    fn test_meta_layer_shapes() {
        let layer = layer(4, 3);
        let edges = EdgeIndex::from_pairs(&[[0, 1], [1, 0], [1, 2], [2, 1], [0, 2]]);
        let (msgs, edge_attr) = layer.forward(&Tensor::ones(&[3, 4]), &edges, &Tensor::ones(&[5, 3]));

        assert_eq!(edge_attr.shape(), &[5, 3]);
        assert_eq!(msgs.forward.shape(), &[3, 4]);
        assert_eq!(msgs.backward.shape(), &[2, 4]);
    }

    #[test]
    fn test_meta_layer_is_pure() {
        let layer = layer(2, 2);
        let edges = EdgeIndex::from_pairs(&[[0, 1], [1, 0]]);
        let x = Tensor::new(&[0.1, -0.2, 0.3, 0.4], &[2, 2]);
        let e = Tensor::new(&[0.5, 0.6, -0.7, 0.8], &[2, 2]);

        let (m1, e1) = layer.forward(&x, &edges, &e);
        let (m2, e2) = layer.forward(&x, &edges, &e);
        assert_eq!(e1, e2);
        assert_eq!(m1.forward, m2.forward);
        assert_eq!(m1.backward, m2.backward);
    }

    #[test]
    fn test_meta_layer_exposes_three_networks() {
        let layer = layer(4, 3);
        let total: usize = layer.mlps().iter().map(|m| m.num_parameters()).sum();
        assert_eq!(total, (11 * 3 + 3) + 2 * (7 * 4 + 4));
    }
}
