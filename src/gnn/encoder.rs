//! Independent node/edge networks used before and after message passing.

use super::config::GraphIndependentConfig;
use crate::error::{MpnError, Result};
use crate::nn::{Mlp, Module};
use crate::tensor::Tensor;

/// Applies one MLP to node features and another to edge features, with no
/// interaction between the two. Used as the initial encoder and, with only
/// the edge stream configured, as the edge classifier.
///
/// A stream without a network passes its input through; if the config names
/// an output width for it, the input must already have that width.
#[derive(Debug)]
pub struct GraphIndependent {
    node_mlp: Option<Mlp>,
    edge_mlp: Option<Mlp>,
    node_width: Option<usize>,
    edge_width: Option<usize>,
}

impl GraphIndependent {
    /// Build from a config. `name` prefixes configuration errors; network
    /// `i` (edge = 0, node = 1) is seeded from `seed + (i << 8)`.
    pub fn new(config: &GraphIndependentConfig, name: &str, seed: Option<u64>) -> Result<Self> {
        let edge_mlp = config
            .edge_mlp(name)?
            .map(|(in_dim, mlp)| Mlp::new(in_dim, &mlp, seed))
            .transpose()?;
        let node_mlp = config
            .node_mlp(name)?
            .map(|(in_dim, mlp)| Mlp::new(in_dim, &mlp, seed.map(|s| s.wrapping_add(1 << 8))))
            .transpose()?;

        Ok(Self {
            node_mlp,
            edge_mlp,
            node_width: config.node_out_dim,
            edge_width: config.edge_out_dim,
        })
    }

    /// Encode edge features, or return them unchanged when no edge network exists.
    pub fn forward_edges(&self, edge_feats: &Tensor) -> Result<Tensor> {
        apply(self.edge_mlp.as_ref(), self.edge_width, edge_feats)
    }

    /// Encode node features, or return them unchanged when no node network exists.
    pub fn forward_nodes(&self, node_feats: &Tensor) -> Result<Tensor> {
        apply(self.node_mlp.as_ref(), self.node_width, node_feats)
    }

    /// Encode both streams; returns `(edges, nodes)`.
    pub fn forward(&self, edge_feats: &Tensor, node_feats: &Tensor) -> Result<(Tensor, Tensor)> {
        Ok((self.forward_edges(edge_feats)?, self.forward_nodes(node_feats)?))
    }

    /// Whether an edge network is configured.
    #[must_use]
    pub fn has_edge_mlp(&self) -> bool {
        self.edge_mlp.is_some()
    }

    /// Whether a node network is configured.
    #[must_use]
    pub fn has_node_mlp(&self) -> bool {
        self.node_mlp.is_some()
    }

    fn mlps(&self) -> impl Iterator<Item = &Mlp> {
        self.edge_mlp.iter().chain(self.node_mlp.iter())
    }

    fn mlps_mut(&mut self) -> impl Iterator<Item = &mut Mlp> {
        self.edge_mlp.iter_mut().chain(self.node_mlp.iter_mut())
    }
}

/// Run `mlp`, or pass `input` through when there is none. Either way the
/// input width is checked first: the network's input width, or the declared
/// pass-through width.
fn apply(mlp: Option<&Mlp>, passthrough_width: Option<usize>, input: &Tensor) -> Result<Tensor> {
    let expected = match mlp {
        Some(mlp) => Some(mlp.in_dim()),
        None => passthrough_width,
    };
    if let Some(width) = expected {
        if input.ndim() != 2 || input.cols() != width {
            return Err(MpnError::DimensionMismatch {
                expected: format!("[_, {width}]"),
                actual: format!("{:?}", input.shape()),
            });
        }
    }
    Ok(match mlp {
        Some(mlp) => mlp.forward(input),
        None => input.clone(),
    })
}

impl Module for GraphIndependent {
    /// Edge stream only; the classifier path.
    fn forward(&self, input: &Tensor) -> Tensor {
        match &self.edge_mlp {
            Some(mlp) => mlp.forward(input),
            None => input.clone(),
        }
    }

    fn parameters(&self) -> Vec<&Tensor> {
        self.mlps().flat_map(Module::parameters).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.mlps_mut().flat_map(Module::parameters_mut).collect()
    }

    fn train(&mut self) {
        self.mlps_mut().for_each(Module::train);
    }

    fn eval(&mut self) {
        self.mlps_mut().for_each(Module::eval);
    }

    fn training(&self) -> bool {
        self.mlps().any(Module::training)
    }

    fn refresh_caches(&mut self) {
        self.mlps_mut().for_each(Module::refresh_caches);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder_config() -> GraphIndependentConfig {
        GraphIndependentConfig {
            edge_in_dim: Some(6),
            node_in_dim: Some(10),
            edge_out_dim: Some(16),
            node_out_dim: Some(32),
            node_fc_dims: vec![20],
            edge_fc_dims: vec![18, 18],
            dropout_p: None,
            use_batchnorm: false,
        }
    }

    #[test]
    fn test_encoder_output_widths() {
        let enc = GraphIndependent::new(&encoder_config(), "encoder", Some(3)).unwrap();
        let (edges, nodes) = enc
            .forward(&Tensor::ones(&[7, 6]), &Tensor::ones(&[4, 10]))
            .unwrap();
        assert_eq!(edges.shape(), &[7, 16]);
        assert_eq!(nodes.shape(), &[4, 32]);
    }

    #[test]
    fn test_unconfigured_stream_passes_through() {
        let config = GraphIndependentConfig {
            edge_in_dim: Some(16),
            edge_out_dim: Some(1),
            edge_fc_dims: vec![8],
            ..GraphIndependentConfig::default()
        };
        let classifier = GraphIndependent::new(&config, "classifier", None).unwrap();
        assert!(classifier.has_edge_mlp());
        assert!(!classifier.has_node_mlp());

        let nodes = Tensor::new(&[1.0, 2.0, 3.0], &[1, 3]);
        assert_eq!(classifier.forward_nodes(&nodes).unwrap(), nodes);
        assert_eq!(
            classifier.forward_edges(&Tensor::ones(&[5, 16])).unwrap().shape(),
            &[5, 1]
        );
    }

    #[test]
    fn test_wrong_input_width_is_error() {
        let enc = GraphIndependent::new(&encoder_config(), "encoder", None).unwrap();
        let err = enc.forward_nodes(&Tensor::ones(&[4, 9])).unwrap_err();
        assert!(matches!(err, MpnError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_passthrough_stream_checks_declared_width() {
        let config = GraphIndependentConfig {
            node_in_dim: Some(10),
            node_out_dim: Some(32),
            edge_out_dim: Some(16),
            ..GraphIndependentConfig::default()
        };
        let enc = GraphIndependent::new(&config, "encoder", None).unwrap();
        assert!(!enc.has_edge_mlp());

        let edges = Tensor::ones(&[3, 16]);
        assert_eq!(enc.forward_edges(&edges).unwrap(), edges);

        let err = enc.forward_edges(&Tensor::ones(&[3, 5])).unwrap_err();
        assert!(matches!(err, MpnError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_missing_out_dim_is_config_error() {
        let mut config = encoder_config();
        config.edge_out_dim = None;
        let err = GraphIndependent::new(&config, "encoder", None).unwrap_err();
        assert!(err.to_string().contains("encoder.edge_out_dim"));
    }

    #[test]
    fn test_parameter_count_covers_both_streams() {
        let enc = GraphIndependent::new(&encoder_config(), "encoder", None).unwrap();
        let edge = (6 * 18 + 18) + (18 * 18 + 18) + (18 * 16 + 16);
        let node = (10 * 20 + 20) + (20 * 32 + 32);
        assert_eq!(enc.num_parameters(), edge + node);
    }
}
