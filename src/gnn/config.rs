//! Model hyperparameters.
//!
//! `MpnConfig` mirrors the parameter files used to train tracking models:
//! encoder/classifier feature dictionaries, edge/node update networks, the
//! aggregation function and the message-passing schedule. All cross-network
//! width constraints are checked by [`MpnConfig::validate`] before any layer
//! is built.

use super::scatter::Aggregation;
use crate::error::{MpnError, Result};
use crate::nn::MlpConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Two independent optional MLPs, one for nodes and one for edges.
///
/// A stream whose `*_in_dim` is `None` has no network and passes through
/// unchanged; its `*_out_dim` then names the width it is expected to have.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphIndependentConfig {
    /// Raw edge feature width, `None` for pass-through.
    #[serde(default)]
    pub edge_in_dim: Option<usize>,
    /// Raw node feature width, `None` for pass-through.
    #[serde(default)]
    pub node_in_dim: Option<usize>,
    /// Edge output width.
    #[serde(default)]
    pub edge_out_dim: Option<usize>,
    /// Node output width.
    #[serde(default)]
    pub node_out_dim: Option<usize>,
    /// Hidden widths of the node network.
    #[serde(default)]
    pub node_fc_dims: Vec<usize>,
    /// Hidden widths of the edge network.
    #[serde(default)]
    pub edge_fc_dims: Vec<usize>,
    /// Dropout after every hidden activation of both networks.
    #[serde(default)]
    pub dropout_p: Option<f32>,
    /// Batch normalization in both networks.
    #[serde(default)]
    pub use_batchnorm: bool,
}

impl GraphIndependentConfig {
    /// Layer spec of the edge network, `None` when edges pass through.
    pub fn edge_mlp(&self, name: &str) -> Result<Option<(usize, MlpConfig)>> {
        self.stream_mlp(name, "edge", self.edge_in_dim, self.edge_out_dim, &self.edge_fc_dims)
    }

    /// Layer spec of the node network, `None` when nodes pass through.
    pub fn node_mlp(&self, name: &str) -> Result<Option<(usize, MlpConfig)>> {
        self.stream_mlp(name, "node", self.node_in_dim, self.node_out_dim, &self.node_fc_dims)
    }

    fn stream_mlp(
        &self,
        name: &str,
        stream: &str,
        in_dim: Option<usize>,
        out_dim: Option<usize>,
        fc_dims: &[usize],
    ) -> Result<Option<(usize, MlpConfig)>> {
        let Some(in_dim) = in_dim else {
            return Ok(None);
        };
        let Some(out_dim) = out_dim else {
            return Err(MpnError::hyperparameter(
                format!("{name}.{stream}_out_dim"),
                "none",
                format!("a width when {stream}_in_dim is set"),
            ));
        };
        if in_dim == 0 {
            return Err(MpnError::hyperparameter(
                format!("{name}.{stream}_in_dim"),
                0,
                "a non-zero width",
            ));
        }

        let mut dims = fc_dims.to_vec();
        dims.push(out_dim);
        let mlp = MlpConfig {
            fc_dims: dims,
            dropout_p: self.dropout_p,
            use_batchnorm: self.use_batchnorm,
        };
        mlp.validate(&format!("{name}.{stream}"))?;
        Ok(Some((in_dim, mlp)))
    }
}

/// Full model configuration.
///
/// Field aliases accept the `*_feats_dict` key names of older parameter
/// files.
///
/// ```
/// use mot_mpn::gnn::{Aggregation, MpnConfig};
///
/// let config = MpnConfig::default();
/// config.validate().unwrap();
/// assert_eq!(config.node_agg_fn, Aggregation::Sum);
/// assert_eq!(config.edge_model_in_dim(), 2 * 2 * 32 + 2 * 16);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpnConfig {
    /// Initial node/edge encoder.
    #[serde(alias = "encoder_feats_dict")]
    pub encoder: GraphIndependentConfig,
    /// Edge classifier; only its edge stream is used.
    #[serde(alias = "classifier_feats_dict")]
    pub classifier: GraphIndependentConfig,
    /// Edge update network layers.
    #[serde(alias = "edge_model_feats_dict")]
    pub edge_model: MlpConfig,
    /// Layers of each of the two flow networks in the node update.
    #[serde(alias = "node_model_feats_dict")]
    pub node_model: MlpConfig,
    /// How node messages are reduced.
    #[serde(default)]
    pub node_agg_fn: Aggregation,
    /// Concatenate the encoder node embedding before every round.
    #[serde(default)]
    pub reattach_initial_nodes: bool,
    /// Concatenate the encoder edge embedding before every round.
    #[serde(default)]
    pub reattach_initial_edges: bool,
    /// Number of message-passing rounds (R).
    pub num_enc_steps: usize,
    /// Number of trailing rounds whose edges are classified (C).
    pub num_class_steps: usize,
    /// Seed for weight initialization and dropout; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for MpnConfig {
    fn default() -> Self {
        Self {
            encoder: GraphIndependentConfig {
                edge_in_dim: Some(6),
                node_in_dim: Some(2048),
                edge_out_dim: Some(16),
                node_out_dim: Some(32),
                node_fc_dims: vec![128],
                edge_fc_dims: vec![18, 18],
                dropout_p: None,
                use_batchnorm: false,
            },
            classifier: GraphIndependentConfig {
                edge_in_dim: Some(16),
                edge_out_dim: Some(1),
                edge_fc_dims: vec![8],
                ..GraphIndependentConfig::default()
            },
            edge_model: MlpConfig::new(vec![80, 16]),
            node_model: MlpConfig::new(vec![56, 32]),
            node_agg_fn: Aggregation::Sum,
            reattach_initial_nodes: true,
            reattach_initial_edges: true,
            num_enc_steps: 12,
            num_class_steps: 11,
            seed: None,
        }
    }
}

impl MpnConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Encoded node width.
    #[must_use]
    pub fn node_dim(&self) -> usize {
        self.encoder.node_out_dim.unwrap_or(0)
    }

    /// Encoded edge width.
    #[must_use]
    pub fn edge_dim(&self) -> usize {
        self.encoder.edge_out_dim.unwrap_or(0)
    }

    fn node_factor(&self) -> usize {
        if self.reattach_initial_nodes {
            2
        } else {
            1
        }
    }

    fn edge_factor(&self) -> usize {
        if self.reattach_initial_edges {
            2
        } else {
            1
        }
    }

    /// Node width entering a round, including a reattached initial embedding.
    #[must_use]
    pub fn round_node_dim(&self) -> usize {
        self.node_factor() * self.node_dim()
    }

    /// Edge width entering a round, including a reattached initial embedding.
    #[must_use]
    pub fn round_edge_dim(&self) -> usize {
        self.edge_factor() * self.edge_dim()
    }

    /// Input width of the edge update network: `[source | target | edge]`.
    #[must_use]
    pub fn edge_model_in_dim(&self) -> usize {
        2 * self.round_node_dim() + self.round_edge_dim()
    }

    /// Input width of each flow network: `[destination node | updated edge]`.
    #[must_use]
    pub fn node_model_in_dim(&self) -> usize {
        self.round_node_dim() + self.edge_dim()
    }

    /// First round (1-based) whose edges are classified.
    #[must_use]
    pub fn first_class_step(&self) -> usize {
        self.num_enc_steps + 1 - self.num_class_steps.min(self.num_enc_steps)
    }

    /// Check every width and schedule constraint.
    pub fn validate(&self) -> Result<()> {
        self.encoder.edge_mlp("encoder")?;
        self.encoder.node_mlp("encoder")?;
        let node_dim = nonzero(self.encoder.node_out_dim, "encoder.node_out_dim")?;
        let edge_dim = nonzero(self.encoder.edge_out_dim, "encoder.edge_out_dim")?;

        let Some((classifier_in, classifier_mlp)) = self.classifier.edge_mlp("classifier")? else {
            return Err(MpnError::hyperparameter(
                "classifier.edge_in_dim",
                "none",
                "an edge classifier network",
            ));
        };
        if classifier_in != edge_dim {
            return Err(width_mismatch("classifier.edge_in_dim", edge_dim, classifier_in));
        }
        if classifier_mlp.out_dim() != Some(1) {
            return Err(MpnError::hyperparameter(
                "classifier.edge_out_dim",
                classifier_mlp.out_dim().unwrap_or(0),
                "1 (one logit per edge)",
            ));
        }

        self.edge_model.validate("edge_model")?;
        let edge_out = self.edge_model.out_dim().unwrap_or(0);
        if edge_out != edge_dim {
            return Err(width_mismatch("edge_model.fc_dims (output)", edge_dim, edge_out));
        }

        self.node_model.validate("node_model")?;
        let node_out = self.node_model.out_dim().unwrap_or(0);
        if node_out != node_dim {
            return Err(width_mismatch("node_model.fc_dims (output)", node_dim, node_out));
        }

        if self.num_class_steps > self.num_enc_steps {
            return Err(MpnError::hyperparameter(
                "num_class_steps",
                self.num_class_steps,
                format!("at most num_enc_steps ({})", self.num_enc_steps),
            ));
        }

        Ok(())
    }
}

fn nonzero(value: Option<usize>, param: &str) -> Result<usize> {
    match value {
        Some(v) if v > 0 => Ok(v),
        other => Err(MpnError::hyperparameter(
            param,
            other.map_or_else(|| "none".to_string(), |v| v.to_string()),
            "a non-zero width",
        )),
    }
}

fn width_mismatch(param: &str, expected: usize, actual: usize) -> MpnError {
    MpnError::DimensionMismatch {
        expected: format!("{param} = {expected}"),
        actual: actual.to_string(),
    }
}
