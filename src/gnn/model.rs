//! Top-level tracking model: encode, pass messages, classify edges.

use super::appearance::{append_embedding_distance, embed_crops, AppearanceEncoder};
use super::config::MpnConfig;
use super::edge_model::EdgeModel;
use super::encoder::GraphIndependent;
use super::graph::{GraphSnapshot, NodeInput};
use super::meta_layer::MetaLayer;
use super::node_model::TimeAwareNodeModel;
use super::scatter::Aggregation;
use crate::error::{MpnError, Result};
use crate::nn::{Linear, Mlp, Module, ReLU, Sequential, Sigmoid};
use crate::tensor::Tensor;
use std::borrow::Cow;
use tracing::{debug, info, trace};

/// Seed offsets so every network draws different initial weights.
const ENCODER_STREAM: u64 = 0;
const CLASSIFIER_STREAM: u64 = 1;
const EDGE_MODEL_STREAM: u64 = 2;
const FLOW_FORWARD_STREAM: u64 = 3;
const FLOW_BACKWARD_STREAM: u64 = 4;
const NODE_MERGE_STREAM: u64 = 5;

fn stream_seed(seed: Option<u64>, stream: u64) -> Option<u64> {
    seed.map(|s| s.wrapping_add(stream << 16))
}

/// Results of one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MpnOutput {
    /// Edge logits `[num_edges, 1]` of every classified round, oldest first.
    pub classified_edges: Vec<Tensor>,
    /// Node embeddings: the encoder output, then one per classified round.
    pub node_feats: Vec<Tensor>,
}

impl MpnOutput {
    /// Logits of the last classified round.
    #[must_use]
    pub fn final_logits(&self) -> Option<&Tensor> {
        self.classified_edges.last()
    }

    /// Sigmoid of the last round's logits: one "same identity" probability per edge.
    #[must_use]
    pub fn edge_probabilities(&self) -> Option<Vec<f32>> {
        self.final_logits().map(|logits| logits.sigmoid().into_vec())
    }
}

/// Message-passing network for multi-object-tracking data association.
///
/// Owns the encoder, one shared [`MetaLayer`] reused every round, the node
/// merge network, the edge classifier and an optional appearance encoder.
///
/// ```
/// use mot_mpn::gnn::{EdgeIndex, GraphSnapshot, MotMpNet, MpnConfig};
/// use mot_mpn::tensor::Tensor;
///
/// let mut config = MpnConfig::default();
/// config.encoder.node_in_dim = Some(8);
/// config.num_enc_steps = 3;
/// config.num_class_steps = 2;
/// config.seed = Some(7);
///
/// let mut model = MotMpNet::new(&config).unwrap();
/// model.eval();
///
/// let graph = GraphSnapshot::from_features(
///     Tensor::ones(&[3, 8]),
///     EdgeIndex::from_pairs(&[[0, 1], [1, 0], [1, 2], [2, 1]]),
///     Tensor::ones(&[4, 6]),
/// )
/// .unwrap();
///
/// let out = model.forward(&graph).unwrap();
/// assert_eq!(out.classified_edges.len(), 2);
/// assert_eq!(out.classified_edges[0].shape(), &[4, 1]);
/// ```
pub struct MotMpNet {
    encoder: GraphIndependent,
    classifier: GraphIndependent,
    mpnet: MetaLayer,
    node_merge: Sequential,
    appearance: Option<Box<dyn AppearanceEncoder>>,
    aggregation: Aggregation,
    reattach_initial_nodes: bool,
    reattach_initial_edges: bool,
    num_enc_steps: usize,
    num_class_steps: usize,
    first_class_step: usize,
    training: bool,
}

impl MotMpNet {
    /// Validate `config` and build every network.
    ///
    /// The model starts in training mode; call [`MotMpNet::eval`] for
    /// deterministic inference.
    pub fn new(config: &MpnConfig) -> Result<Self> {
        config.validate()?;
        let seed = config.seed;
        let node_dim = config.node_dim();

        let encoder = GraphIndependent::new(
            &config.encoder,
            "encoder",
            stream_seed(seed, ENCODER_STREAM),
        )?;
        let classifier = GraphIndependent::new(
            &config.classifier,
            "classifier",
            stream_seed(seed, CLASSIFIER_STREAM),
        )?;

        let edge_mlp = Mlp::new(
            config.edge_model_in_dim(),
            &config.edge_model,
            stream_seed(seed, EDGE_MODEL_STREAM),
        )?;
        let flow_forward_mlp = Mlp::new(
            config.node_model_in_dim(),
            &config.node_model,
            stream_seed(seed, FLOW_FORWARD_STREAM),
        )?;
        let flow_backward_mlp = Mlp::new(
            config.node_model_in_dim(),
            &config.node_model,
            stream_seed(seed, FLOW_BACKWARD_STREAM),
        )?;
        let mpnet = MetaLayer::new(
            EdgeModel::new(edge_mlp),
            TimeAwareNodeModel::new(flow_forward_mlp, flow_backward_mlp),
        );

        let node_merge = Sequential::new()
            .add(Linear::with_seed(
                2 * node_dim,
                node_dim,
                stream_seed(seed, NODE_MERGE_STREAM),
            ))
            .add(ReLU::new());

        info!(
            node_dim,
            edge_dim = config.edge_dim(),
            edge_model_in = config.edge_model_in_dim(),
            node_model_in = config.node_model_in_dim(),
            aggregation = %config.node_agg_fn,
            num_enc_steps = config.num_enc_steps,
            num_class_steps = config.num_class_steps,
            "built message passing network"
        );

        Ok(Self {
            encoder,
            classifier,
            mpnet,
            node_merge,
            appearance: None,
            aggregation: config.node_agg_fn,
            reattach_initial_nodes: config.reattach_initial_nodes,
            reattach_initial_edges: config.reattach_initial_edges,
            num_enc_steps: config.num_enc_steps,
            num_class_steps: config.num_class_steps,
            first_class_step: config.first_class_step(),
            training: true,
        })
    }

    /// Attach an encoder for graphs whose nodes are image crops.
    #[must_use]
    pub fn with_appearance_encoder(mut self, encoder: impl AppearanceEncoder + 'static) -> Self {
        self.appearance = Some(Box::new(encoder));
        self
    }

    /// Whether an appearance encoder is attached.
    #[must_use]
    pub fn has_appearance_encoder(&self) -> bool {
        self.appearance.is_some()
    }

    /// Aggregation used for node messages.
    #[must_use]
    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    /// First round (1-based) whose edges are classified.
    #[must_use]
    pub fn first_class_step(&self) -> usize {
        self.first_class_step
    }

    /// Run the full encode / message-passing / classify schedule on `graph`.
    ///
    /// Returns `num_class_steps` logit tensors (exactly one when there are
    /// no message-passing rounds). Fails without partial output if the
    /// graph's feature widths do not match the encoder.
    pub fn forward(&self, graph: &GraphSnapshot) -> Result<MpnOutput> {
        let edge_index = graph.edge_index();
        let (node_input, edge_input) = self.prepare_inputs(graph)?;

        let (mut latent_edges, mut latent_nodes) =
            self.encoder.forward(&edge_input, &node_input)?;
        let initial_edges = latent_edges.clone();
        let initial_nodes = latent_nodes.clone();

        let mut output = MpnOutput {
            classified_edges: Vec::with_capacity(self.num_class_steps.max(1)),
            node_feats: vec![latent_nodes.clone()],
        };

        for step in 1..=self.num_enc_steps {
            if self.reattach_initial_edges {
                latent_edges = Tensor::cat_cols(&[&initial_edges, &latent_edges]);
            }
            if self.reattach_initial_nodes {
                latent_nodes = Tensor::cat_cols(&[&initial_nodes, &latent_nodes]);
            }

            let (messages, new_edges) = self
                .mpnet
                .forward(&latent_nodes, edge_index, &latent_edges);
            latent_edges = new_edges;

            let classify = step >= self.first_class_step;
            debug!(
                step,
                classify,
                forward_messages = messages.forward.rows(),
                backward_messages = messages.backward.rows(),
                "message passing round"
            );

            if classify {
                let logits = self.classifier.forward_edges(&latent_edges)?;
                let weights = Sigmoid::new().forward(&logits);
                let flow = messages.aggregate(self.aggregation, Some(weights.data()));
                latent_nodes = self.node_merge.forward(&flow);
                output.classified_edges.push(logits);
                output.node_feats.push(latent_nodes.clone());
            } else {
                let flow = messages.aggregate(self.aggregation, None);
                latent_nodes = self.node_merge.forward(&flow);
            }
        }

        if self.num_enc_steps == 0 {
            output
                .classified_edges
                .push(self.classifier.forward_edges(&latent_edges)?);
        }

        trace!(
            rounds = self.num_enc_steps,
            outputs = output.classified_edges.len(),
            "forward pass complete"
        );
        Ok(output)
    }

    /// Resolve node features (running the appearance encoder on crops) and
    /// the matching edge features.
    fn prepare_inputs<'g>(
        &self,
        graph: &'g GraphSnapshot,
    ) -> Result<(Cow<'g, Tensor>, Cow<'g, Tensor>)> {
        match graph.nodes() {
            NodeInput::Features(feats) => {
                Ok((Cow::Borrowed(feats), Cow::Borrowed(graph.edge_feats())))
            }
            NodeInput::Crops(crops) => {
                let encoder = self
                    .appearance
                    .as_deref()
                    .ok_or(MpnError::MissingAppearanceEncoder)?;
                let embeddings = embed_crops(encoder, crops)?;
                let edges =
                    append_embedding_distance(graph.edge_feats(), &embeddings, graph.edge_index());
                Ok((Cow::Owned(embeddings), Cow::Owned(edges)))
            }
        }
    }

    /// Switch every network to training mode (dropout and batch statistics on).
    pub fn train(&mut self) {
        self.training = true;
        self.for_each_module(|m| m.train());
    }

    /// Switch every network to evaluation mode.
    pub fn eval(&mut self) {
        self.training = false;
        self.for_each_module(|m| m.eval());
    }

    /// Whether the model is in training mode.
    #[must_use]
    pub fn training(&self) -> bool {
        self.training
    }

    /// Recompute cached tensors after weights were edited through
    /// [`MotMpNet::parameters_mut`].
    pub fn refresh_caches(&mut self) {
        self.for_each_module(|m| m.refresh_caches());
    }

    /// All learnable tensors: encoder, classifier, edge model, both flow
    /// networks, node merge.
    #[must_use]
    pub fn parameters(&self) -> Vec<&Tensor> {
        let [edge, fwd, bwd] = self.mpnet.mlps();
        let mut params = self.encoder.parameters();
        params.extend(self.classifier.parameters());
        params.extend(edge.parameters());
        params.extend(fwd.parameters());
        params.extend(bwd.parameters());
        params.extend(self.node_merge.parameters());
        params
    }

    /// Mutable access to all learnable tensors, same order as [`MotMpNet::parameters`].
    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let [edge, fwd, bwd] = self.mpnet.mlps_mut();
        let mut params = self.encoder.parameters_mut();
        params.extend(self.classifier.parameters_mut());
        params.extend(edge.parameters_mut());
        params.extend(fwd.parameters_mut());
        params.extend(bwd.parameters_mut());
        params.extend(self.node_merge.parameters_mut());
        params
    }

    /// Total number of learnable scalars.
    #[must_use]
    pub fn num_parameters(&self) -> usize {
        self.parameters().iter().map(|p| p.numel()).sum()
    }

    fn for_each_module(&mut self, mut f: impl FnMut(&mut dyn Module)) {
        f(&mut self.encoder);
        f(&mut self.classifier);
        for mlp in self.mpnet.mlps_mut() {
            f(mlp);
        }
        f(&mut self.node_merge);
    }
}

impl std::fmt::Debug for MotMpNet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotMpNet")
            .field("aggregation", &self.aggregation)
            .field("num_enc_steps", &self.num_enc_steps)
            .field("num_class_steps", &self.num_class_steps)
            .field("reattach_initial_nodes", &self.reattach_initial_nodes)
            .field("reattach_initial_edges", &self.reattach_initial_edges)
            .field("appearance", &self.appearance.is_some())
            .field("training", &self.training)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
