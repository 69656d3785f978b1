//! Time-aware message passing for multi-object-tracking data association.
//!
//! A tracking graph has one node per detection and directed edges between
//! detections in different frames that could be the same object. Edges
//! whose target lies in a later frame (`source < target`) carry *forward*
//! flow; the rest carry *backward* flow. The network scores every edge with
//! a "same identity" logit.
//!
//! # Architecture
//!
//! ```text
//!  node feats / crops      edge feats
//!        │                     │
//!        ▼                     ▼
//! ┌──────────────────────────────────┐
//! │ GraphIndependent encoder         │
//! └──────────────────────────────────┘
//!        │  ×R rounds (shared weights)
//!        ▼
//! ┌──────────────────────────────────┐
//! │ MetaLayer                        │
//! │  EdgeModel: [src | dst | edge]   │
//! │  TimeAwareNodeModel: fwd / bwd   │
//! └──────────────────────────────────┘
//!        │ [backward agg | forward agg]
//!        ▼
//!   node merge ──► classifier (last C rounds) ──► logits
//! ```
//!
//! # Example
//!
//! ```
//! use mot_mpn::gnn::{EdgeIndex, GraphSnapshot, MotMpNet, MpnConfig};
//! use mot_mpn::tensor::Tensor;
//!
//! let mut config = MpnConfig::default();
//! config.encoder.node_in_dim = Some(4);
//! config.seed = Some(3);
//!
//! let mut model = MotMpNet::new(&config)?;
//! model.eval();
//!
//! let graph = GraphSnapshot::from_features(
//!     Tensor::ones(&[2, 4]),
//!     EdgeIndex::from_pairs(&[[0, 1], [1, 0]]),
//!     Tensor::ones(&[2, 6]),
//! )?;
//! let out = model.forward(&graph)?;
//! assert_eq!(out.classified_edges.len(), 11);
//! # Ok::<(), mot_mpn::MpnError>(())
//! ```

mod appearance;
mod config;
mod edge_model;
mod encoder;
mod graph;
mod meta_layer;
mod model;
mod node_model;
mod scatter;

pub use appearance::{AppearanceEncoder, PAIRWISE_DISTANCE_EPS};
pub use config::{GraphIndependentConfig, MpnConfig};
pub use edge_model::EdgeModel;
pub use encoder::GraphIndependent;
pub use graph::{EdgeIndex, FlowPartition, GraphSnapshot, NodeInput};
pub use meta_layer::MetaLayer;
pub use model::{MotMpNet, MpnOutput};
pub use node_model::{FlowMessages, TimeAwareNodeModel};
pub use scatter::{scatter_reduce, Aggregation};
