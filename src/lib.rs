//! mot-mpn: time-aware message passing network for multi-object tracking.
//!
//! Given a graph whose nodes are detections and whose edges are candidate
//! associations between detections in different frames, the network
//! predicts a "same identity" logit for every edge. Node updates separate
//! messages arriving from the past (forward flow) from messages arriving
//! from the future (backward flow).
//!
//! # Quick Start
//!
//! ```
//! use mot_mpn::gnn::{EdgeIndex, GraphSnapshot, MotMpNet, MpnConfig};
//! use mot_mpn::tensor::Tensor;
//!
//! // Two frames, two detections each, edges in both directions.
//! let mut config = MpnConfig::default();
//! config.encoder.node_in_dim = Some(3);
//! config.num_enc_steps = 4;
//! config.num_class_steps = 2;
//! config.seed = Some(42);
//!
//! let mut model = MotMpNet::new(&config)?;
//! model.eval();
//!
//! let graph = GraphSnapshot::from_features(
//!     Tensor::ones(&[4, 3]),
//!     EdgeIndex::from_pairs(&[[0, 2], [2, 0], [1, 3], [3, 1], [0, 3], [3, 0]]),
//!     Tensor::ones(&[6, 6]),
//! )?;
//! let out = model.forward(&graph)?;
//!
//! assert_eq!(out.classified_edges.len(), 2);
//! assert_eq!(out.edge_probabilities().map(|p| p.len()), Some(6));
//! # Ok::<(), mot_mpn::MpnError>(())
//! ```
//!
//! # Modules
//!
//! - [`tensor`]: Row-major dense tensors and the graph gather/concat ops
//! - [`nn`]: Layers (`Linear`, `BatchNorm1d`, `Dropout`, `Mlp`) and the [`nn::Module`] trait
//! - [`gnn`]: Graph types, scatter aggregation, the message passing model
//! - [`error`]: Error type shared by every fallible operation

pub mod error;
pub mod gnn;
pub mod nn;
pub mod tensor;

pub use error::{MpnError, Result};
