//! Graph snapshots and the time-aware flow partition.
//!
//! Nodes are detections ordered by frame, so comparing the two endpoint
//! indices of an edge tells whether it points forward or backward in time.

use crate::error::{MpnError, Result};
use crate::tensor::Tensor;

/// Directed edge endpoints in COO form.
///
/// ```
/// use mot_mpn::gnn::EdgeIndex;
///
/// let edges = EdgeIndex::from_pairs(&[[0, 1], [1, 0], [1, 2]]);
/// assert_eq!(edges.len(), 3);
/// assert_eq!(edges.targets(), &[1, 0, 2]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EdgeIndex {
    sources: Vec<usize>,
    targets: Vec<usize>,
}

impl EdgeIndex {
    /// Build from `[source, target]` pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[[usize; 2]]) -> Self {
        Self {
            sources: pairs.iter().map(|e| e[0]).collect(),
            targets: pairs.iter().map(|e| e[1]).collect(),
        }
    }

    /// Build from separate source and target vectors.
    pub fn from_coo(sources: Vec<usize>, targets: Vec<usize>) -> Result<Self> {
        if sources.len() != targets.len() {
            return Err(MpnError::DimensionMismatch {
                expected: format!("{} edge targets", sources.len()),
                actual: format!("{} edge targets", targets.len()),
            });
        }
        Ok(Self { sources, targets })
    }

    /// Number of edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether there are no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Source endpoint of every edge.
    #[must_use]
    pub fn sources(&self) -> &[usize] {
        &self.sources
    }

    /// Target endpoint of every edge.
    #[must_use]
    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    /// Iterate `(source, target)` pairs in edge order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.sources.iter().copied().zip(self.targets.iter().copied())
    }

    /// Check that every endpoint is a valid node index.
    pub fn check_bounds(&self, num_nodes: usize) -> Result<()> {
        for (edge, (src, tgt)) in self.pairs().enumerate() {
            for index in [src, tgt] {
                if index >= num_nodes {
                    return Err(MpnError::IndexOutOfRange {
                        edge,
                        index,
                        num_nodes,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Split of edge positions by time direction.
///
/// Forward-flow edges have `source < target`, backward-flow edges
/// `source > target`. Self-loops fall in neither group, so they never
/// produce node messages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlowPartition {
    forward: Vec<usize>,
    backward: Vec<usize>,
}

impl FlowPartition {
    /// Partition the edges of `edge_index`.
    #[must_use]
    pub fn new(edge_index: &EdgeIndex) -> Self {
        let mut forward = Vec::new();
        let mut backward = Vec::new();
        for (edge, (src, tgt)) in edge_index.pairs().enumerate() {
            match src.cmp(&tgt) {
                std::cmp::Ordering::Less => forward.push(edge),
                std::cmp::Ordering::Greater => backward.push(edge),
                std::cmp::Ordering::Equal => {}
            }
        }
        Self { forward, backward }
    }

    /// Positions of forward-flow edges.
    #[must_use]
    pub fn forward(&self) -> &[usize] {
        &self.forward
    }

    /// Positions of backward-flow edges.
    #[must_use]
    pub fn backward(&self) -> &[usize] {
        &self.backward
    }
}

/// Per-node input of a graph snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeInput {
    /// Precomputed node feature matrix `[num_nodes, features]`.
    Features(Tensor),
    /// Image crops `[num_nodes, channels, height, width]`, turned into
    /// features by an [`AppearanceEncoder`](super::AppearanceEncoder).
    Crops(Tensor),
}

impl NodeInput {
    /// Number of nodes described.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        match self {
            NodeInput::Features(t) | NodeInput::Crops(t) => t.rows(),
        }
    }
}

/// One batch of detections and candidate associations.
///
/// Construction validates the structural invariants: node features are 2D
/// (crops 4D), edge feature row `i` exists for every edge `i`, and every
/// endpoint is a valid node index.
///
/// ```
/// use mot_mpn::gnn::{EdgeIndex, GraphSnapshot};
/// use mot_mpn::tensor::Tensor;
///
/// let graph = GraphSnapshot::from_features(
///     Tensor::zeros(&[3, 4]),
///     EdgeIndex::from_pairs(&[[0, 1], [1, 2]]),
///     Tensor::zeros(&[2, 6]),
/// )
/// .unwrap();
/// assert_eq!(graph.num_nodes(), 3);
///
/// let bad = GraphSnapshot::from_features(
///     Tensor::zeros(&[3, 4]),
///     EdgeIndex::from_pairs(&[[0, 7]]),
///     Tensor::zeros(&[1, 6]),
/// );
/// assert!(bad.is_err());
/// ```
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    nodes: NodeInput,
    edge_index: EdgeIndex,
    edge_feats: Tensor,
}

impl GraphSnapshot {
    /// Validate and build a snapshot.
    pub fn new(nodes: NodeInput, edge_index: EdgeIndex, edge_feats: Tensor) -> Result<Self> {
        let expected_ndim = match &nodes {
            NodeInput::Features(_) => 2,
            NodeInput::Crops(_) => 4,
        };
        let node_tensor = match &nodes {
            NodeInput::Features(t) | NodeInput::Crops(t) => t,
        };
        if node_tensor.ndim() != expected_ndim {
            return Err(MpnError::DimensionMismatch {
                expected: format!("{expected_ndim}D node input"),
                actual: format!("{:?}", node_tensor.shape()),
            });
        }

        if edge_feats.ndim() != 2 || edge_feats.rows() != edge_index.len() {
            return Err(MpnError::DimensionMismatch {
                expected: format!("[{}, _] edge features", edge_index.len()),
                actual: format!("{:?}", edge_feats.shape()),
            });
        }

        edge_index.check_bounds(nodes.num_nodes())?;

        Ok(Self {
            nodes,
            edge_index,
            edge_feats,
        })
    }

    /// Shorthand for a snapshot with a node feature matrix.
    pub fn from_features(
        node_feats: Tensor,
        edge_index: EdgeIndex,
        edge_feats: Tensor,
    ) -> Result<Self> {
        Self::new(NodeInput::Features(node_feats), edge_index, edge_feats)
    }

    /// Per-node input.
    #[must_use]
    pub fn nodes(&self) -> &NodeInput {
        &self.nodes
    }

    /// Edge endpoints.
    #[must_use]
    pub fn edge_index(&self) -> &EdgeIndex {
        &self.edge_index
    }

    /// Edge feature matrix `[num_edges, features]`.
    #[must_use]
    pub fn edge_feats(&self) -> &Tensor {
        &self.edge_feats
    }

    /// Number of nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.num_nodes()
    }

    /// Number of edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edge_index.len()
    }
}
