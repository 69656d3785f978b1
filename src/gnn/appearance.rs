//! Pluggable appearance encoders for image crops.
//!
//! The CNN that embeds bounding-box crops lives outside this crate. It is
//! injected as an [`AppearanceEncoder`]; when a graph carries crops, the
//! encoder's output replaces the node features and the embedding distance
//! of each edge's endpoints becomes an extra edge feature column.

use super::graph::EdgeIndex;
use crate::error::{MpnError, Result};
use crate::tensor::Tensor;

/// Offset added inside the L2 norm, matching the usual pairwise-distance convention.
pub const PAIRWISE_DISTANCE_EPS: f32 = 1e-6;

/// Maps a batch of image crops `[N, C, H, W]` to embeddings `[N, D]`.
///
/// Any `Fn(&Tensor) -> Result<Tensor>` closure is an encoder:
///
/// ```
/// use mot_mpn::gnn::AppearanceEncoder;
/// use mot_mpn::tensor::Tensor;
///
/// let mean_pixel = |crops: &Tensor| -> mot_mpn::Result<Tensor> {
///     let n = crops.shape()[0];
///     let per_item = crops.numel() / n.max(1);
///     let means: Vec<f32> = crops
///         .data()
///         .chunks(per_item.max(1))
///         .map(|c| c.iter().sum::<f32>() / per_item as f32)
///         .collect();
///     Ok(Tensor::new(&means, &[n, 1]))
/// };
/// let emb = mean_pixel.embed(&Tensor::ones(&[2, 3, 4, 4])).unwrap();
/// assert_eq!(emb.shape(), &[2, 1]);
/// ```
pub trait AppearanceEncoder: Send + Sync {
    /// Embed every crop in the batch.
    fn embed(&self, crops: &Tensor) -> Result<Tensor>;
}

impl<F> AppearanceEncoder for F
where
    F: Fn(&Tensor) -> Result<Tensor> + Send + Sync,
{
    fn embed(&self, crops: &Tensor) -> Result<Tensor> {
        self(crops)
    }
}

/// Run `encoder` and check it returned one 2D row per crop.
pub(crate) fn embed_crops(encoder: &dyn AppearanceEncoder, crops: &Tensor) -> Result<Tensor> {
    let num_nodes = crops.rows();
    let embeddings = encoder.embed(crops)?;
    if embeddings.ndim() != 2 || embeddings.rows() != num_nodes {
        return Err(MpnError::DimensionMismatch {
            expected: format!("[{num_nodes}, _] appearance embeddings"),
            actual: format!("{:?}", embeddings.shape()),
        });
    }
    Ok(embeddings)
}

/// Append `||emb[src] - emb[tgt] + eps||_2` as a last edge feature column.
#[must_use]
pub(crate) fn append_embedding_distance(
    edge_feats: &Tensor,
    node_embeddings: &Tensor,
    edge_index: &EdgeIndex,
) -> Tensor {
    let src = node_embeddings.index_select(edge_index.sources());
    let tgt = node_embeddings.index_select(edge_index.targets());
    let dist = src.pairwise_distance(&tgt, PAIRWISE_DISTANCE_EPS);
    Tensor::cat_cols(&[edge_feats, &dist])
}
