//! Grouped reductions of message rows by destination node.
//!
//! `scatter_reduce` is the building block that turns per-edge messages
//! `[M, D]` into per-node aggregates `[N, D]`. Messages may be pre-weighted
//! per row, which is how classification confidences flow back into the node
//! update.

use crate::error::MpnError;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Node aggregation function, fixed for the lifetime of a model.
///
/// Parses case-insensitively from `"mean"`, `"max"` or `"sum"`:
///
/// ```
/// use mot_mpn::gnn::Aggregation;
///
/// let agg: Aggregation = "MAX".parse().unwrap();
/// assert_eq!(agg, Aggregation::Max);
/// assert!("median".parse::<Aggregation>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Aggregation {
    /// Elementwise mean over incoming messages
    Mean,
    /// Elementwise max over incoming messages
    Max,
    /// Elementwise sum over incoming messages (default)
    #[default]
    Sum,
}

impl Aggregation {
    /// Lowercase name as used in configuration files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::Max => "max",
            Aggregation::Sum => "sum",
        }
    }

    /// Reduce `messages` into `dim_size` rows grouped by `index`.
    #[must_use]
    pub fn reduce(self, messages: &Tensor, index: &[usize], dim_size: usize) -> Tensor {
        scatter_reduce(messages, index, dim_size, self, None)
    }

    /// Like [`Aggregation::reduce`], with message `i` multiplied by `weights[i]` first.
    #[must_use]
    pub fn reduce_weighted(
        self,
        messages: &Tensor,
        index: &[usize],
        dim_size: usize,
        weights: &[f32],
    ) -> Tensor {
        scatter_reduce(messages, index, dim_size, self, Some(weights))
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = MpnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Aggregation::Mean),
            "max" => Ok(Aggregation::Max),
            "sum" => Ok(Aggregation::Sum),
            _ => Err(MpnError::hyperparameter(
                "node_agg_fn",
                s,
                "one of 'mean', 'max' or 'sum'",
            )),
        }
    }
}

impl TryFrom<String> for Aggregation {
    type Error = MpnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Aggregation> for String {
    fn from(agg: Aggregation) -> Self {
        agg.as_str().to_string()
    }
}

/// Reduce message rows into `dim_size` output rows.
///
/// Row `i` of `src` is folded into output row `index[i]`, optionally scaled
/// by `weights[i]` beforehand. Output rows that receive no message are zero
/// for every aggregation, including `Max`.
///
/// # Panics
///
/// Panics if `index` (or `weights`) length differs from the number of
/// message rows, or if an index is `>= dim_size`. Graph validation rules
/// both out before the message-passing core runs.
#[must_use]
pub fn scatter_reduce(
    src: &Tensor,
    index: &[usize],
    dim_size: usize,
    aggregation: Aggregation,
    weights: Option<&[f32]>,
) -> Tensor {
    assert_eq!(src.ndim(), 2, "scatter_reduce requires 2D messages");
    assert_eq!(
        src.rows(),
        index.len(),
        "scatter_reduce: {} messages but {} indices",
        src.rows(),
        index.len()
    );
    if let Some(w) = weights {
        assert_eq!(w.len(), index.len(), "scatter_reduce: weight count");
    }

    let cols = src.cols();
    let mut out = match aggregation {
        Aggregation::Max => vec![f32::NEG_INFINITY; dim_size * cols],
        Aggregation::Mean | Aggregation::Sum => vec![0.0f32; dim_size * cols],
    };
    let mut counts = vec![0usize; dim_size];

    for (i, &dst) in index.iter().enumerate() {
        assert!(
            dst < dim_size,
            "scatter_reduce: index {dst} out of range for {dim_size} rows"
        );
        let w = weights.map_or(1.0, |w| w[i]);
        let out_row = &mut out[dst * cols..(dst + 1) * cols];
        match aggregation {
            Aggregation::Max => {
                for (o, &m) in out_row.iter_mut().zip(src.row(i)) {
                    *o = o.max(m * w);
                }
            }
            Aggregation::Mean | Aggregation::Sum => {
                for (o, &m) in out_row.iter_mut().zip(src.row(i)) {
                    *o += m * w;
                }
            }
        }
        counts[dst] += 1;
    }

    for (row, &count) in out.chunks_mut(cols.max(1)).zip(&counts) {
        match (aggregation, count) {
            (_, 0) => row.fill(0.0),
            (Aggregation::Mean, n) => {
                let inv = 1.0 / n as f32;
                for x in row {
                    *x *= inv;
                }
            }
            _ => {}
        }
    }

    Tensor::from_vec(out, &[dim_size, cols])
}

#[cfg(test)]
#[path = "scatter_tests.rs"]
mod tests;
