//! Feed-forward stacks built from a list of layer widths.

use super::activation::ReLU;
use super::container::Sequential;
use super::dropout::Dropout;
use super::linear::Linear;
use super::module::Module;
use super::normalization::BatchNorm1d;
use crate::error::{MpnError, Result};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

const DROPOUT_SEED_OFFSET: u64 = 1 << 12;

/// Hidden/output widths plus regularization for one feed-forward network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    /// Width of every layer, last entry is the output width.
    pub fc_dims: Vec<usize>,
    /// Dropout probability after each hidden activation.
    #[serde(default)]
    pub dropout_p: Option<f32>,
    /// Insert batch normalization before each hidden activation.
    #[serde(default)]
    pub use_batchnorm: bool,
}

impl MlpConfig {
    /// Config with the given widths and no regularization.
    #[must_use]
    pub fn new(fc_dims: Vec<usize>) -> Self {
        Self {
            fc_dims,
            dropout_p: None,
            use_batchnorm: false,
        }
    }

    /// Output width, i.e. the last entry of `fc_dims`.
    #[must_use]
    pub fn out_dim(&self) -> Option<usize> {
        self.fc_dims.last().copied()
    }

    /// Check widths and dropout probability. `name` prefixes error messages.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.fc_dims.is_empty() {
            return Err(MpnError::hyperparameter(
                format!("{name}.fc_dims"),
                "[]",
                "at least one layer width",
            ));
        }
        if self.fc_dims.contains(&0) {
            return Err(MpnError::hyperparameter(
                format!("{name}.fc_dims"),
                format!("{:?}", self.fc_dims),
                "non-zero layer widths",
            ));
        }
        if let Some(p) = self.dropout_p {
            if !(0.0..1.0).contains(&p) {
                return Err(MpnError::hyperparameter(
                    format!("{name}.dropout_p"),
                    p,
                    "a probability in [0, 1)",
                ));
            }
        }
        Ok(())
    }
}

/// Multi-layer perceptron.
///
/// For every width `d` in `fc_dims` the stack gets a `Linear` layer; unless
/// `d == 1` (a logit head) it is followed by optional `BatchNorm1d`, `ReLU`
/// and optional `Dropout`, in that order.
///
/// ```
/// use mot_mpn::nn::{Mlp, MlpConfig, Module};
/// use mot_mpn::tensor::Tensor;
///
/// let mlp = Mlp::new(6, &MlpConfig::new(vec![18, 18, 16]), Some(0)).unwrap();
/// assert_eq!(mlp.forward(&Tensor::ones(&[5, 6])).shape(), &[5, 16]);
/// ```
#[derive(Debug)]
pub struct Mlp {
    layers: Sequential,
    in_dim: usize,
    out_dim: usize,
}

impl Mlp {
    /// Build the stack for `in_dim` inputs.
    ///
    /// Layer `i` is initialized from `seed + i` when a seed is given; its
    /// dropout mask stream uses `seed + i + 4096`.
    pub fn new(in_dim: usize, config: &MlpConfig, seed: Option<u64>) -> Result<Self> {
        config.validate("mlp")?;
        if in_dim == 0 {
            return Err(MpnError::hyperparameter("mlp.input_dim", 0, "a non-zero width"));
        }

        let mut layers = Sequential::new();
        let mut width = in_dim;
        for (i, &dim) in config.fc_dims.iter().enumerate() {
            let layer_seed = seed.map(|s| s.wrapping_add(i as u64));
            layers = layers.add(Linear::with_seed(width, dim, layer_seed));
            if dim != 1 {
                if config.use_batchnorm {
                    layers = layers.add(BatchNorm1d::new(dim));
                }
                layers = layers.add(ReLU::new());
                if let Some(p) = config.dropout_p {
                    let dropout_seed = layer_seed.map(|s| s.wrapping_add(DROPOUT_SEED_OFFSET));
                    layers = layers.add(Dropout::build(p, dropout_seed));
                }
            }
            width = dim;
        }

        Ok(Self {
            layers,
            in_dim,
            out_dim: width,
        })
    }

    /// Input width.
    #[must_use]
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    /// Output width.
    #[must_use]
    pub fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Number of layers in the underlying stack (linear + norm + activation + dropout).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

impl Module for Mlp {
    fn forward(&self, input: &Tensor) -> Tensor {
        self.layers.forward(input)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        self.layers.parameters()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        self.layers.parameters_mut()
    }

    fn train(&mut self) {
        self.layers.train();
    }

    fn eval(&mut self) {
        self.layers.eval();
    }

    fn training(&self) -> bool {
        self.layers.training()
    }

    fn refresh_caches(&mut self) {
        self.layers.refresh_caches();
    }
}
