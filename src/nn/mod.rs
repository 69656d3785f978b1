//! Neural network layers for the message-passing core.
//!
//! Everything is organized around the [`Module`] trait:
//!
//! - **Layers**: [`Linear`]
//! - **Activations**: [`ReLU`], [`Sigmoid`]
//! - **Normalization**: [`BatchNorm1d`]
//! - **Regularization**: [`Dropout`]
//! - **Containers**: [`Sequential`], [`Mlp`]
//!
//! # Example
//!
//! ```
//! use mot_mpn::nn::{Linear, Module, ReLU, Sequential};
//! use mot_mpn::tensor::Tensor;
//!
//! let model = Sequential::new()
//!     .add(Linear::with_seed(64, 32, Some(0)))
//!     .add(ReLU::new())
//!     .add(Linear::with_seed(32, 1, Some(1)));
//!
//! let output = model.forward(&Tensor::ones(&[10, 64]));
//! assert_eq!(output.shape(), &[10, 1]);
//! ```

mod activation;
mod container;
mod dropout;
mod init;
mod linear;
mod mlp;
mod module;
mod normalization;

pub use activation::{ReLU, Sigmoid};
pub use container::Sequential;
pub use dropout::Dropout;
pub use init::xavier_uniform;
pub use linear::Linear;
pub use mlp::{Mlp, MlpConfig};
pub use module::Module;
pub use normalization::BatchNorm1d;
