//! # Dimensionality Reduction
//!
//! The pipeline hands its feature matrix to a [`Reducer`] and gets back one
//! low-dimensional point per row, in the same row order.
//!
//! ## Available
//! - **t-SNE** ([`tsne`]): exact t-SNE for small inputs, Barnes-Hut (via
//!   `bhtsne`) for large ones
//! - **PCA** ([`pca`]): linear pre-reduction applied before t-SNE when the
//!   input is wider than the configured cap

use ndarray::Array2;

pub mod pca;
pub mod tsne;

pub use tsne::{Method, Tsne, TsneConfig, TsneConfigBuilder};

/// A dimensionality-reduction routine.
///
/// Takes an `n_obs x n_features` matrix and returns `n_obs x k` coordinates
/// with row `i` of the output belonging to row `i` of the input.
pub trait Reducer {
    fn reduce(&self, matrix: Array2<f64>) -> anyhow::Result<Array2<f64>>;
}
