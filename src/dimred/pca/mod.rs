use std::cmp::Ordering;

use anyhow::{anyhow, bail};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;

pub struct PcaBuilder {
    n_components: Option<usize>,
}

impl PcaBuilder {
    pub fn new() -> Self {
        PcaBuilder {
            n_components: None,
        }
    }

    pub fn n_components(mut self, n_components: usize) -> Self {
        self.n_components = Some(n_components);
        self
    }

    pub fn build(self) -> Pca {
        Pca {
            n_components: self.n_components,
            components: None,
            mean: None,
            explained_variance_ratio: None,
            eigenvalues: None,
        }
    }
}

impl Default for PcaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Dense PCA through the eigendecomposition of the feature covariance.
///
/// Components are ordered by decreasing eigenvalue. Only suited to inputs with
/// a moderate number of features since the covariance is `n_features^2`.
pub struct Pca {
    n_components: Option<usize>,
    components: Option<Array2<f64>>,
    mean: Option<Array1<f64>>,
    explained_variance_ratio: Option<Array1<f64>>,
    eigenvalues: Option<Array1<f64>>,
}

impl Pca {
    pub fn builder() -> PcaBuilder {
        PcaBuilder::new()
    }

    pub fn fit(&mut self, x: ArrayView2<f64>) -> anyhow::Result<()> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            bail!(
                "Cannot fit PCA on an empty matrix ({} x {})",
                n_samples,
                n_features
            );
        }
        let n_components = self.n_components.unwrap_or(n_features).min(n_features);

        // Center the data
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| anyhow!("Failed to compute column means"))?;
        let x_preprocessed = Self::preprocess(x, &mean);

        // Eigendecomposition of the (unscaled) covariance
        let covariance = x_preprocessed.t().dot(&x_preprocessed);
        let eigen = SymmetricEigen::new(DMatrix::from_fn(n_features, n_features, |i, j| {
            covariance[[i, j]]
        }));

        // Largest eigenvalue first
        let mut order: Vec<usize> = (0..n_features).collect();
        order.sort_by(|&a, &b| {
            eigen.eigenvalues[b]
                .partial_cmp(&eigen.eigenvalues[a])
                .unwrap_or(Ordering::Equal)
        });

        let components = Array2::from_shape_fn((n_components, n_features), |(c, f)| {
            eigen.eigenvectors[(f, order[c])]
        });

        // Sample variance along each component
        let denom = (n_samples.saturating_sub(1)).max(1) as f64;
        let eigenvalues: Array1<f64> = order
            .iter()
            .map(|&i| eigen.eigenvalues[i].max(0.0) / denom)
            .collect();
        let total_variance = eigenvalues.sum();
        let explained_variance_ratio = if total_variance > 0.0 {
            &eigenvalues / total_variance
        } else {
            Array1::zeros(n_features)
        };

        log::debug!(
            "PCA kept {} of {} components ({:.2}% of variance)",
            n_components,
            n_features,
            explained_variance_ratio.slice(s![..n_components]).sum() * 100.0
        );

        self.components = Some(components);
        self.mean = Some(mean);
        self.explained_variance_ratio = Some(
            explained_variance_ratio
                .slice(s![..n_components])
                .to_owned(),
        );
        self.eigenvalues = Some(eigenvalues.slice(s![..n_components]).to_owned());

        Ok(())
    }

    fn preprocess(x: ArrayView2<f64>, mean: &Array1<f64>) -> Array2<f64> {
        let mut x_preprocessed = x.to_owned();
        x_preprocessed
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|mut row| {
                row -= mean;
            });
        x_preprocessed
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
        let (components, mean) = match (&self.components, &self.mean) {
            (Some(components), Some(mean)) => (components, mean),
            _ => bail!("PCA has not been fitted yet"),
        };
        if x.ncols() != components.ncols() {
            bail!(
                "Expected {} features, got {}",
                components.ncols(),
                x.ncols()
            );
        }
        let x_preprocessed = Self::preprocess(x, mean);
        Ok(x_preprocessed.dot(&components.t()))
    }

    pub fn fit_transform(&mut self, x: ArrayView2<f64>) -> anyhow::Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn components(&self) -> Option<&Array2<f64>> {
        self.components.as_ref()
    }

    pub fn explained_variance_ratio(&self) -> Option<&Array1<f64>> {
        self.explained_variance_ratio.as_ref()
    }

    pub fn eigenvalues(&self) -> Option<&Array1<f64>> {
        self.eigenvalues.as_ref()
    }
}

/// Projects `x` onto its top `max_dims` principal axes when it is wider than
/// that; narrower matrices come back untouched.
pub fn pre_reduce(x: Array2<f64>, max_dims: usize) -> anyhow::Result<Array2<f64>> {
    if x.ncols() <= max_dims {
        return Ok(x);
    }
    log::info!(
        "reducing {} features to {} with PCA before t-SNE",
        x.ncols(),
        max_dims
    );
    Pca::builder()
        .n_components(max_dims)
        .build()
        .fit_transform(x.view())
}
