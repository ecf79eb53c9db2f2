//! t-SNE embedding.
//!
//! Small inputs run through the exact O(n^2) algorithm in [`exact`]; large
//! ones go through the Barnes-Hut approximation of the `bhtsne` crate.

use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;

use anyhow::{anyhow, bail};
use ndarray::{Array2, ArrayView1};

use crate::dimred::pca::pre_reduce;
use crate::dimred::Reducer;
use crate::utils::euclidean;

pub mod exact;

/// Largest input that `Method::Auto` still embeds with exact t-SNE.
pub const EXACT_MAX_SAMPLES: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Auto,
    Exact,
    BarnesHut,
}

impl Method {
    fn resolve(self, n_obs: usize) -> Method {
        match self {
            Method::Auto if n_obs <= EXACT_MAX_SAMPLES => Method::Exact,
            Method::Auto => Method::BarnesHut,
            other => other,
        }
    }
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Method::Auto),
            "exact" => Ok(Method::Exact),
            "barnes-hut" | "barnes_hut" | "bh" => Ok(Method::BarnesHut),
            other => Err(anyhow!(
                "Unknown t-SNE method '{}', expected one of: auto, exact, barnes-hut",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TsneConfig {
    output_dims: u8,
    perplexity: f64,
    initial_dims: usize,
    max_iter: usize,
    theta: f64,
    seed: Option<u64>,
    method: Method,
}

impl TsneConfig {
    pub fn builder() -> TsneConfigBuilder {
        TsneConfigBuilder::new()
    }

    pub fn output_dims(&self) -> usize {
        self.output_dims as usize
    }

    pub fn perplexity(&self) -> f64 {
        self.perplexity
    }

    pub fn initial_dims(&self) -> usize {
        self.initial_dims
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn method(&self) -> Method {
        self.method
    }
}

impl Default for TsneConfig {
    fn default() -> Self {
        TsneConfig {
            output_dims: 2,
            perplexity: 30.0,
            initial_dims: 30,
            max_iter: 1000,
            theta: 0.5,
            seed: None,
            method: Method::Auto,
        }
    }
}

pub struct TsneConfigBuilder {
    config: TsneConfig,
}

impl TsneConfigBuilder {
    pub fn new() -> Self {
        TsneConfigBuilder {
            config: TsneConfig::default(),
        }
    }

    pub fn output_dims(mut self, output_dims: u8) -> Self {
        self.config.output_dims = output_dims;
        self
    }

    pub fn perplexity(mut self, perplexity: f64) -> Self {
        self.config.perplexity = perplexity;
        self
    }

    pub fn initial_dims(mut self, initial_dims: usize) -> Self {
        self.config.initial_dims = initial_dims;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    pub fn theta(mut self, theta: f64) -> Self {
        self.config.theta = theta;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.config.method = method;
        self
    }

    pub fn build(self) -> anyhow::Result<TsneConfig> {
        let config = self.config;
        if config.output_dims == 0 {
            bail!("output dimensionality must be at least 1");
        }
        if !(config.perplexity.is_finite() && config.perplexity > 0.0) {
            bail!("perplexity must be positive, got {}", config.perplexity);
        }
        if config.initial_dims == 0 {
            bail!("initial dimensionality must be at least 1");
        }
        if config.max_iter == 0 {
            bail!("the number of iterations must be at least 1");
        }
        if !(config.theta.is_finite() && config.theta >= 0.0) {
            bail!("theta must be non-negative, got {}", config.theta);
        }
        Ok(config)
    }
}

impl Default for TsneConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// t-SNE as a [`Reducer`].
#[derive(Debug, Clone, Default)]
pub struct Tsne {
    config: TsneConfig,
}

impl Tsne {
    pub fn new(config: TsneConfig) -> Self {
        Tsne { config }
    }

    fn run_barnes_hut(&self, x: Array2<f64>) -> anyhow::Result<Array2<f64>> {
        fn euclidean_distance(a: &&[f64], b: &&[f64]) -> f64 {
            euclidean(ArrayView1::from(*a), ArrayView1::from(*b))
        }

        let (n_obs, n_dim) = x.dim();
        let perplexity = self.config.perplexity;
        if ((n_obs - 1) as f64) < 3.0 * perplexity {
            bail!(
                "Perplexity {} is too large for {} points (Barnes-Hut needs n - 1 >= 3 * perplexity)",
                perplexity,
                n_obs
            );
        }
        if self.config.seed.is_some() {
            log::warn!("Barnes-Hut t-SNE does not support a fixed seed; ignoring it");
        }

        let x = x.as_standard_layout();
        let x_slice = x
            .as_slice()
            .ok_or_else(|| anyhow!("feature matrix is not contiguous"))?;
        let x_chunked_slice: Vec<&[f64]> = x_slice.chunks(n_dim).collect();

        let output_dims = self.config.output_dims;
        let epochs = self.config.max_iter;
        let theta = self.config.theta;
        let embedding = panic::catch_unwind(AssertUnwindSafe(|| {
            bhtsne::tSNE::new(&x_chunked_slice)
                .embedding_dim(output_dims)
                .perplexity(perplexity)
                .epochs(epochs)
                .barnes_hut(theta, euclidean_distance)
                .embedding()
        }))
        .map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            anyhow!("Barnes-Hut t-SNE failed: {}", message)
        })?;

        Ok(Array2::from_shape_vec(
            (n_obs, output_dims as usize),
            embedding,
        )?)
    }
}

impl Reducer for Tsne {
    fn reduce(&self, matrix: Array2<f64>) -> anyhow::Result<Array2<f64>> {
        let (n_obs, n_dim) = matrix.dim();
        if n_obs == 0 {
            bail!("Cannot embed an empty matrix");
        }
        if n_dim == 0 {
            bail!("Cannot embed records without feature values");
        }
        if let Some(((row, col), v)) = matrix.indexed_iter().find(|(_, v)| !v.is_finite()) {
            bail!(
                "Feature {} of record {} is {}; t-SNE needs finite values",
                col + 1,
                row + 1,
                v
            );
        }

        let x = pre_reduce(matrix, self.config.initial_dims)?;
        let method = self.config.method.resolve(n_obs);
        log::info!(
            "running {:?} t-SNE on {} x {} (perplexity {})",
            method,
            n_obs,
            x.ncols(),
            self.config.perplexity
        );

        let embedding = match method {
            Method::BarnesHut => self.run_barnes_hut(x)?,
            _ => exact::embed(x.view(), &self.config)?,
        };

        if embedding.iter().any(|v| !v.is_finite()) {
            bail!("t-SNE produced non-finite coordinates");
        }
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_default_config() {
        let config = TsneConfig::default();
        assert_eq!(config.output_dims(), 2);
        assert_eq!(config.perplexity(), 30.0);
        assert_eq!(config.initial_dims(), 30);
        assert_eq!(config.method(), Method::Auto);
        assert_eq!(TsneConfig::builder().build().unwrap(), config);
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        assert!(TsneConfig::builder().perplexity(0.0).build().is_err());
        assert!(TsneConfig::builder().perplexity(f64::NAN).build().is_err());
        assert!(TsneConfig::builder().output_dims(0).build().is_err());
        assert!(TsneConfig::builder().initial_dims(0).build().is_err());
        assert!(TsneConfig::builder().max_iter(0).build().is_err());
        assert!(TsneConfig::builder().theta(-0.1).build().is_err());
    }

    #[test]
    fn test_method_parsing_and_resolution() {
        assert_eq!("exact".parse::<Method>().unwrap(), Method::Exact);
        assert_eq!("Barnes-Hut".parse::<Method>().unwrap(), Method::BarnesHut);
        assert!("umap".parse::<Method>().is_err());

        assert_eq!(Method::Auto.resolve(10), Method::Exact);
        assert_eq!(Method::Auto.resolve(EXACT_MAX_SAMPLES + 1), Method::BarnesHut);
        assert_eq!(Method::Exact.resolve(1_000_000), Method::Exact);
    }

    #[test]
    fn test_reduce_keeps_rows_and_outputs_two_columns() {
        let config = TsneConfig::builder()
            .seed(Some(7))
            .max_iter(200)
            .build()
            .unwrap();
        let x = array![
            [1.0, 1.0, 1.0],
            [2.0, 2.0, 2.0],
            [3.0, 3.0, 3.0],
            [10.0, 0.0, 5.0]
        ];
        let embedding = Tsne::new(config).reduce(x).unwrap();
        assert_eq!(embedding.dim(), (4, 2));
        assert!(embedding.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_reduce_rejects_non_finite_features() {
        let x = array![[f64::NAN, 2.0], [1.0, 2.0], [4.0, 4.0]];
        let err = Tsne::default().reduce(x).unwrap_err();
        assert!(err.to_string().contains("record 1"));

        let x = array![[1.0, 2.0], [1.0, f64::INFINITY], [4.0, 4.0]];
        assert!(Tsne::default().reduce(x).is_err());
    }

    #[test]
    fn test_reduce_rejects_empty_input() {
        let tsne = Tsne::default();
        assert!(tsne.reduce(Array2::zeros((0, 3))).is_err());
        assert!(tsne.reduce(Array2::zeros((3, 0))).is_err());
    }

    fn spread_rows(n_obs: usize) -> Array2<f64> {
        Array2::from_shape_fn((n_obs, 5), |(i, j)| {
            let cluster = (i % 3) as f64 * 10.0;
            cluster + ((i * 7 + j * 13) % 17) as f64 * 0.1
        })
    }

    #[test]
    fn test_barnes_hut_embeds_every_row() {
        let config = TsneConfig::builder()
            .method(Method::BarnesHut)
            .max_iter(300)
            .build()
            .unwrap();
        let embedding = Tsne::new(config).reduce(spread_rows(150)).unwrap();
        assert_eq!(embedding.dim(), (150, 2));
        assert!(embedding.iter().all(|v| v.is_finite()));
    }

    #[test]
    #[ignore = "embeds more than EXACT_MAX_SAMPLES rows"]
    fn test_auto_switches_to_barnes_hut_for_large_inputs() {
        let n_obs = EXACT_MAX_SAMPLES + 1;
        assert_eq!(Method::Auto.resolve(n_obs), Method::BarnesHut);
        let config = TsneConfig::builder().max_iter(250).build().unwrap();
        let embedding = Tsne::new(config).reduce(spread_rows(n_obs)).unwrap();
        assert_eq!(embedding.dim(), (n_obs, 2));
        assert!(embedding.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_barnes_hut_rejects_large_perplexity() {
        let config = TsneConfig::builder()
            .method(Method::BarnesHut)
            .build()
            .unwrap();
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 7.0]];
        let err = Tsne::new(config).reduce(x).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
