//! Exact t-SNE (van der Maaten & Hinton, 2008).
//!
//! All pairwise affinities are materialized, so memory grows with the square
//! of the number of rows.

use anyhow::bail;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis, Zip};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use super::TsneConfig;
use crate::utils::squared_euclidean;

const PERPLEXITY_TOLERANCE: f64 = 1e-5;
const MAX_BANDWIDTH_STEPS: usize = 50;
const EARLY_EXAGGERATION: f64 = 4.0;
const EXAGGERATION_ITERS: usize = 100;
const MOMENTUM_SWITCH_ITER: usize = 20;
const INITIAL_MOMENTUM: f64 = 0.5;
const FINAL_MOMENTUM: f64 = 0.8;
const LEARNING_RATE: f64 = 500.0;
const MIN_GAIN: f64 = 0.01;
const MIN_PROBABILITY: f64 = 1e-12;
const INITIAL_SCALE: f64 = 1e-4;
const COST_LOG_INTERVAL: usize = 100;

pub fn pairwise_squared_distances(x: ArrayView2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| squared_euclidean(x.row(i), x.row(j)))
                .collect()
        })
        .collect();
    Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
}

/// Fills `p` with the Gaussian conditional probabilities of row `index` at
/// precision `beta` and returns their Shannon entropy (in nats).
///
/// Distances are shifted by their minimum so the largest weight is exactly 1
/// and the normalizer never underflows.
fn conditional_entropy(
    distances: ArrayView1<f64>,
    index: usize,
    d_min: f64,
    beta: f64,
    p: &mut [f64],
) -> f64 {
    let mut sum_p = 0.0;
    let mut weighted = 0.0;
    for (j, &d) in distances.iter().enumerate() {
        if j == index {
            p[j] = 0.0;
            continue;
        }
        let shifted = d - d_min;
        let pj = (-beta * shifted).exp();
        p[j] = pj;
        sum_p += pj;
        weighted += shifted * pj;
    }
    for pj in p.iter_mut() {
        *pj /= sum_p;
    }
    sum_p.ln() + beta * weighted / sum_p
}

/// Binary search over the Gaussian precision of row `index` until the row's
/// entropy is `ln(perplexity)`.
fn conditional_row(distances: ArrayView1<f64>, index: usize, target_entropy: f64) -> Vec<f64> {
    let n = distances.len();
    let mut p = vec![0.0; n];
    if n < 2 {
        return p;
    }

    let d_min = distances
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != index)
        .map(|(_, &d)| d)
        .fold(f64::INFINITY, f64::min);

    let mut beta = 1.0;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;
    let mut entropy = conditional_entropy(distances, index, d_min, beta, &mut p);

    let mut steps = 0;
    while (entropy - target_entropy).abs() > PERPLEXITY_TOLERANCE && steps < MAX_BANDWIDTH_STEPS
    {
        if entropy > target_entropy {
            beta_min = beta;
            beta = if beta_max.is_infinite() {
                beta * 2.0
            } else {
                (beta + beta_max) / 2.0
            };
        } else {
            beta_max = beta;
            beta = if beta_min.is_infinite() {
                beta / 2.0
            } else {
                (beta + beta_min) / 2.0
            };
        }
        entropy = conditional_entropy(distances, index, d_min, beta, &mut p);
        steps += 1;
    }

    p
}

/// Symmetrized joint probabilities `P`, summing to 1 over all pairs.
pub fn joint_probabilities(x: ArrayView2<f64>, perplexity: f64) -> Array2<f64> {
    let n = x.nrows();
    let distances = pairwise_squared_distances(x);
    let target_entropy = perplexity.ln();

    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| conditional_row(distances.row(i), i, target_entropy))
        .collect();
    let conditional = Array2::from_shape_fn((n, n), |(i, j)| rows[i][j]);

    let mut joint = &conditional + &conditional.t();
    let total = joint.sum();
    if total > 0.0 {
        joint /= total;
    }
    joint
}

/// Unnormalized Student-t kernel `1 / (1 + |y_i - y_j|^2)`, zero on the
/// diagonal.
fn student_t_kernel(y: &Array2<f64>) -> Array2<f64> {
    let n = y.nrows();
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        0.0
                    } else {
                        1.0 / (1.0 + squared_euclidean(y.row(i), y.row(j)))
                    }
                })
                .collect()
        })
        .collect();
    Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
}

fn gradient(p: &Array2<f64>, y: &Array2<f64>, kernel: &Array2<f64>) -> Array2<f64> {
    let (n, dims) = y.dim();
    let kernel_sum = kernel.sum();
    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut g = vec![0.0; dims];
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (kernel[[i, j]] / kernel_sum).max(MIN_PROBABILITY);
                let mult = (p[[i, j]] - q) * kernel[[i, j]];
                for (k, gk) in g.iter_mut().enumerate() {
                    *gk += mult * (y[[i, k]] - y[[j, k]]);
                }
            }
            g
        })
        .collect();
    Array2::from_shape_fn((n, dims), |(i, k)| rows[i][k])
}

/// KL(P || Q) of the current embedding.
pub fn kl_divergence(p: &Array2<f64>, y: &Array2<f64>) -> f64 {
    let kernel = student_t_kernel(y);
    let kernel_sum = kernel.sum();
    let mut cost = 0.0;
    for ((i, j), &pij) in p.indexed_iter() {
        if i == j || pij <= 0.0 {
            continue;
        }
        let q = (kernel[[i, j]] / kernel_sum).max(MIN_PROBABILITY);
        cost += pij * (pij / q).ln();
    }
    cost
}

/// Embeds the rows of `x` into `config.output_dims()` dimensions.
///
/// Fewer than two rows have no neighbours to preserve and come back as the
/// origin.
pub fn embed(x: ArrayView2<f64>, config: &TsneConfig) -> anyhow::Result<Array2<f64>> {
    let n = x.nrows();
    let dims = config.output_dims();
    if x.iter().any(|v| !v.is_finite()) {
        bail!("Cannot embed feature values that are not finite");
    }
    if n < 2 {
        return Ok(Array2::zeros((n, dims)));
    }

    let seed = config.seed().unwrap_or_else(|| rand::rng().random());
    log::debug!("exact t-SNE seed {}", seed);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut y = Array2::from_shape_fn((n, dims), |_| {
        INITIAL_SCALE * rng.sample::<f64, _>(StandardNormal)
    });
    let mut update = Array2::<f64>::zeros((n, dims));
    let mut gains = Array2::<f64>::ones((n, dims));

    let mut p = joint_probabilities(x, config.perplexity());
    // f64::max would hide NaN behind the floor below.
    if p.iter().any(|v| !v.is_finite()) {
        bail!("Pairwise affinities are not finite; feature distances overflow");
    }
    p.mapv_inplace(|v| (v * EARLY_EXAGGERATION).max(MIN_PROBABILITY));

    for iter in 0..config.max_iter() {
        let kernel = student_t_kernel(&y);
        let grad = gradient(&p, &y, &kernel);

        let momentum = if iter < MOMENTUM_SWITCH_ITER {
            INITIAL_MOMENTUM
        } else {
            FINAL_MOMENTUM
        };

        Zip::from(&mut gains)
            .and(&grad)
            .and(&update)
            .for_each(|gain, &dy, &step| {
                *gain = if (dy > 0.0) != (step > 0.0) {
                    *gain + 0.2
                } else {
                    *gain * 0.8
                };
                if *gain < MIN_GAIN {
                    *gain = MIN_GAIN;
                }
            });
        Zip::from(&mut update)
            .and(&gains)
            .and(&grad)
            .for_each(|step, &gain, &dy| {
                *step = momentum * *step - LEARNING_RATE * gain * dy;
            });

        y += &update;
        if let Some(mean) = y.mean_axis(Axis(0)) {
            y -= &mean;
        }

        if iter + 1 == EXAGGERATION_ITERS {
            p.mapv_inplace(|v| v / EARLY_EXAGGERATION);
        }
        if (iter + 1) % COST_LOG_INTERVAL == 0 {
            log::debug!("iteration {}: KL divergence {:.6}", iter + 1, kl_divergence(&p, &y));
        }
    }

    Ok(y)
}
