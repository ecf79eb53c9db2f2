//! # Coordinate Normalization
//!
//! Maps every column of an embedding independently onto `[0, 1]` using the
//! column's observed minimum and maximum.
//!
//! A column whose values are all equal has a zero interval. That case is not
//! guarded: the division yields NaN for every row of that column, and a warning
//! is logged.

use anyhow::bail;
use ndarray::{Array2, ArrayView2, Axis};

use crate::utils::FloatOps;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange<T: FloatOps> {
    pub min: T,
    pub max: T,
}

impl<T: FloatOps> AxisRange<T> {
    pub fn from_values<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a T>,
    {
        let mut iter = values.into_iter();
        let first = *iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), &v| {
            (if v < min { v } else { min }, if v > max { v } else { max })
        });
        Some(AxisRange { min, max })
    }

    pub fn interval(&self) -> T {
        (self.max - self.min).abs()
    }

    pub fn is_degenerate(&self) -> bool {
        self.interval() == T::zero()
    }

    pub fn scale(&self, value: T) -> T {
        (value - self.min) / self.interval()
    }
}

/// Per-column min/max fitted on one embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitScaler<T: FloatOps> {
    ranges: Vec<AxisRange<T>>,
}

impl<T: FloatOps> UnitScaler<T> {
    pub fn fit(embedding: ArrayView2<T>) -> anyhow::Result<Self> {
        let (n_obs, n_dim) = embedding.dim();
        if n_obs == 0 || n_dim == 0 {
            bail!("Cannot normalize an empty embedding ({} x {})", n_obs, n_dim);
        }

        let mut ranges = Vec::with_capacity(n_dim);
        for (axis, column) in embedding.axis_iter(Axis(1)).enumerate() {
            let range = match AxisRange::from_values(column.iter()) {
                Some(range) => range,
                None => bail!("Column {} of the embedding is empty", axis),
            };
            if range.is_degenerate() {
                log::warn!(
                    "all {} values on axis {} equal {}; normalized coordinates will not be finite",
                    n_obs,
                    axis,
                    range.min
                );
            }
            ranges.push(range);
        }

        Ok(UnitScaler { ranges })
    }

    pub fn ranges(&self) -> &[AxisRange<T>] {
        &self.ranges
    }

    /// Lazily normalizes the rows of `embedding`, one row per item.
    pub fn points<'a>(&'a self, embedding: ArrayView2<'a, T>) -> NormalizedPoints<'a, T> {
        NormalizedPoints {
            ranges: &self.ranges,
            embedding,
            next_row: 0,
        }
    }

    pub fn transform(&self, embedding: ArrayView2<T>) -> Array2<T> {
        let mut out = embedding.to_owned();
        for (mut column, range) in out.axis_iter_mut(Axis(1)).zip(self.ranges.iter()) {
            column.mapv_inplace(|v| range.scale(v));
        }
        out
    }
}

/// Forward-only iterator over normalized rows.
pub struct NormalizedPoints<'a, T: FloatOps> {
    ranges: &'a [AxisRange<T>],
    embedding: ArrayView2<'a, T>,
    next_row: usize,
}

impl<T: FloatOps> Iterator for NormalizedPoints<'_, T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row >= self.embedding.nrows() {
            return None;
        }
        let point = self
            .embedding
            .row(self.next_row)
            .iter()
            .zip(self.ranges.iter())
            .map(|(&v, range)| range.scale(v))
            .collect();
        self.next_row += 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.embedding.nrows() - self.next_row;
        (remaining, Some(remaining))
    }
}

impl<T: FloatOps> ExactSizeIterator for NormalizedPoints<'_, T> {}
