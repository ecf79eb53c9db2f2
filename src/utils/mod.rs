use std::fmt::{Debug, Display};

use ndarray::ArrayView1;
use num_traits::{Float, FromPrimitive, ToPrimitive};

/// Float element types the numeric modules accept.
pub trait FloatOps: Float + FromPrimitive + ToPrimitive + Debug + Display + Send + Sync + 'static {}

impl FloatOps for f32 {}
impl FloatOps for f64 {}

pub fn squared_euclidean<T: FloatOps>(a: ArrayView1<T>, b: ArrayView1<T>) -> T {
    a.iter()
        .zip(b.iter())
        .fold(T::zero(), |acc, (&x, &y)| acc + (x - y) * (x - y))
}

pub fn euclidean<T: FloatOps>(a: ArrayView1<T>, b: ArrayView1<T>) -> T {
    squared_euclidean(a, b).sqrt()
}
