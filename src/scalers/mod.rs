pub mod normalizer;
pub mod standardize_strategy;

pub use normalizer::{DataSetNormalizer, NormalizerSnapshot, NormalizerStandardize};
pub use standardize_strategy::StandardizeStrategy;

use ndarray::ArrayD;

use crate::error::Result;
use crate::stats::NormalizerStats;

/// A forward transform and its inverse, both parameterized by fitted stats.
///
/// Implementations hold no state of their own and work in place.
pub trait NormalizerStrategy<S: NormalizerStats>: Send + Sync {
    fn pre_process(&self, array: &mut ArrayD<S::Elem>, stats: &S) -> Result<()>;

    fn revert(&self, array: &mut ArrayD<S::Elem>, stats: &S) -> Result<()>;
}
