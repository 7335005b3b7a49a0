use ndarray::{Array1, ArrayD};

use crate::broadcast::{self, BroadcastOp};
use crate::error::{PreprocessError, Result};
use crate::scalers::NormalizerStrategy;
use crate::stats::DistributionStats;
use crate::tensor::{
    add_row_vector, div_row_vector, feature_count, mul_row_vector, replace_where_eq,
    sub_row_vector, Element,
};

/// Axis that carries the features of rank 3+ data
/// (samples x features x steps, samples x channels x rows x cols).
pub const FEATURE_AXIS: usize = 1;

/// Z-score standardization: `(x - mean) / std` and back.
///
/// Features with a standard deviation of zero are divided by one instead,
/// which maps them to 0 on the way in and back to their mean on the way out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandardizeStrategy;

impl StandardizeStrategy {
    pub fn new() -> Self {
        StandardizeStrategy
    }

    fn check_features<T: Element>(
        operation: &str,
        array: &ArrayD<T>,
        stats: &DistributionStats<T>,
    ) -> Result<()> {
        let features = feature_count(operation, array)?;
        if features != stats.feature_count() {
            return Err(PreprocessError::invalid_argument(
                operation,
                format!(
                    "array of shape {:?} has {features} features, stats were fit on {}",
                    array.shape(),
                    stats.feature_count()
                ),
            ));
        }
        Ok(())
    }
}

/// Copy of the standard deviations with zeros replaced by one.
pub fn filtered_std<T: Element>(stats: &DistributionStats<T>) -> Array1<T> {
    let mut std = stats.std().clone();
    replace_where_eq(&mut std, T::zero(), T::one());
    std
}

pub fn standardize_value<T: Element>(value: T, mean: T, std: T) -> T {
    let std = if std == T::zero() { T::one() } else { std };
    (value - mean) / std
}

pub fn destandardize_value<T: Element>(value: T, mean: T, std: T) -> T {
    let std = if std == T::zero() { T::one() } else { std };
    value * std + mean
}

impl<T: Element> NormalizerStrategy<DistributionStats<T>> for StandardizeStrategy {
    fn pre_process(&self, array: &mut ArrayD<T>, stats: &DistributionStats<T>) -> Result<()> {
        Self::check_features("StandardizeStrategy::pre_process", array, stats)?;
        let std = filtered_std(stats);
        if array.ndim() <= 2 {
            sub_row_vector(array, stats.mean())?;
            div_row_vector(array, &std)
        } else {
            broadcast::exec_inplace(BroadcastOp::Sub, array, stats.mean(), &[FEATURE_AXIS])?;
            broadcast::exec_inplace(BroadcastOp::Div, array, &std, &[FEATURE_AXIS])
        }
    }

    fn revert(&self, array: &mut ArrayD<T>, stats: &DistributionStats<T>) -> Result<()> {
        Self::check_features("StandardizeStrategy::revert", array, stats)?;
        let std = filtered_std(stats);
        if array.ndim() <= 2 {
            mul_row_vector(array, &std)?;
            add_row_vector(array, stats.mean())
        } else {
            broadcast::exec_inplace(BroadcastOp::Mul, array, &std, &[FEATURE_AXIS])?;
            broadcast::exec_inplace(BroadcastOp::Add, array, stats.mean(), &[FEATURE_AXIS])
        }
    }
}
