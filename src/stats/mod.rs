pub mod distribution_stats;

pub use distribution_stats::{DistributionStats, DistributionStatsBuilder};

use crate::dataset::DataSet;
use crate::error::Result;
use crate::tensor::Element;

/// A family of statistics a normalizer can be fit with.
pub trait NormalizerStats: Sized + Clone + Send + Sync {
    type Elem: Element;
    type Builder: StatsBuilder<Elem = Self::Elem, Stats = Self>;

    /// A fresh, empty builder.
    fn builder() -> Self::Builder;
}

/// Incremental accumulator for a [`NormalizerStats`] family.
///
/// `build` consumes the builder, so a finalized builder cannot be fed again.
pub trait StatsBuilder {
    type Elem: Element;
    type Stats;

    fn add_features(&mut self, data_set: &DataSet<Self::Elem>) -> Result<&mut Self>;

    fn add_labels(&mut self, data_set: &DataSet<Self::Elem>) -> Result<&mut Self>;

    fn build(self) -> Result<Self::Stats>;
}
