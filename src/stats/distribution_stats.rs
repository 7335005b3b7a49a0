//! Per-feature mean and population standard deviation.
//!
//! Samples run along axis 0 and features along axis 1. Any further axes
//! (time steps, pixels) are folded into the samples of their feature, and a
//! bare rank 1 array is read as a single sample row. Rank 1 tensors inside a
//! [`DataSet`] are already `(N, 1)` columns.

use log::debug;
use ndarray::{Array1, ArrayBase, Axis, Data, Dimension};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::DataSet;
use crate::error::{PreprocessError, Result};
use crate::stats::{NormalizerStats, StatsBuilder};
use crate::tensor::Element;

/// Deserializing validates through [`DistributionStats::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RawDistributionStats<T>",
    bound(deserialize = "T: Element + Deserialize<'de>")
)]
pub struct DistributionStats<T> {
    mean: Array1<T>,
    std: Array1<T>,
}

#[derive(Deserialize)]
struct RawDistributionStats<T> {
    mean: Array1<T>,
    std: Array1<T>,
}

impl<T: Element> TryFrom<RawDistributionStats<T>> for DistributionStats<T> {
    type Error = PreprocessError;

    fn try_from(raw: RawDistributionStats<T>) -> Result<Self> {
        Self::new(raw.mean, raw.std)
    }
}

impl<T: Element> DistributionStats<T> {
    pub fn new(mean: Array1<T>, std: Array1<T>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(PreprocessError::invalid_argument(
                "DistributionStats::new",
                format!(
                    "mean has {} features but std has {}",
                    mean.len(),
                    std.len()
                ),
            ));
        }
        // `!(s >= 0)` also catches NaN
        if let Some(bad) = std.iter().find(|&&s| !(s >= T::zero())) {
            return Err(PreprocessError::invalid_argument(
                "DistributionStats::new",
                format!("standard deviations must be non-negative, found {bad}"),
            ));
        }
        Ok(Self { mean, std })
    }

    /// One-shot statistics over a single array.
    pub fn from_array<S, D>(array: &ArrayBase<S, D>) -> Result<Self>
    where
        S: Data<Elem = T>,
        D: Dimension,
    {
        let mut builder = DistributionStatsBuilder::new();
        builder.add("DistributionStats::from_array", array)?;
        builder.build()
    }

    pub fn mean(&self) -> &Array1<T> {
        &self.mean
    }

    pub fn std(&self) -> &Array1<T> {
        &self.std
    }

    pub fn feature_count(&self) -> usize {
        self.mean.len()
    }
}

impl<T: Element> NormalizerStats for DistributionStats<T> {
    type Elem = T;
    type Builder = DistributionStatsBuilder<T>;

    fn builder() -> Self::Builder {
        DistributionStatsBuilder::new()
    }
}

#[derive(Debug, Clone)]
struct Moments<T> {
    count: usize,
    mean: Array1<T>,
    m2: Array1<T>,
}

/// Streams batches into running per-feature moments.
///
/// Each batch is reduced with Welford's update and merged into the running
/// moments with Chan's pairwise formula, so feeding batches one by one gives
/// the same result as fitting their concatenation, up to rounding.
#[derive(Debug, Clone)]
pub struct DistributionStatsBuilder<T> {
    features: Option<usize>,
    moments: Option<Moments<T>>,
}

impl<T: Element> Default for DistributionStatsBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn to_elem<T: Element>(operation: &str, n: usize) -> Result<T> {
    T::from_usize(n).ok_or_else(|| {
        PreprocessError::invalid_argument(
            operation,
            format!("sample count {n} is not representable"),
        )
    })
}

fn welford<'a, T: Element>(values: impl Iterator<Item = &'a T>) -> (T, T) {
    let mut n = T::zero();
    let mut mean = T::zero();
    let mut m2 = T::zero();
    for &x in values {
        n = n + T::one();
        let delta = x - mean;
        mean = mean + delta / n;
        m2 = m2 + delta * (x - mean);
    }
    (mean, m2)
}

impl<T: Element> DistributionStatsBuilder<T> {
    pub fn new() -> Self {
        Self {
            features: None,
            moments: None,
        }
    }

    /// Number of samples seen per feature so far.
    pub fn count(&self) -> usize {
        self.moments.as_ref().map_or(0, |m| m.count)
    }

    fn add<S, D>(&mut self, operation: &str, array: &ArrayBase<S, D>) -> Result<()>
    where
        S: Data<Elem = T>,
        D: Dimension,
    {
        let view = match array.ndim() {
            0 => {
                return Err(PreprocessError::invalid_argument(
                    operation,
                    "cannot compute statistics of a rank 0 tensor",
                ))
            }
            1 => array.view().into_dyn().insert_axis(Axis(0)),
            _ => array.view().into_dyn(),
        };

        let features = view.len_of(Axis(1));
        if features == 0 {
            return Err(PreprocessError::invalid_argument(
                operation,
                format!("tensor of shape {:?} has no features", view.shape()),
            ));
        }
        match self.features {
            Some(expected) if expected != features => {
                return Err(PreprocessError::invalid_argument(
                    operation,
                    format!("expected {expected} features, got {features}"),
                ));
            }
            _ => self.features = Some(features),
        }

        let count = view.len() / features;
        if count == 0 {
            debug!("{operation}: skipping empty batch of shape {:?}", view.shape());
            return Ok(());
        }

        let per_feature: Vec<(T, T)> = view
            .axis_iter(Axis(1))
            .into_par_iter()
            .map(|lane| welford(lane.iter()))
            .collect();
        let batch = Moments {
            count,
            mean: per_feature.iter().map(|&(mean, _)| mean).collect(),
            m2: per_feature.iter().map(|&(_, m2)| m2).collect(),
        };

        self.moments = Some(match self.moments.take() {
            None => batch,
            Some(running) => merge(operation, running, batch)?,
        });
        debug!(
            "{operation}: merged batch of {count} samples x {features} features, {} samples total",
            self.count()
        );
        Ok(())
    }
}

fn merge<T: Element>(operation: &str, a: Moments<T>, b: Moments<T>) -> Result<Moments<T>> {
    let count = a.count + b.count;
    let na: T = to_elem(operation, a.count)?;
    let nb: T = to_elem(operation, b.count)?;
    let n: T = to_elem(operation, count)?;

    let delta = &b.mean - &a.mean;
    let mean = &a.mean + &delta.mapv(|d| d * nb / n);
    let m2 = &a.m2 + &b.m2 + &delta.mapv(|d| d * d * na * nb / n);
    Ok(Moments { count, mean, m2 })
}

impl<T: Element> StatsBuilder for DistributionStatsBuilder<T> {
    type Elem = T;
    type Stats = DistributionStats<T>;

    fn add_features(&mut self, data_set: &DataSet<T>) -> Result<&mut Self> {
        self.add("add_features", data_set.features())?;
        Ok(self)
    }

    fn add_labels(&mut self, data_set: &DataSet<T>) -> Result<&mut Self> {
        self.add("add_labels", data_set.labels())?;
        Ok(self)
    }

    fn build(self) -> Result<DistributionStats<T>> {
        let moments = self.moments.ok_or_else(|| {
            PreprocessError::invalid_argument("build", "no samples were added to the builder")
        })?;
        let n: T = to_elem("build", moments.count)?;
        if let Some(feature) = moments.m2.iter().position(|m2| m2.is_nan()) {
            return Err(PreprocessError::invalid_argument(
                "build",
                format!("feature {feature} contains NaN or infinite values"),
            ));
        }
        // rounding can leave a tiny negative m2
        let std = moments.m2.mapv(|m2| {
            let var = m2 / n;
            if var < T::zero() {
                T::zero()
            } else {
                var.sqrt()
            }
        });
        DistributionStats::new(moments.mean, std)
    }
}
