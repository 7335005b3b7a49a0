//! Fit/transform/revert orchestration over data sets and iterators.

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use log::{debug, info, warn};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::config::NormalizerConfig;
use crate::dataset::{DataSet, DataSetIterator};
use crate::error::{PreprocessError, Result};
use crate::scalers::{NormalizerStrategy, StandardizeStrategy};
use crate::stats::{DistributionStats, NormalizerStats, StatsBuilder};
use crate::tensor::Element;

/// Persistable state of a fitted normalizer. The strategy is not included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizerSnapshot<S> {
    pub fit_labels: bool,
    pub feature_stats: Option<S>,
    pub label_stats: Option<S>,
}

/// Normalizer over data sets, generic over the statistics family `S` and the
/// strategy `P` that turns those statistics into a transform.
///
/// Starts unfit. Transforms and reverts fail with `NotFitted` until a `fit`
/// succeeds; a later `fit` swaps in new statistics all at once.
#[derive(Debug, Clone)]
pub struct DataSetNormalizer<S, P> {
    strategy: P,
    feature_stats: Option<S>,
    label_stats: Option<S>,
    fit_labels: bool,
}

pub type NormalizerStandardize<T> = DataSetNormalizer<DistributionStats<T>, StandardizeStrategy>;

impl<T: Element> NormalizerStandardize<T> {
    pub fn standardize() -> Self {
        Self::new(StandardizeStrategy)
    }
}

/// Holds an iterator for the duration of a fit and rewinds it on the way
/// out, including early returns through `?`.
struct ResetOnDrop<'a, T: Element, I: DataSetIterator<T> + ?Sized> {
    inner: &'a mut I,
    armed: bool,
    _elem: PhantomData<T>,
}

impl<'a, T: Element, I: DataSetIterator<T> + ?Sized> ResetOnDrop<'a, T, I> {
    fn new(inner: &'a mut I) -> Self {
        Self {
            inner,
            armed: true,
            _elem: PhantomData,
        }
    }

    /// Disarms the guard and resets explicitly, surfacing any error.
    fn finish(mut self) -> Result<()> {
        self.armed = false;
        self.inner.reset()
    }
}

impl<T: Element, I: DataSetIterator<T> + ?Sized> Deref for ResetOnDrop<'_, T, I> {
    type Target = I;

    fn deref(&self) -> &I {
        self.inner
    }
}

impl<T: Element, I: DataSetIterator<T> + ?Sized> DerefMut for ResetOnDrop<'_, T, I> {
    fn deref_mut(&mut self) -> &mut I {
        self.inner
    }
}

impl<T: Element, I: DataSetIterator<T> + ?Sized> Drop for ResetOnDrop<'_, T, I> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.inner.reset() {
                warn!("Could not reset iterator after a failed fit: {e}");
            }
        }
    }
}

impl<S, P> DataSetNormalizer<S, P>
where
    S: NormalizerStats,
    P: NormalizerStrategy<S>,
{
    pub fn new(strategy: P) -> Self {
        Self::with_config(strategy, NormalizerConfig::default())
    }

    pub fn with_config(strategy: P, config: NormalizerConfig) -> Self {
        Self {
            strategy,
            feature_stats: None,
            label_stats: None,
            fit_labels: config.fit_labels,
        }
    }

    /// Restores a normalizer from persisted state.
    pub fn from_snapshot(strategy: P, snapshot: NormalizerSnapshot<S>) -> Result<Self> {
        if snapshot.feature_stats.is_none() && snapshot.label_stats.is_some() {
            return Err(PreprocessError::invalid_argument(
                "from_snapshot",
                "label statistics without feature statistics",
            ));
        }
        Ok(Self {
            strategy,
            feature_stats: snapshot.feature_stats,
            label_stats: snapshot.label_stats,
            fit_labels: snapshot.fit_labels,
        })
    }

    pub fn snapshot(&self) -> NormalizerSnapshot<S> {
        NormalizerSnapshot {
            fit_labels: self.fit_labels,
            feature_stats: self.feature_stats.clone(),
            label_stats: self.label_stats.clone(),
        }
    }

    /// Whether labels are fit and transformed as well. Takes effect on the next `fit`.
    pub fn fit_label(&mut self, fit_labels: bool) {
        self.fit_labels = fit_labels;
    }

    pub fn is_fit_label(&self) -> bool {
        self.fit_labels
    }

    pub fn is_fit(&self) -> bool {
        self.feature_stats.is_some()
    }

    pub fn strategy(&self) -> &P {
        &self.strategy
    }

    pub fn feature_stats(&self) -> Result<&S> {
        self.feature_stats
            .as_ref()
            .ok_or_else(|| PreprocessError::not_fitted("feature_stats"))
    }

    pub fn label_stats(&self) -> Result<&S> {
        self.require_label_stats("label_stats")
    }

    fn require_feature_stats(&self, operation: &str) -> Result<&S> {
        self.feature_stats
            .as_ref()
            .ok_or_else(|| PreprocessError::not_fitted(operation))
    }

    fn require_label_stats(&self, operation: &str) -> Result<&S> {
        self.require_feature_stats(operation)?;
        self.label_stats.as_ref().ok_or_else(|| {
            PreprocessError::illegal_state(
                operation,
                "label normalization is enabled but labels were not fit",
            )
        })
    }

    fn install(&mut self, feature_stats: S, label_stats: Option<S>) {
        self.feature_stats = Some(feature_stats);
        self.label_stats = label_stats;
    }

    /// Fits on a single data set, replacing any previous statistics.
    pub fn fit(&mut self, data_set: &DataSet<S::Elem>) -> Result<()> {
        let mut features = S::builder();
        features.add_features(data_set)?;
        let feature_stats = features.build()?;

        let label_stats = if self.fit_labels {
            let mut labels = S::builder();
            labels.add_labels(data_set)?;
            Some(labels.build()?)
        } else {
            None
        };

        info!(
            "Fit normalizer on {} examples (labels: {})",
            data_set.num_examples(),
            self.fit_labels
        );
        self.install(feature_stats, label_stats);
        Ok(())
    }

    /// Fits on every batch of `iterator`.
    ///
    /// The iterator is reset before the first batch and again before
    /// returning, whether the fit succeeded or not. On failure the previous
    /// statistics are left untouched.
    pub fn fit_iter<I>(&mut self, iterator: &mut I) -> Result<()>
    where
        I: DataSetIterator<S::Elem> + ?Sized,
    {
        let mut guard = ResetOnDrop::new(iterator);
        guard.reset()?;

        let mut features = S::builder();
        let mut labels = if self.fit_labels {
            Some(S::builder())
        } else {
            None
        };

        let mut batches = 0usize;
        let mut examples = 0usize;
        while let Some(batch) = guard.next() {
            let batch = batch?;
            features.add_features(&batch)?;
            if let Some(labels) = labels.as_mut() {
                labels.add_labels(&batch)?;
            }
            batches += 1;
            examples += batch.num_examples();
            debug!("fit_iter: batch {batches} with {} examples", batch.num_examples());
        }

        let feature_stats = features.build()?;
        let label_stats = labels.map(|labels| labels.build()).transpose()?;
        guard.finish()?;

        info!(
            "Fit normalizer on {examples} examples in {batches} batches (labels: {})",
            self.fit_labels
        );
        self.install(feature_stats, label_stats);
        Ok(())
    }

    /// Transforms features, then labels if label normalization is on.
    ///
    /// Not atomic: if the labels fail, the features stay transformed.
    pub fn pre_process(&self, data_set: &mut DataSet<S::Elem>) -> Result<()> {
        self.transform_features(data_set.features_mut())?;
        self.transform_label(data_set.labels_mut())
    }

    /// Alias of [`pre_process`](Self::pre_process).
    pub fn transform(&self, data_set: &mut DataSet<S::Elem>) -> Result<()> {
        self.pre_process(data_set)
    }

    pub fn transform_features(&self, features: &mut ArrayD<S::Elem>) -> Result<()> {
        let stats = self.require_feature_stats("transform_features")?;
        self.strategy.pre_process(features, stats)
    }

    /// No-op unless label normalization is on.
    pub fn transform_label(&self, labels: &mut ArrayD<S::Elem>) -> Result<()> {
        if !self.fit_labels {
            return Ok(());
        }
        let stats = self.require_label_stats("transform_label")?;
        self.strategy.pre_process(labels, stats)
    }

    /// Inverse of [`pre_process`](Self::pre_process).
    pub fn revert(&self, data_set: &mut DataSet<S::Elem>) -> Result<()> {
        self.revert_features(data_set.features_mut())?;
        self.revert_labels(data_set.labels_mut())
    }

    pub fn revert_features(&self, features: &mut ArrayD<S::Elem>) -> Result<()> {
        let stats = self.require_feature_stats("revert_features")?;
        self.strategy.revert(features, stats)
    }

    /// No-op unless label normalization is on. Also usable on network
    /// outputs of a regression model.
    pub fn revert_labels(&self, labels: &mut ArrayD<S::Elem>) -> Result<()> {
        if !self.fit_labels {
            return Ok(());
        }
        let stats = self.require_label_stats("revert_labels")?;
        self.strategy.revert(labels, stats)
    }
}
