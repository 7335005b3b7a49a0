use serde::{Deserialize, Serialize};

/// Options recognized by [`DataSetNormalizer`](crate::scalers::DataSetNormalizer).
///
/// The strategy is not part of the config; it is injected at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Also fit and transform the labels. Mostly useful for regression.
    pub fit_labels: bool,
}

impl NormalizerConfig {
    pub fn with_fit_labels(mut self, fit_labels: bool) -> Self {
        self.fit_labels = fit_labels;
        self
    }
}
