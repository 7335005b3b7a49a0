//! Feature/label pairs and the iterators that stream them in batches.

use ndarray::{concatenate, ArrayD, ArrayViewD, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::error::{PreprocessError, Result};
use crate::tensor::Element;

/// Features and labels that share their leading (sample) dimension.
///
/// A rank 1 tensor holds one value per sample and is stored as an `(N, 1)`
/// column, so a plain regression target fits as a single feature.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet<T> {
    features: ArrayD<T>,
    labels: ArrayD<T>,
}

impl<T: Element> DataSet<T> {
    pub fn new(features: ArrayD<T>, labels: ArrayD<T>) -> Result<Self> {
        if features.ndim() == 0 || labels.ndim() == 0 {
            return Err(PreprocessError::invalid_argument(
                "DataSet::new",
                "features and labels need at least one dimension",
            ));
        }
        let (features, labels) = (as_column(features), as_column(labels));
        let (examples, label_rows) = (features.len_of(Axis(0)), labels.len_of(Axis(0)));
        if examples != label_rows {
            return Err(PreprocessError::invalid_argument(
                "DataSet::new",
                format!("{examples} feature rows but {label_rows} label rows"),
            ));
        }
        Ok(Self { features, labels })
    }

    pub fn features(&self) -> &ArrayD<T> {
        &self.features
    }

    pub fn labels(&self) -> &ArrayD<T> {
        &self.labels
    }

    /// Replacing the tensor must keep the leading sample axis.
    pub fn features_mut(&mut self) -> &mut ArrayD<T> {
        &mut self.features
    }

    pub fn labels_mut(&mut self) -> &mut ArrayD<T> {
        &mut self.labels
    }

    pub fn num_examples(&self) -> usize {
        self.features.len_of(Axis(0))
    }

    pub fn into_parts(self) -> (ArrayD<T>, ArrayD<T>) {
        (self.features, self.labels)
    }

    /// Concatenates data sets along the sample axis.
    pub fn merge(data_sets: &[DataSet<T>]) -> Result<Self> {
        if data_sets.is_empty() {
            return Err(PreprocessError::invalid_argument(
                "DataSet::merge",
                "nothing to merge",
            ));
        }
        let features: Vec<ArrayViewD<'_, T>> =
            data_sets.iter().map(|d| d.features.view()).collect();
        let labels: Vec<ArrayViewD<'_, T>> = data_sets.iter().map(|d| d.labels.view()).collect();
        Self::new(stack(&features)?, stack(&labels)?)
    }

    /// Splits into consecutive batches of at most `batch_size` samples.
    pub fn batch_by(&self, batch_size: usize) -> Result<Vec<DataSet<T>>> {
        if batch_size == 0 {
            return Err(PreprocessError::invalid_argument(
                "DataSet::batch_by",
                "batch size must be positive",
            ));
        }
        self.features
            .axis_chunks_iter(Axis(0), batch_size)
            .zip(self.labels.axis_chunks_iter(Axis(0), batch_size))
            .map(|(features, labels)| Self::new(features.to_owned(), labels.to_owned()))
            .collect()
    }
}

fn as_column<T>(array: ArrayD<T>) -> ArrayD<T> {
    if array.ndim() == 1 {
        array.insert_axis(Axis(1))
    } else {
        array
    }
}

fn stack<T: Element>(parts: &[ArrayViewD<'_, T>]) -> Result<ArrayD<T>> {
    concatenate(Axis(0), parts)
        .map_err(|e| PreprocessError::invalid_argument("DataSet::merge", e.to_string()))
}

/// A resettable stream of data set batches.
///
/// `Iterator::next` returning `None` plays the role of `hasNext() == false`.
pub trait DataSetIterator<T: Element>: Iterator<Item = Result<DataSet<T>>> {
    /// Rewinds to the first batch.
    fn reset(&mut self) -> Result<()>;
}

/// Iterates over batches held in memory, optionally in a seeded random order
/// that is redrawn on every reset.
#[derive(Debug, Clone)]
pub struct ListDataSetIterator<T> {
    batches: Vec<DataSet<T>>,
    order: Vec<usize>,
    cursor: usize,
    shuffle: Option<StdRng>,
}

impl<T: Element> ListDataSetIterator<T> {
    pub fn new(batches: Vec<DataSet<T>>) -> Self {
        let order = (0..batches.len()).collect();
        Self {
            batches,
            order,
            cursor: 0,
            shuffle: None,
        }
    }

    pub fn from_data_set(data_set: &DataSet<T>, batch_size: usize) -> Result<Self> {
        Ok(Self::new(data_set.batch_by(batch_size)?))
    }

    pub fn with_shuffle(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.order.shuffle(&mut rng);
        self.shuffle = Some(rng);
        self
    }

    /// Index of the next batch to be returned.
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

impl<T: Element> Iterator for ListDataSetIterator<T> {
    type Item = Result<DataSet<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = *self.order.get(self.cursor)?;
        self.cursor += 1;
        Some(Ok(self.batches[index].clone()))
    }
}

impl<T: Element> DataSetIterator<T> for ListDataSetIterator<T> {
    fn reset(&mut self) -> Result<()> {
        self.cursor = 0;
        if let Some(rng) = self.shuffle.as_mut() {
            self.order.shuffle(rng);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array2};

    fn sample() -> DataSet<f64> {
        DataSet::new(
            arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).into_dyn(),
            arr2(&[[0.0], [1.0], [0.0]]).into_dyn(),
        )
        .unwrap()
    }

    #[test]
    fn rows_must_line_up() {
        let err = DataSet::new(
            Array2::<f64>::zeros((3, 2)).into_dyn(),
            Array2::<f64>::zeros((2, 1)).into_dyn(),
        )
        .unwrap_err();
        assert!(matches!(err, PreprocessError::InvalidArgument { .. }));
    }

    #[test]
    fn rank_one_tensors_become_columns() {
        let data = DataSet::new(
            arr1(&[1.0_f64, 2.0, 3.0]).into_dyn(),
            arr1(&[10.0_f64, 20.0, 30.0]).into_dyn(),
        )
        .unwrap();
        assert_eq!(data.num_examples(), 3);
        assert_eq!(data.features().shape(), &[3, 1]);
        assert_eq!(data.labels(), &arr2(&[[10.0], [20.0], [30.0]]).into_dyn());

        let batches = data.batch_by(2).unwrap();
        assert_eq!(batches[1].labels().shape(), &[1, 1]);
        assert_eq!(DataSet::merge(&batches).unwrap(), data);
    }

    #[test]
    fn batch_then_merge_restores_data() {
        let data = sample();
        let batches = data.batch_by(2).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].num_examples(), 2);
        assert_eq!(batches[1].num_examples(), 1);
        assert_eq!(DataSet::merge(&batches).unwrap(), data);
        assert!(data.batch_by(0).is_err());
        assert!(DataSet::<f64>::merge(&[]).is_err());
    }

    #[test]
    fn list_iterator_walks_and_resets() {
        let mut it = ListDataSetIterator::from_data_set(&sample(), 1).unwrap();
        assert_eq!(it.len(), 3);
        let first = it.next().unwrap().unwrap();
        assert_eq!(first.features(), &arr2(&[[1.0, 2.0]]).into_dyn());
        assert_eq!(it.by_ref().count(), 2);
        assert!(it.next().is_none());
        it.reset().unwrap();
        assert_eq!(it.position(), 0);
        assert_eq!(it.next().unwrap().unwrap(), first);
    }

    #[test]
    fn shuffled_iterator_visits_every_batch() {
        let data = sample();
        let mut it = ListDataSetIterator::from_data_set(&data, 1)
            .unwrap()
            .with_shuffle(17);
        for _ in 0..3 {
            let mut seen: Vec<f64> = it
                .by_ref()
                .map(|batch| batch.unwrap().features()[[0, 0]])
                .collect();
            seen.sort_by(|a, b| a.total_cmp(b));
            assert_eq!(seen, vec![1.0, 3.0, 5.0]);
            it.reset().unwrap();
        }
    }
}
