//! Numeric CSV files as a stream of data set batches.
//!
//! Every column must parse as a number. The trailing `label_columns` columns
//! of a row are its labels, the rest are its features.

use std::fs::File;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use csv::{Reader, ReaderBuilder, StringRecord, Trim, Writer};
use ndarray::{s, Array2, Axis};

use crate::dataset::{DataSet, DataSetIterator};
use crate::error::{PreprocessError, Result};
use crate::tensor::Element;

pub struct CsvDataSetIterator<T> {
    path: PathBuf,
    batch_size: usize,
    label_columns: usize,
    has_headers: bool,
    reader: Reader<File>,
    _elem: PhantomData<T>,
}

fn open(path: &Path, has_headers: bool) -> Result<Reader<File>> {
    Ok(ReaderBuilder::new()
        .has_headers(has_headers)
        .trim(Trim::All)
        .from_path(path)?)
}

impl<T: Element> CsvDataSetIterator<T> {
    /// Opens `path`, whose first row is a header.
    pub fn new(path: impl AsRef<Path>, batch_size: usize, label_columns: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(PreprocessError::invalid_argument(
                "CsvDataSetIterator::new",
                "batch size must be positive",
            ));
        }
        let path = path.as_ref().to_path_buf();
        let reader = open(&path, true)?;
        Ok(Self {
            path,
            batch_size,
            label_columns,
            has_headers: true,
            reader,
            _elem: PhantomData,
        })
    }

    pub fn with_headers(mut self, has_headers: bool) -> Result<Self> {
        self.has_headers = has_headers;
        self.reader = open(&self.path, has_headers)?;
        Ok(self)
    }

    pub fn headers(&mut self) -> Result<Option<Vec<String>>> {
        if !self.has_headers {
            return Ok(None);
        }
        Ok(Some(
            self.reader.headers()?.iter().map(str::to_string).collect(),
        ))
    }

    fn parse_record(record: &StringRecord, values: &mut Vec<T>) -> Result<()> {
        let line = record.position().map_or(0, |p| p.line());
        for (column, field) in record.iter().enumerate() {
            let value = field
                .parse::<f64>()
                .ok()
                .and_then(T::from_f64)
                .ok_or_else(|| PreprocessError::Parse {
                    line,
                    column,
                    value: field.to_string(),
                })?;
            values.push(value);
        }
        Ok(())
    }

    fn read_batch(&mut self) -> Result<Option<DataSet<T>>> {
        let mut record = StringRecord::new();
        let mut values = Vec::new();
        let mut rows = 0;
        while rows < self.batch_size && self.reader.read_record(&mut record)? {
            Self::parse_record(&record, &mut values)?;
            rows += 1;
        }
        if rows == 0 {
            return Ok(None);
        }

        let columns = values.len() / rows;
        if self.label_columns >= columns {
            return Err(PreprocessError::invalid_argument(
                "CsvDataSetIterator",
                format!(
                    "{} label columns leave no features in a {columns} column file",
                    self.label_columns
                ),
            ));
        }
        let table = Array2::from_shape_vec((rows, columns), values).map_err(|e| {
            PreprocessError::invalid_argument("CsvDataSetIterator", e.to_string())
        })?;
        let split = columns - self.label_columns;
        let features = table.slice(s![.., ..split]).to_owned().into_dyn();
        let labels = table.slice(s![.., split..]).to_owned().into_dyn();
        DataSet::new(features, labels).map(Some)
    }
}

impl<T: Element> Iterator for CsvDataSetIterator<T> {
    type Item = Result<DataSet<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_batch().transpose()
    }
}

impl<T: Element> DataSetIterator<T> for CsvDataSetIterator<T> {
    fn reset(&mut self) -> Result<()> {
        self.reader = open(&self.path, self.has_headers)?;
        Ok(())
    }
}

/// Appends the rows of a rank 2 data set, features first, then labels.
pub fn write_batch<T: Element, W: Write>(
    writer: &mut Writer<W>,
    data_set: &DataSet<T>,
) -> Result<()> {
    let features = data_set.features();
    let labels = data_set.labels();
    if features.ndim() != 2 || labels.ndim() != 2 {
        return Err(PreprocessError::invalid_argument(
            "write_batch",
            format!(
                "CSV output needs rank 2 features and labels, got shapes {:?} and {:?}",
                features.shape(),
                labels.shape()
            ),
        ));
    }
    for (feature_row, label_row) in features.axis_iter(Axis(0)).zip(labels.axis_iter(Axis(0))) {
        let row: Vec<String> = feature_row
            .iter()
            .chain(label_row.iter())
            .map(|v| v.to_string())
            .collect();
        writer.write_record(&row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_batches_and_splits_labels() {
        let file = csv_file("a,b,y\n1,2,10\n3,4,20\n5, 6 ,30\n");
        let mut it = CsvDataSetIterator::<f64>::new(file.path(), 2, 1).unwrap();
        assert_eq!(
            it.headers().unwrap(),
            Some(vec!["a".to_string(), "b".to_string(), "y".to_string()])
        );

        let first = it.next().unwrap().unwrap();
        assert_eq!(first.features(), &arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn());
        assert_eq!(first.labels(), &arr2(&[[10.0], [20.0]]).into_dyn());
        let second = it.next().unwrap().unwrap();
        assert_eq!(second.features(), &arr2(&[[5.0, 6.0]]).into_dyn());
        assert!(it.next().is_none());

        it.reset().unwrap();
        assert_eq!(it.next().unwrap().unwrap(), first);
    }

    #[test]
    fn headerless_files() {
        let file = csv_file("1,2\n3,4\n");
        let mut it = CsvDataSetIterator::<f32>::new(file.path(), 10, 0)
            .unwrap()
            .with_headers(false)
            .unwrap();
        assert_eq!(it.headers().unwrap(), None);
        let batch = it.next().unwrap().unwrap();
        assert_eq!(batch.features(), &arr2(&[[1.0_f32, 2.0], [3.0, 4.0]]).into_dyn());
        assert_eq!(batch.labels().shape(), &[2, 0]);
    }

    #[test]
    fn reports_unparsable_fields() {
        let file = csv_file("a,b\n1,2\n3,oops\n");
        let mut it = CsvDataSetIterator::<f64>::new(file.path(), 5, 0).unwrap();
        match it.next() {
            Some(Err(PreprocessError::Parse { line, column, value })) => {
                assert_eq!(line, 3);
                assert_eq!(column, 1);
                assert_eq!(value, "oops");
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn too_many_label_columns() {
        let file = csv_file("a,b\n1,2\n");
        let mut it = CsvDataSetIterator::<f64>::new(file.path(), 5, 2).unwrap();
        assert!(matches!(
            it.next(),
            Some(Err(PreprocessError::InvalidArgument { .. }))
        ));
    }

    #[test]
    fn writes_features_then_labels() {
        let data = DataSet::new(
            arr2(&[[1.5_f64, 2.0]]).into_dyn(),
            arr2(&[[3.0_f64]]).into_dyn(),
        )
        .unwrap();
        let mut writer = Writer::from_writer(Vec::new());
        write_batch(&mut writer, &data).unwrap();
        let bytes = writer.into_inner().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "1.5,2,3\n");
    }
}
