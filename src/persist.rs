//! Saving and restoring fitted normalizers as pickle files.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_pickle::{DeOptions, SerOptions};

use crate::error::Result;
use crate::scalers::{DataSetNormalizer, NormalizerSnapshot, NormalizerStrategy};
use crate::stats::NormalizerStats;

pub fn save_normalizer<S, P>(
    path: impl AsRef<Path>,
    normalizer: &DataSetNormalizer<S, P>,
) -> Result<()>
where
    S: NormalizerStats + Serialize,
    P: NormalizerStrategy<S>,
{
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    serde_pickle::to_writer(&mut writer, &normalizer.snapshot(), SerOptions::new())?;
    writer.flush()?;
    info!("Saved normalizer to {}", path.display());
    Ok(())
}

pub fn load_snapshot<S: DeserializeOwned>(path: impl AsRef<Path>) -> Result<NormalizerSnapshot<S>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_pickle::from_reader(reader, DeOptions::new())?)
}

/// Restores a normalizer saved with [`save_normalizer`], pairing it with `strategy`.
pub fn load_normalizer<S, P>(
    path: impl AsRef<Path>,
    strategy: P,
) -> Result<DataSetNormalizer<S, P>>
where
    S: NormalizerStats + DeserializeOwned,
    P: NormalizerStrategy<S>,
{
    let snapshot = load_snapshot(path.as_ref())?;
    info!("Loaded normalizer from {}", path.as_ref().display());
    DataSetNormalizer::from_snapshot(strategy, snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DataSet;
    use crate::error::PreprocessError;
    use crate::scalers::{NormalizerStandardize, StandardizeStrategy};
    use crate::stats::DistributionStats;
    use ndarray::{arr1, arr2, Array1};
    use tempfile::tempdir;

    #[test]
    fn saved_normalizer_transforms_identically() {
        let data = DataSet::new(
            arr2(&[[1.0_f64, 5.0], [1.0, 7.0], [1.0, 9.0]]).into_dyn(),
            arr2(&[[2.0_f64], [4.0], [8.0]]).into_dyn(),
        )
        .unwrap();
        let mut normalizer = NormalizerStandardize::standardize();
        normalizer.fit_label(true);
        normalizer.fit(&data).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("normalizer.pkl");
        save_normalizer(&path, &normalizer).unwrap();
        let restored: NormalizerStandardize<f64> =
            load_normalizer(&path, StandardizeStrategy).unwrap();

        assert_eq!(restored.snapshot(), normalizer.snapshot());
        let (mut a, mut b) = (data.clone(), data);
        normalizer.pre_process(&mut a).unwrap();
        restored.pre_process(&mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tampered_stats_are_rejected_on_load() {
        #[derive(Serialize)]
        struct Stats {
            mean: Array1<f64>,
            std: Array1<f64>,
        }
        let snapshot = NormalizerSnapshot {
            fit_labels: false,
            feature_stats: Some(Stats {
                mean: arr1(&[0.0, 0.0]),
                std: arr1(&[2.0, -2.0]),
            }),
            label_stats: None,
        };
        let dir = tempdir().unwrap();
        let path = dir.path().join("normalizer.pkl");
        let mut file = File::create(&path).unwrap();
        serde_pickle::to_writer(&mut file, &snapshot, SerOptions::new()).unwrap();
        drop(file);

        let loaded: Result<NormalizerStandardize<f64>> =
            load_normalizer(&path, StandardizeStrategy);
        assert!(matches!(loaded, Err(PreprocessError::Pickle(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = load_snapshot::<DistributionStats<f64>>(dir.path().join("nope.pkl")).unwrap_err();
        assert!(matches!(err, PreprocessError::Io(_)));
    }
}
