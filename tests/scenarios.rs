use std::io::Write;

use approx::assert_abs_diff_eq;
use dataset_preprocess::{
    broadcast::{exec_dyn, BroadcastOp},
    broadcast_max,
    csv_iterator::CsvDataSetIterator,
    persist::{load_normalizer, save_normalizer},
    DataSet, DataSetIterator, DynArray, ListDataSetIterator, NormalizerStandardize,
    PreprocessError, StandardizeStrategy,
};
use ndarray::{arr1, arr2, Array, ArrayD, IxDyn};
use num_complex::Complex;
use tempfile::tempdir;

const Z: f64 = 1.224_744_871_391_589;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn features_only(features: ArrayD<f64>) -> DataSet<f64> {
    let rows = features.shape()[0];
    DataSet::new(features, ArrayD::zeros(IxDyn(&[rows, 1]))).unwrap()
}

#[test]
fn s1_standardize_and_restore_matrix() {
    let original = features_only(arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).into_dyn());
    let mut normalizer = NormalizerStandardize::standardize();
    normalizer.fit(&original).unwrap();

    let mut data = original.clone();
    normalizer.pre_process(&mut data).unwrap();
    assert_abs_diff_eq!(
        data.features(),
        &arr2(&[[-Z, -Z], [0.0, 0.0], [Z, Z]]).into_dyn(),
        epsilon = 1e-4
    );
    normalizer.revert(&mut data).unwrap();
    assert_abs_diff_eq!(data.features(), original.features(), epsilon = 1e-9);
}

#[test]
fn s2_constant_feature() {
    let original = features_only(arr2(&[[1.0, 5.0], [1.0, 7.0], [1.0, 9.0]]).into_dyn());
    let mut normalizer = NormalizerStandardize::standardize();
    normalizer.fit(&original).unwrap();
    assert_eq!(normalizer.feature_stats().unwrap().std()[0], 0.0);

    let mut data = original.clone();
    normalizer.pre_process(&mut data).unwrap();
    assert_abs_diff_eq!(
        data.features(),
        &arr2(&[[0.0, -Z], [0.0, 0.0], [0.0, Z]]).into_dyn(),
        epsilon = 1e-4
    );
    normalizer.revert(&mut data).unwrap();
    assert_abs_diff_eq!(data.features(), original.features(), epsilon = 1e-9);
}

#[test]
fn s3_rank_three_round_trip() {
    let features = Array::from_shape_fn(IxDyn(&[2, 3, 4]), |idx| {
        ((idx[0] + 1) * (idx[1] + 2)) as f64 + (idx[2] as f64).sqrt()
    });
    let original = features_only(features);
    let mut normalizer = NormalizerStandardize::standardize();
    normalizer.fit(&original).unwrap();
    let stats = normalizer.feature_stats().unwrap();
    assert_eq!(stats.mean().len(), 3);
    assert_eq!(stats.std().len(), 3);

    let mut data = original.clone();
    normalizer.transform_features(data.features_mut()).unwrap();
    assert!(data.features() != original.features());
    normalizer.revert_features(data.features_mut()).unwrap();
    assert_abs_diff_eq!(data.features(), original.features(), epsilon = 1e-9);
}

#[test]
fn s4_broadcast_max_indicator() {
    let x = arr2(&[[1.0_f64, 4.0], [3.0, 2.0]]);
    let y = arr1(&[2.0_f64, 3.0]);
    let z = broadcast_max(&x, &y, &[1]).unwrap();
    assert_eq!(z, arr2(&[[0.0, 1.0], [1.0, 0.0]]).into_dyn());
}

#[test]
fn s5_ties_are_zero() {
    let x = arr2(&[[7.0_f32, -1.0, 0.5], [7.0, -1.0, 0.5]]);
    let y = arr1(&[7.0_f32, -1.0, 0.5]);
    let z = broadcast_max(&x, &y, &[1]).unwrap();
    assert_eq!(z, ArrayD::<f32>::zeros(IxDyn(&[2, 3])));
}

#[test]
fn s6_iterator_fit_equals_data_set_fit() {
    init();
    let first = features_only(arr2(&[[1.0, 2.0]]).into_dyn());
    let second = features_only(arr2(&[[3.0, 4.0]]).into_dyn());
    let mut iterator = ListDataSetIterator::new(vec![first.clone(), second.clone()]);

    let mut streamed = NormalizerStandardize::standardize();
    streamed.fit_iter(&mut iterator).unwrap();
    let mut whole = NormalizerStandardize::standardize();
    whole.fit(&DataSet::merge(&[first, second]).unwrap()).unwrap();

    assert_eq!(
        streamed.feature_stats().unwrap(),
        whole.feature_stats().unwrap()
    );
    assert_eq!(streamed.feature_stats().unwrap().mean(), &arr1(&[2.0, 3.0]));
}

#[test]
fn complex_operands_are_unsupported() {
    let x: DynArray = ArrayD::from_elem(IxDyn(&[2]), Complex::new(1.0_f64, 2.0)).into();
    let y: DynArray = ArrayD::from_elem(IxDyn(&[2]), Complex::new(0.0_f64, 0.0)).into();
    let err = exec_dyn(BroadcastOp::Max, &x, &y, &[0]).unwrap_err();
    assert!(matches!(err, PreprocessError::Unsupported { .. }));
    assert_eq!(BroadcastOp::from_opcode(14), Some(BroadcastOp::Max));
}

#[test]
fn csv_fit_persist_and_transform() {
    init();
    let dir = tempdir().unwrap();
    let csv_path = dir.path().join("train.csv");
    let mut file = std::fs::File::create(&csv_path).unwrap();
    writeln!(file, "temperature,co2,occupancy").unwrap();
    let rows = [
        (20.0, 400.0, 1.0),
        (22.0, 600.0, 3.0),
        (24.0, 800.0, 5.0),
        (26.0, 1000.0, 7.0),
    ];
    for (t, c, o) in rows {
        writeln!(file, "{t},{c},{o}").unwrap();
    }
    drop(file);

    let mut iterator = CsvDataSetIterator::<f64>::new(&csv_path, 3, 1).unwrap();
    let mut normalizer = NormalizerStandardize::standardize();
    normalizer.fit_label(true);
    normalizer.fit_iter(&mut iterator).unwrap();
    assert_eq!(normalizer.feature_stats().unwrap().mean(), &arr1(&[23.0, 700.0]));
    assert_eq!(normalizer.label_stats().unwrap().mean(), &arr1(&[4.0]));

    let stats_path = dir.path().join("normalizer.pkl");
    save_normalizer(&stats_path, &normalizer).unwrap();
    let restored: NormalizerStandardize<f64> =
        load_normalizer(&stats_path, StandardizeStrategy).unwrap();

    // the iterator was left at the first batch
    let mut batch = iterator.next().unwrap().unwrap();
    assert_eq!(batch.num_examples(), 3);
    let original = batch.clone();
    restored.pre_process(&mut batch).unwrap();
    assert_abs_diff_eq!(batch.features()[[0, 0]], -3.0 / 5.0_f64.sqrt(), epsilon = 1e-9);
    restored.revert(&mut batch).unwrap();
    assert_abs_diff_eq!(batch.features(), original.features(), epsilon = 1e-9);
    assert_abs_diff_eq!(batch.labels(), original.labels(), epsilon = 1e-9);

    iterator.reset().unwrap();
    assert_eq!(iterator.count(), 2);
}
