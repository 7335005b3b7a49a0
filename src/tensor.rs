//! Array plumbing shared by the kernels and the normalizers.
//!
//! Tensors are plain `ndarray` arrays. This module adds the small amount of
//! glue the rest of the crate needs on top of them: element type tags, axis
//! canonicalization and projection, conditional replacement and the row
//! vector operations used for rank 1 and rank 2 data.

use std::fmt::{self, Debug, Display};

use ndarray::{Array1, ArrayBase, ArrayD, ArrayViewD, Axis, Data, DataMut, Dimension};
use num_complex::Complex;
use num_traits::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};

use crate::broadcast::{self, BroadcastOp};
use crate::error::{PreprocessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
    Complex64,
    Complex128,
}

impl DType {
    pub fn is_complex(self) -> bool {
        matches!(self, DType::Complex64 | DType::Complex128)
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
        };
        f.write_str(name)
    }
}

/// Real scalar types the kernels and normalizers operate on.
pub trait Element: Float + FromPrimitive + Debug + Display + Send + Sync + 'static {
    const DTYPE: DType;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;
}

/// An array whose element type is only known at runtime.
///
/// Complex variants exist so that callers holding complex data get a proper
/// `Unsupported` error from the generic entry points instead of a panic.
#[derive(Debug, Clone, PartialEq)]
pub enum DynArray {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    Complex64(ArrayD<Complex<f32>>),
    Complex128(ArrayD<Complex<f64>>),
}

impl DynArray {
    pub fn dtype(&self) -> DType {
        match self {
            DynArray::F32(_) => DType::F32,
            DynArray::F64(_) => DType::F64,
            DynArray::Complex64(_) => DType::Complex64,
            DynArray::Complex128(_) => DType::Complex128,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            DynArray::F32(a) => a.shape(),
            DynArray::F64(a) => a.shape(),
            DynArray::Complex64(a) => a.shape(),
            DynArray::Complex128(a) => a.shape(),
        }
    }

    pub fn rank(&self) -> usize {
        self.shape().len()
    }
}

impl From<ArrayD<f32>> for DynArray {
    fn from(array: ArrayD<f32>) -> Self {
        DynArray::F32(array)
    }
}

impl From<ArrayD<f64>> for DynArray {
    fn from(array: ArrayD<f64>) -> Self {
        DynArray::F64(array)
    }
}

impl From<ArrayD<Complex<f32>>> for DynArray {
    fn from(array: ArrayD<Complex<f32>>) -> Self {
        DynArray::Complex64(array)
    }
}

impl From<ArrayD<Complex<f64>>> for DynArray {
    fn from(array: ArrayD<Complex<f64>>) -> Self {
        DynArray::Complex128(array)
    }
}

/// Sorts and deduplicates an axis list and checks every axis against `rank`.
pub fn canonicalize_axes(operation: &str, axes: &[usize], rank: usize) -> Result<Vec<usize>> {
    let mut canonical = axes.to_vec();
    canonical.sort_unstable();
    canonical.dedup();
    if let Some(&axis) = canonical.last() {
        if axis >= rank {
            return Err(PreprocessError::invalid_argument(
                operation,
                format!("axis {axis} is out of range for a tensor of rank {rank}"),
            ));
        }
    }
    Ok(canonical)
}

/// The shape of `shape` restricted to the (canonical) `axes`.
pub fn projected_shape(shape: &[usize], axes: &[usize]) -> Vec<usize> {
    axes.iter().map(|&axis| shape[axis]).collect()
}

/// Inserts unit axes into `secondary` at every position of a rank `rank`
/// tensor that is not listed in `axes`, so it broadcasts against the primary.
pub(crate) fn expand_secondary<'a, T>(
    secondary: ArrayViewD<'a, T>,
    axes: &[usize],
    rank: usize,
) -> ArrayViewD<'a, T> {
    let mut expanded = secondary;
    for axis in 0..rank {
        if axes.binary_search(&axis).is_err() {
            expanded = expanded.insert_axis(Axis(axis));
        }
    }
    expanded
}

/// Replaces every element equal to `from` with `to`.
pub fn replace_where_eq<T, S, D>(array: &mut ArrayBase<S, D>, from: T, to: T)
where
    T: Element,
    S: DataMut<Elem = T>,
    D: Dimension,
{
    array.mapv_inplace(|v| if v == from { to } else { v });
}

fn row_vector_op<T, S, D>(
    operation: &str,
    op: BroadcastOp,
    array: &mut ArrayBase<S, D>,
    row: &Array1<T>,
) -> Result<()>
where
    T: Element,
    S: DataMut<Elem = T>,
    D: Dimension,
{
    let rank = array.ndim();
    if rank == 0 || rank > 2 {
        return Err(PreprocessError::invalid_argument(
            operation,
            format!("row vector operations need a tensor of rank 1 or 2, got rank {rank}"),
        ));
    }
    broadcast::exec_inplace(op, array, row, &[rank - 1])
}

pub fn sub_row_vector<T, S, D>(array: &mut ArrayBase<S, D>, row: &Array1<T>) -> Result<()>
where
    T: Element,
    S: DataMut<Elem = T>,
    D: Dimension,
{
    row_vector_op("sub_row_vector", BroadcastOp::Sub, array, row)
}

pub fn div_row_vector<T, S, D>(array: &mut ArrayBase<S, D>, row: &Array1<T>) -> Result<()>
where
    T: Element,
    S: DataMut<Elem = T>,
    D: Dimension,
{
    row_vector_op("div_row_vector", BroadcastOp::Div, array, row)
}

pub fn mul_row_vector<T, S, D>(array: &mut ArrayBase<S, D>, row: &Array1<T>) -> Result<()>
where
    T: Element,
    S: DataMut<Elem = T>,
    D: Dimension,
{
    row_vector_op("mul_row_vector", BroadcastOp::Mul, array, row)
}

pub fn add_row_vector<T, S, D>(array: &mut ArrayBase<S, D>, row: &Array1<T>) -> Result<()>
where
    T: Element,
    S: DataMut<Elem = T>,
    D: Dimension,
{
    row_vector_op("add_row_vector", BroadcastOp::Add, array, row)
}

/// Number of features of `array` along the feature axis: the only axis of a
/// rank 1 row, the columns of a matrix and axis 1 otherwise.
pub fn feature_count<T, S, D>(operation: &str, array: &ArrayBase<S, D>) -> Result<usize>
where
    S: Data<Elem = T>,
    D: Dimension,
{
    match array.ndim() {
        0 => Err(PreprocessError::invalid_argument(
            operation,
            "cannot locate a feature axis in a rank 0 tensor",
        )),
        1 => Ok(array.len_of(Axis(0))),
        _ => Ok(array.len_of(Axis(1))),
    }
}
