//! Broadcast kernels: `z = f(x, broadcast(y, axes))`.
//!
//! The secondary operand `y` lines up with the primary `x` only along the
//! listed axes and is repeated along all the others. Axis lists are
//! canonicalized first, so `y` is always laid out in ascending axis order
//! and the order in which callers spell the axes does not matter.

use log::debug;
use ndarray::{ArrayBase, ArrayD, Data, DataMut, Dimension, Zip};

use crate::error::{PreprocessError, Result};
use crate::tensor::{canonicalize_axes, expand_secondary, projected_shape, DynArray, Element};

/// Outputs at least this large are evaluated on the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 1 << 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BroadcastOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Indicator of `x > y`: writes 1 where the primary is strictly greater, 0 otherwise.
    Max,
}

impl BroadcastOp {
    pub const ALL: [BroadcastOp; 5] = [
        BroadcastOp::Add,
        BroadcastOp::Sub,
        BroadcastOp::Mul,
        BroadcastOp::Div,
        BroadcastOp::Max,
    ];

    /// Stable numeric id of the op.
    pub fn opcode(self) -> i32 {
        match self {
            BroadcastOp::Add => 0,
            BroadcastOp::Sub => 1,
            BroadcastOp::Mul => 2,
            BroadcastOp::Div => 3,
            BroadcastOp::Max => 14,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BroadcastOp::Add => "broadcast_add",
            BroadcastOp::Sub => "broadcast_sub",
            BroadcastOp::Mul => "broadcast_mul",
            BroadcastOp::Div => "broadcast_div",
            BroadcastOp::Max => "broadcast_max",
        }
    }

    pub fn from_opcode(opcode: i32) -> Option<Self> {
        match opcode {
            0 => Some(BroadcastOp::Add),
            1 => Some(BroadcastOp::Sub),
            2 => Some(BroadcastOp::Mul),
            3 => Some(BroadcastOp::Div),
            14 => Some(BroadcastOp::Max),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// `Max` has no gradient and no symbolic value.
    pub fn is_differentiable(self) -> bool {
        !matches!(self, BroadcastOp::Max)
    }

    #[inline]
    pub fn apply<T: Element>(self, a: T, b: T) -> T {
        match self {
            BroadcastOp::Add => a + b,
            BroadcastOp::Sub => a - b,
            BroadcastOp::Mul => a * b,
            BroadcastOp::Div => a / b,
            // NaN compares false, so it lands on zero together with ties.
            BroadcastOp::Max => {
                if a > b {
                    T::one()
                } else {
                    T::zero()
                }
            }
        }
    }
}

fn check_operands(
    operation: &str,
    primary: &[usize],
    secondary: &[usize],
    axes: &[usize],
) -> Result<Vec<usize>> {
    let axes = canonicalize_axes(operation, axes, primary.len())?;
    if axes.is_empty() && !secondary.is_empty() {
        return Err(PreprocessError::invalid_argument(
            operation,
            format!(
                "an empty axis list needs a scalar secondary operand, got shape {secondary:?}"
            ),
        ));
    }
    let expected = projected_shape(primary, &axes);
    if expected != secondary {
        return Err(PreprocessError::invalid_argument(
            operation,
            format!(
                "secondary shape {secondary:?} does not match primary shape {primary:?} \
                 along axes {axes:?}, expected {expected:?}"
            ),
        ));
    }
    Ok(axes)
}

/// Computes `z[i] = op(x[i], y[project(i, axes)])`.
///
/// `z` must already have the shape of `x`. Use [`exec_inplace`] when the
/// destination is the primary operand itself.
pub fn exec<T, S1, D1, S2, D2>(
    op: BroadcastOp,
    x: &ArrayBase<S1, D1>,
    y: &ArrayBase<S2, D2>,
    z: &mut ArrayD<T>,
    axes: &[usize],
) -> Result<()>
where
    T: Element,
    S1: Data<Elem = T>,
    D1: Dimension,
    S2: Data<Elem = T>,
    D2: Dimension,
{
    let operation = op.name();
    if z.shape() != x.shape() {
        return Err(PreprocessError::invalid_argument(
            operation,
            format!(
                "destination shape {:?} differs from primary shape {:?}",
                z.shape(),
                x.shape()
            ),
        ));
    }
    let axes = check_operands(operation, x.shape(), y.shape(), axes)?;
    let expanded = expand_secondary(y.view().into_dyn(), &axes, x.ndim());
    debug!(
        "{} over shape {:?} along axes {:?} ({} elements)",
        operation,
        x.shape(),
        axes,
        x.len()
    );

    let zip = Zip::from(z.view_mut())
        .and(x.view().into_dyn())
        .and_broadcast(expanded);
    if x.len() >= PARALLEL_THRESHOLD {
        zip.par_for_each(|out, &a, &b| *out = op.apply(a, b));
    } else {
        zip.for_each(|out, &a, &b| *out = op.apply(a, b));
    }
    Ok(())
}

/// Same as [`exec`] with the primary operand as destination.
pub fn exec_inplace<T, S1, D1, S2, D2>(
    op: BroadcastOp,
    x: &mut ArrayBase<S1, D1>,
    y: &ArrayBase<S2, D2>,
    axes: &[usize],
) -> Result<()>
where
    T: Element,
    S1: DataMut<Elem = T>,
    D1: Dimension,
    S2: Data<Elem = T>,
    D2: Dimension,
{
    let operation = op.name();
    let axes = check_operands(operation, x.shape(), y.shape(), axes)?;
    let expanded = expand_secondary(y.view().into_dyn(), &axes, x.ndim());
    debug!(
        "{} in place over shape {:?} along axes {:?}",
        operation,
        x.shape(),
        axes
    );

    let len = x.len();
    let zip = Zip::from(x.view_mut().into_dyn()).and_broadcast(expanded);
    if len >= PARALLEL_THRESHOLD {
        zip.par_for_each(|a, &b| *a = op.apply(*a, b));
    } else {
        zip.for_each(|a, &b| *a = op.apply(*a, b));
    }
    Ok(())
}

/// Allocating form of the max indicator: 1 where `x > broadcast(y, axes)`, else 0.
pub fn broadcast_max<T, S1, D1, S2, D2>(
    x: &ArrayBase<S1, D1>,
    y: &ArrayBase<S2, D2>,
    axes: &[usize],
) -> Result<ArrayD<T>>
where
    T: Element,
    S1: Data<Elem = T>,
    D1: Dimension,
    S2: Data<Elem = T>,
    D2: Dimension,
{
    let mut z = ArrayD::zeros(x.shape());
    exec(BroadcastOp::Max, x, y, &mut z, axes)?;
    Ok(z)
}

/// Runtime-typed entry point. Complex operands are rejected with
/// `Unsupported`, real operands of different widths with `TypeMismatch`.
pub fn exec_dyn(op: BroadcastOp, x: &DynArray, y: &DynArray, axes: &[usize]) -> Result<DynArray> {
    for dtype in [x.dtype(), y.dtype()] {
        if dtype.is_complex() {
            return Err(PreprocessError::unsupported(op.name(), dtype));
        }
    }
    match (x, y) {
        (DynArray::F32(x), DynArray::F32(y)) => {
            let mut z = ArrayD::zeros(x.raw_dim());
            exec(op, x, y, &mut z, axes)?;
            Ok(DynArray::F32(z))
        }
        (DynArray::F64(x), DynArray::F64(y)) => {
            let mut z = ArrayD::zeros(x.raw_dim());
            exec(op, x, y, &mut z, axes)?;
            Ok(DynArray::F64(z))
        }
        _ => Err(PreprocessError::type_mismatch(
            op.name(),
            x.dtype(),
            y.dtype(),
        )),
    }
}
