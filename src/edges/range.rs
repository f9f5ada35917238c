//! Binary Euclidean-distance constraint between planar points.

use crate::core::{EdgeKind, Measurement};
use crate::error::{GraphError, GraphResult};
use nalgebra::{DMatrix, DVector};

/// Distance measurement between two points.
///
/// A distance is symmetric: both endpoints observe the same value, so the
/// inverse measurement is the measurement itself (unlike signed scalar
/// measurements, which negate).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance(pub f64);

impl Measurement for Distance {
    fn inverse(&self) -> Self {
        *self
    }
}

/// Edge kind measuring the distance between two planar point vertices.
///
/// A nonlinear constraint typical of range-only sensors (UWB beacons, sonar).
///
/// # Mathematical Formulation
///
/// For points `x₀, x₁ ∈ R²` and measured distance `m`:
///
/// ```text
/// d     = ‖x₁ − x₀‖
/// error = m − d
/// ```
///
/// With the unit direction `u = (x₁ − x₀)/d`, the analytic Jacobian blocks are
///
/// ```text
/// ∂error/∂x₀ =  uᵀ
/// ∂error/∂x₁ = −uᵀ
/// ```
///
/// Coincident points make the direction undefined; the Jacobian falls back to
/// zero rows there and the (degenerate) constraint contributes nothing to the
/// gradient direction.
///
/// # Initial Estimation
///
/// A single range fixes only a circle around the fixed endpoint, so no unique
/// seed exists: `initial_estimate` always reports
/// [`GraphError::Unsupported`]. Callers seed range-constrained vertices from
/// other edges.
#[derive(Debug, Clone)]
pub struct RangeKind;

impl RangeKind {
    fn check_estimates(estimates: &[DVector<f64>]) -> GraphResult<()> {
        if estimates.len() != 2 {
            return Err(GraphError::dimensions("range edge arity", 2, estimates.len()));
        }
        for (slot, estimate) in estimates.iter().enumerate() {
            if estimate.len() != 2 {
                return Err(GraphError::dimensions(
                    format!("range edge vertex slot {slot}"),
                    2,
                    estimate.len(),
                ));
            }
        }
        Ok(())
    }
}

impl EdgeKind for RangeKind {
    type Measurement = Distance;

    fn dimension(&self) -> usize {
        1
    }

    fn error(
        &self,
        measurement: &Distance,
        estimates: &[DVector<f64>],
    ) -> GraphResult<DVector<f64>> {
        Self::check_estimates(estimates)?;
        let distance = (&estimates[1] - &estimates[0]).norm();
        Ok(DVector::from_element(1, measurement.0 - distance))
    }

    fn jacobians(
        &self,
        _measurement: &Distance,
        estimates: &[DVector<f64>],
    ) -> Option<GraphResult<Vec<DMatrix<f64>>>> {
        if let Err(err) = Self::check_estimates(estimates) {
            return Some(Err(err));
        }
        let difference = &estimates[1] - &estimates[0];
        let distance = difference.norm();

        let mut block_0 = DMatrix::zeros(1, 2);
        let mut block_1 = DMatrix::zeros(1, 2);
        if distance > 0.0 {
            let direction = difference / distance;
            block_0[(0, 0)] = direction[0];
            block_0[(0, 1)] = direction[1];
            block_1[(0, 0)] = -direction[0];
            block_1[(0, 1)] = -direction[1];
        }
        Some(Ok(vec![block_0, block_1]))
    }

    fn initial_estimate(
        &self,
        _measurement: &Distance,
        _inverse_measurement: &Distance,
        _fixed: &[usize],
        _target: usize,
        _estimates: &[DVector<f64>],
    ) -> GraphResult<DVector<f64>> {
        Err(GraphError::Unsupported(
            "a range measurement fixes only a circle; no unique initial estimate exists".to_string(),
        ))
    }
}
