//! K-ary linear sum constraint over scalar vertices.

use crate::core::EdgeKind;
use crate::error::{GraphError, GraphResult};
use nalgebra::{DMatrix, DVector};

/// Hyper-edge kind constraining the sum of K scalar states.
///
/// The canonical variable-arity constraint: one measurement observes the sum of
/// every connected scalar vertex.
///
/// # Mathematical Formulation
///
/// For vertices `x₀ … x_{K-1}` and measurement `m`:
///
/// ```text
/// error = m − Σᵢ xᵢ
/// ```
///
/// The residual dimension is 1 regardless of the arity; each Jacobian block is
/// the 1×1 matrix `[−1]`.
///
/// # Initial Estimation
///
/// With every slot except the target fixed, the model inverts directly:
/// the target is seeded with `m − Σ_{fixed} xᵢ`. Any other fixed set leaves the
/// inversion underdetermined and is rejected.
#[derive(Debug, Clone)]
pub struct SumKind;

impl EdgeKind for SumKind {
    type Measurement = f64;

    fn dimension(&self) -> usize {
        1
    }

    fn error(&self, measurement: &f64, estimates: &[DVector<f64>]) -> GraphResult<DVector<f64>> {
        let mut sum = 0.0;
        for (slot, estimate) in estimates.iter().enumerate() {
            if estimate.len() != 1 {
                return Err(GraphError::dimensions(
                    format!("sum edge vertex slot {slot}"),
                    1,
                    estimate.len(),
                ));
            }
            sum += estimate[0];
        }
        Ok(DVector::from_element(1, measurement - sum))
    }

    fn jacobians(
        &self,
        _measurement: &f64,
        estimates: &[DVector<f64>],
    ) -> Option<GraphResult<Vec<DMatrix<f64>>>> {
        Some(Ok(estimates
            .iter()
            .map(|_| DMatrix::from_element(1, 1, -1.0))
            .collect()))
    }

    fn initial_estimate(
        &self,
        measurement: &f64,
        _inverse_measurement: &f64,
        fixed: &[usize],
        target: usize,
        estimates: &[DVector<f64>],
    ) -> GraphResult<DVector<f64>> {
        let arity = estimates.len();
        if fixed.len() != arity - 1 {
            return Err(GraphError::InvalidInput(format!(
                "sum edge inversion needs all {} non-target vertices fixed, got {}",
                arity - 1,
                fixed.len()
            )));
        }
        let mut fixed_sum = 0.0;
        for slot in 0..arity {
            if slot == target {
                continue;
            }
            if !fixed.contains(&slot) {
                return Err(GraphError::InvalidInput(format!(
                    "sum edge inversion requires slot {slot} in the fixed set"
                )));
            }
            fixed_sum += estimates[slot][0];
        }
        Ok(DVector::from_element(1, measurement - fixed_sum))
    }
}
