//! Binary vector-difference constraint (the Euclidean "between" edge).

use crate::core::EdgeKind;
use crate::error::{GraphError, GraphResult};
use nalgebra::{DMatrix, DVector};

/// Edge kind measuring the relative displacement between two Rⁿ vertices.
///
/// # Mathematical Formulation
///
/// For vertices `x₀`, `x₁` and measurement `m`:
///
/// ```text
/// error = m − (x₁ − x₀)
/// ```
///
/// The Jacobian blocks are constant: `∂error/∂x₀ = I`, `∂error/∂x₁ = −I`.
/// The inverse measurement is the negated displacement, describing the same
/// constraint seen from the opposite endpoint.
///
/// # Initial Estimation
///
/// Forward-composes from either endpoint:
/// - slot 0 fixed → `x₁ = x₀ + m`
/// - slot 1 fixed → `x₀ = x₁ + m⁻¹`
#[derive(Debug, Clone)]
pub struct RelativeKind {
    dim: usize,
}

impl RelativeKind {
    /// Create a relative-displacement kind over Rⁿ states of dimension `dim`.
    pub fn new(dim: usize) -> GraphResult<Self> {
        if dim == 0 {
            return Err(GraphError::InvalidInput(
                "relative edge state dimension must be at least 1".to_string(),
            ));
        }
        Ok(Self { dim })
    }
}

impl RelativeKind {
    fn check_estimates(&self, estimates: &[DVector<f64>]) -> GraphResult<()> {
        if estimates.len() != 2 {
            return Err(GraphError::dimensions("relative edge arity", 2, estimates.len()));
        }
        for (slot, estimate) in estimates.iter().enumerate() {
            if estimate.len() != self.dim {
                return Err(GraphError::dimensions(
                    format!("relative edge vertex slot {slot}"),
                    self.dim,
                    estimate.len(),
                ));
            }
        }
        Ok(())
    }
}

impl EdgeKind for RelativeKind {
    type Measurement = DVector<f64>;

    fn dimension(&self) -> usize {
        self.dim
    }

    fn error(
        &self,
        measurement: &DVector<f64>,
        estimates: &[DVector<f64>],
    ) -> GraphResult<DVector<f64>> {
        self.check_estimates(estimates)?;
        if measurement.len() != self.dim {
            return Err(GraphError::dimensions(
                "relative edge measurement",
                self.dim,
                measurement.len(),
            ));
        }
        Ok(measurement - (&estimates[1] - &estimates[0]))
    }

    fn jacobians(
        &self,
        _measurement: &DVector<f64>,
        estimates: &[DVector<f64>],
    ) -> Option<GraphResult<Vec<DMatrix<f64>>>> {
        if let Err(err) = self.check_estimates(estimates) {
            return Some(Err(err));
        }
        let identity = DMatrix::identity(self.dim, self.dim);
        Some(Ok(vec![identity.clone(), -identity]))
    }

    fn initial_estimate(
        &self,
        measurement: &DVector<f64>,
        inverse_measurement: &DVector<f64>,
        fixed: &[usize],
        target: usize,
        estimates: &[DVector<f64>],
    ) -> GraphResult<DVector<f64>> {
        self.check_estimates(estimates)?;
        match (fixed, target) {
            ([0], 1) => Ok(&estimates[0] + measurement),
            ([1], 0) => Ok(&estimates[1] + inverse_measurement),
            _ => Err(GraphError::InvalidInput(format!(
                "relative edge inversion needs exactly the opposite endpoint fixed, \
                 got fixed {fixed:?} for target {target}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn test_error_vanishes_at_consistent_states() {
        let kind = RelativeKind::new(2).unwrap();
        let estimates = vec![dvector![1.0, 1.0], dvector![3.0, 0.0]];
        let error = kind.error(&dvector![2.0, -1.0], &estimates).unwrap();
        assert_eq!(error, dvector![0.0, 0.0]);
    }

    #[test]
    fn test_jacobian_signs() {
        let kind = RelativeKind::new(3).unwrap();
        let estimates = vec![dvector![0.0, 0.0, 0.0], dvector![1.0, 2.0, 3.0]];
        let blocks = kind.jacobians(&dvector![0.0, 0.0, 0.0], &estimates).unwrap().unwrap();
        assert_eq!(blocks[0], DMatrix::identity(3, 3));
        assert_eq!(blocks[1], -DMatrix::identity(3, 3));
    }

    #[test]
    fn test_initial_estimate_forward() {
        let kind = RelativeKind::new(2).unwrap();
        let m = dvector![2.0, -1.0];
        let estimates = vec![dvector![1.0, 1.0], dvector![0.0, 0.0]];
        let seeded = kind
            .initial_estimate(&m, &(-m.clone()), &[0], 1, &estimates)
            .unwrap();
        assert_eq!(seeded, dvector![3.0, 0.0]);
    }

    #[test]
    fn test_initial_estimate_reverse_uses_inverse() {
        let kind = RelativeKind::new(2).unwrap();
        let m = dvector![2.0, -1.0];
        let estimates = vec![dvector![0.0, 0.0], dvector![3.0, 0.0]];
        let seeded = kind
            .initial_estimate(&m, &(-m.clone()), &[1], 0, &estimates)
            .unwrap();
        assert_eq!(seeded, dvector![1.0, 1.0]);
    }

    #[test]
    fn test_initial_estimate_bad_fixed_set_rejected() {
        let kind = RelativeKind::new(2).unwrap();
        let m = dvector![2.0, -1.0];
        let estimates = vec![dvector![0.0, 0.0], dvector![3.0, 0.0]];
        assert!(kind
            .initial_estimate(&m, &(-m.clone()), &[], 0, &estimates)
            .is_err());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(RelativeKind::new(0).is_err());
    }

    #[test]
    fn test_measurement_dimension_checked() {
        let kind = RelativeKind::new(2).unwrap();
        let estimates = vec![dvector![0.0, 0.0], dvector![1.0, 1.0]];
        assert!(kind.error(&dvector![1.0], &estimates).is_err());
    }
}
