//! Vertex contract consumed by hyper-edges.
//!
//! A vertex owns a manifold-valued estimate with a known tangent-space dimension.
//! Edges only read estimates and route perturbations through the vertex's own
//! update operator (`oplus`); they never modify vertex state in place. The
//! optimizer and the graph own vertex lifetimes, edges hold identifiers only.

use crate::error::{GraphError, GraphResult};
use nalgebra::DVector;
use std::fmt;

/// Identifier of a vertex in the surrounding graph.
///
/// Edges store ids instead of references; the caller resolves them to concrete
/// vertices when invoking linearization or initial estimation.
pub type VertexId = usize;

/// Contract every optimization variable must satisfy.
///
/// The estimate is exposed as a plain coefficient vector so that edge kinds can
/// evaluate their measurement model without knowing the concrete vertex type.
/// `oplus` is the tangent-space update operator: it returns the coefficient
/// vector of `estimate ⊞ delta` without touching the stored state, which is what
/// numeric differentiation needs to apply the chain rule through the manifold
/// update.
pub trait Vertex: fmt::Debug + Send + Sync {
    /// Tangent-space dimension (degrees of freedom) of this vertex.
    fn dimension(&self) -> usize;

    /// Read-only snapshot of the current estimate as a coefficient vector.
    fn estimate(&self) -> DVector<f64>;

    /// Apply a tangent-space perturbation to the current estimate and return the
    /// perturbed coefficient vector. Pure: the stored estimate is unchanged.
    fn oplus(&self, delta: &DVector<f64>) -> GraphResult<DVector<f64>>;

    /// Replace the stored estimate. Used by the optimizer when applying a solved
    /// update and by `initial_estimate` when seeding an unknown vertex.
    fn set_estimate(&mut self, value: DVector<f64>) -> GraphResult<()>;
}

/// Euclidean vertex: the estimate lives in Rⁿ and `⊞` is vector addition.
#[derive(Debug, Clone)]
pub struct VectorVertex {
    value: DVector<f64>,
}

impl VectorVertex {
    /// Create a vertex from an initial estimate.
    pub fn new(value: DVector<f64>) -> Self {
        Self { value }
    }

    /// Convenience constructor for scalar states.
    pub fn scalar(value: f64) -> Self {
        Self {
            value: DVector::from_element(1, value),
        }
    }
}

impl Vertex for VectorVertex {
    fn dimension(&self) -> usize {
        self.value.len()
    }

    fn estimate(&self) -> DVector<f64> {
        self.value.clone()
    }

    fn oplus(&self, delta: &DVector<f64>) -> GraphResult<DVector<f64>> {
        if delta.len() != self.value.len() {
            return Err(GraphError::dimensions(
                "vector vertex perturbation",
                self.value.len(),
                delta.len(),
            ));
        }
        Ok(&self.value + delta)
    }

    fn set_estimate(&mut self, value: DVector<f64>) -> GraphResult<()> {
        if value.len() != self.value.len() {
            return Err(GraphError::dimensions(
                "vector vertex estimate",
                self.value.len(),
                value.len(),
            ));
        }
        self.value = value;
        Ok(())
    }
}

/// Planar rotation vertex: a single wrapped angle with `⊞` on the circle.
///
/// The estimate vector holds the angle in (-π, π]. Minimal manifold example:
/// the update operator wraps, so numeric differentiation of an edge connected
/// to this vertex exercises the chain rule through a non-Euclidean update.
#[derive(Debug, Clone)]
pub struct AngleVertex {
    angle: f64,
}

impl AngleVertex {
    pub fn new(angle: f64) -> Self {
        Self {
            angle: wrap_angle(angle),
        }
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }
}

/// Normalize an angle to (-π, π].
fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(2.0 * std::f64::consts::PI);
    if wrapped > std::f64::consts::PI {
        wrapped - 2.0 * std::f64::consts::PI
    } else {
        wrapped
    }
}

impl Vertex for AngleVertex {
    fn dimension(&self) -> usize {
        1
    }

    fn estimate(&self) -> DVector<f64> {
        DVector::from_element(1, self.angle)
    }

    fn oplus(&self, delta: &DVector<f64>) -> GraphResult<DVector<f64>> {
        if delta.len() != 1 {
            return Err(GraphError::dimensions("angle vertex perturbation", 1, delta.len()));
        }
        Ok(DVector::from_element(1, wrap_angle(self.angle + delta[0])))
    }

    fn set_estimate(&mut self, value: DVector<f64>) -> GraphResult<()> {
        if value.len() != 1 {
            return Err(GraphError::dimensions("angle vertex estimate", 1, value.len()));
        }
        self.angle = wrap_angle(value[0]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;
    use std::f64::consts::PI;

    fn assert_approx_eq(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() < eps, "{a} != {b} (eps {eps})");
    }

    #[test]
    fn test_vector_vertex_oplus_is_addition() {
        let vertex = VectorVertex::new(dvector![1.0, 2.0]);
        let perturbed = vertex.oplus(&dvector![0.5, -0.5]).unwrap();
        assert_eq!(perturbed, dvector![1.5, 1.5]);
        // stored estimate untouched
        assert_eq!(vertex.estimate(), dvector![1.0, 2.0]);
    }

    #[test]
    fn test_vector_vertex_dimension_mismatch() {
        let vertex = VectorVertex::new(dvector![1.0, 2.0]);
        assert!(vertex.oplus(&dvector![1.0]).is_err());

        let mut vertex = vertex;
        assert!(vertex.set_estimate(dvector![1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_scalar_constructor() {
        let vertex = VectorVertex::scalar(3.0);
        assert_eq!(vertex.dimension(), 1);
        assert_eq!(vertex.estimate()[0], 3.0);
    }

    #[test]
    fn test_angle_vertex_wraps() {
        let vertex = AngleVertex::new(PI - 0.1);
        let perturbed = vertex.oplus(&dvector![0.3]).unwrap();
        assert_approx_eq(perturbed[0], -PI + 0.2, 1e-12);
    }

    #[test]
    fn test_angle_vertex_set_estimate_wraps() {
        let mut vertex = AngleVertex::new(0.0);
        vertex.set_estimate(dvector![3.0 * PI]).unwrap();
        assert_approx_eq(vertex.angle(), PI, 1e-12);
    }
}
