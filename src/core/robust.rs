//! Robust kernels for outlier down-weighting of edge residuals.
//!
//! A robust kernel limits the influence of outlier measurements on the assembled
//! normal equations. Where standard least squares contributes `chi² = r²` for a
//! residual of Mahalanobis norm `r`, a robustified edge contributes
//! `chi² = w(r)·r²` with a weight produced by the kernel. The edge applies
//! `sqrt(w(r))` to its stored error vector once per linearization pass so that
//! the quadratic form picks up the compounded weight automatically.
//!
//! # Weighting Contract
//!
//! Every kernel is a pure function of its width `w` and the residual norm `r`:
//!
//! - `weight(r) = 1` for `r ≤ w` (inliers are untouched)
//! - `weight` is monotonically non-increasing and continuous for `r > w`
//! - `weight(0) = 1` by convention, avoiding a division by zero at exact fit
//!
//! No specific kernel family is mandated; any policy satisfying the contract can
//! be plugged into an edge.

use crate::error::{GraphError, GraphResult};
use std::fmt;

/// Trait for robust weighting policies.
///
/// Implementations carry no mutable state; the same kernel instance may be
/// shared across edges and linearization passes.
pub trait RobustKernel: fmt::Debug + Send + Sync {
    /// Width parameter: the residual norm up to which measurements keep full weight.
    fn width(&self) -> f64;

    /// Weight for a residual of Mahalanobis norm `r`.
    ///
    /// Must satisfy the module-level contract: 1 up to the width, continuous and
    /// non-increasing past it.
    fn weight(&self, norm: f64) -> f64;
}

/// Kernel that performs no down-weighting (standard least squares).
#[derive(Debug, Clone)]
pub struct TrivialKernel;

impl RobustKernel for TrivialKernel {
    fn width(&self) -> f64 {
        f64::INFINITY
    }

    fn weight(&self, _norm: f64) -> f64 {
        1.0
    }
}

/// Huber kernel: full weight for inliers, weight ∝ 1/r past the width.
///
/// Mathematical formulation (norm `r`, width `w`):
///
/// ```text
/// weight(r) = {  1      if r ≤ w
///            {  w / r   if r > w
/// ```
///
/// The compounded cost `weight(r)·r²` grows linearly (`w·r`) in the outlier
/// region, the classical Huber behavior. Continuous at `r = w`.
#[derive(Debug, Clone)]
pub struct HuberKernel {
    width: f64,
}

impl HuberKernel {
    /// Create a Huber kernel with the given width.
    ///
    /// # Arguments
    /// * `width` - Transition point between quadratic and linear cost, must be positive
    pub fn new(width: f64) -> GraphResult<Self> {
        if width <= 0.0 || !width.is_finite() {
            return Err(GraphError::InvalidInput(format!(
                "robust kernel width must be positive and finite, got {width}"
            )));
        }
        Ok(Self { width })
    }

    /// Huber kernel with the standard 1.345 width (95% efficiency on Gaussian data).
    pub fn default_width() -> Self {
        Self { width: 1.345 }
    }
}

impl RobustKernel for HuberKernel {
    fn width(&self) -> f64 {
        self.width
    }

    fn weight(&self, norm: f64) -> f64 {
        if norm <= self.width {
            1.0
        } else {
            self.width / norm
        }
    }
}

/// Geman-McClure style kernel: weight ∝ 1/r² past the width.
///
/// Mathematical formulation (norm `r`, width `w`):
///
/// ```text
/// weight(r) = {  1          if r ≤ w
///            {  (w / r)²   if r > w
/// ```
///
/// The compounded cost saturates at `w²` for large residuals, so gross outliers
/// contribute a bounded amount (redescending influence). Continuous at `r = w`.
#[derive(Debug, Clone)]
pub struct GemanMcClureKernel {
    width: f64,
}

impl GemanMcClureKernel {
    /// Create a Geman-McClure kernel with the given width.
    pub fn new(width: f64) -> GraphResult<Self> {
        if width <= 0.0 || !width.is_finite() {
            return Err(GraphError::InvalidInput(format!(
                "robust kernel width must be positive and finite, got {width}"
            )));
        }
        Ok(Self { width })
    }
}

impl RobustKernel for GemanMcClureKernel {
    fn width(&self) -> f64 {
        self.width
    }

    fn weight(&self, norm: f64) -> f64 {
        if norm <= self.width {
            1.0
        } else {
            let ratio = self.width / norm;
            ratio * ratio
        }
    }
}
