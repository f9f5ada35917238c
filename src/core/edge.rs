//! Variable-arity hyper-edge abstraction.
//!
//! A [`MultiEdge`] connects an ordered, resizable list of vertices and owns a
//! measurement, an information matrix, and the derived error/Jacobian/weight
//! state recomputed at every linearization. The per-kind measurement model lives
//! behind the [`EdgeKind`] capability contract; everything the optimizer loop
//! needs is generic over the kind, with the object-safe [`Edge`] trait as the
//! dynamic-dispatch escape hatch for plugin-supplied kinds.
//!
//! # Lifecycle
//!
//! ```text
//! Unattached (arity 0)
//!   └─ resize(n) ─▶ Sized
//!        └─ set_measurement + set_information ─▶ Configured
//!             └─ linearize ─▶ Linearized (error + Jacobians valid)
//!                  └─ map blocks + construct_quadratic_form ─▶ Assembled
//! ```
//!
//! Re-linearizing invalidates the assembled state of the pass; the optimizer
//! sequences linearize-all before assemble-any, and assemble before solve.
//! Using an edge ahead of its state (resize to zero, linearize before it is
//! configured, assemble before blocks are bound) is a typed error; continuing
//! would corrupt shared Hessian state.

use crate::core::hessian::{pair_count, pair_index, BlockArena, HessianBlock};
use crate::core::robust::RobustKernel;
use crate::core::vertex::{Vertex, VertexId};
use crate::error::{GraphError, GraphResult};
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// Central-difference step for the numeric Jacobian fallback.
const NUMERIC_DELTA: f64 = 1e-6;

/// Contract for measurement types carried by edges.
///
/// The algebraic inverse is stored alongside the primary measurement for reuse
/// by reverse-direction initial estimation; [`MultiEdge`] keeps the two mutually
/// consistent by recomputing one whenever the other is set.
pub trait Measurement: Clone + fmt::Debug + Send + Sync {
    /// The algebraic inverse of this measurement (e.g. the negated vector for a
    /// relative-displacement measurement, the inverse transform for a pose).
    fn inverse(&self) -> Self;
}

impl Measurement for DVector<f64> {
    fn inverse(&self) -> Self {
        -self
    }
}

/// Negation is the convention for signed scalar measurements (sums,
/// displacements along an axis). Unsigned quantities such as distances need
/// their own wrapper type with the appropriate inverse.
impl Measurement for f64 {
    fn inverse(&self) -> Self {
        -self
    }
}

/// Capability contract for a concrete edge kind.
///
/// An edge kind supplies the per-kind mathematics: the residual of its
/// measurement model, optionally analytic Jacobians, and the forward model
/// inversion used for initial estimation. The residual dimension is fixed per
/// kind and independent of the number of connected vertices.
///
/// Estimates are passed as plain coefficient vectors (one per connected vertex,
/// in slot order) so that the numeric differentiation fallback can evaluate the
/// model at perturbed states produced by each vertex's own update operator.
pub trait EdgeKind: fmt::Debug + Send + Sync {
    /// Measurement type of this kind.
    type Measurement: Measurement;

    /// Residual dimension D.
    fn dimension(&self) -> usize;

    /// Residual of the measurement model at the given vertex estimates.
    fn error(
        &self,
        measurement: &Self::Measurement,
        estimates: &[DVector<f64>],
    ) -> GraphResult<DVector<f64>>;

    /// Analytic Jacobian blocks, one D×(tangent-dim) matrix per vertex, or
    /// `None` to fall back to central-difference numeric differentiation.
    ///
    /// When provided, each block must be the derivative of the residual with
    /// respect to a tangent perturbation of that vertex through its own update
    /// operator, holding the others fixed. Analytic and numeric derivations
    /// must agree within solver tolerance.
    fn jacobians(
        &self,
        _measurement: &Self::Measurement,
        _estimates: &[DVector<f64>],
    ) -> Option<GraphResult<Vec<DMatrix<f64>>>> {
        None
    }

    /// Forward-solve the measurement model for the vertex at slot `target`,
    /// treating the slots in `fixed` as known.
    ///
    /// Which fixed set is acceptable is a per-kind contract; kinds must reject
    /// sets they cannot invert with a typed error. Kinds whose measurement does
    /// not determine any vertex (e.g. a pure range) return
    /// [`GraphError::Unsupported`].
    fn initial_estimate(
        &self,
        measurement: &Self::Measurement,
        inverse_measurement: &Self::Measurement,
        fixed: &[usize],
        target: usize,
        estimates: &[DVector<f64>],
    ) -> GraphResult<DVector<f64>>;

    /// Number of independent constraint rows contributed; normally D, but a
    /// degenerate kind may report fewer.
    fn rank(&self) -> usize {
        self.dimension()
    }
}

/// A Hessian block descriptor bound for one unordered vertex pair.
#[derive(Debug, Clone, Copy)]
struct BoundBlock {
    block: HessianBlock,
    /// The physical slot is oriented for the mirrored pair (j, i), so the
    /// contribution is written transposed.
    transposed: bool,
}

/// Hyper-edge connecting an ordered, resizable list of vertices.
///
/// Generic over its [`EdgeKind`]; see the module documentation for the
/// lifecycle. The edge owns none of its vertices: it stores graph identifiers
/// and receives resolved vertex slices from the caller.
#[derive(Debug)]
pub struct MultiEdge<K: EdgeKind> {
    kind: K,
    vertex_ids: Vec<Option<VertexId>>,
    measurement: Option<K::Measurement>,
    inverse_measurement: Option<K::Measurement>,
    information: DMatrix<f64>,
    kernel: Option<Box<dyn RobustKernel>>,

    // Derived per-pass state
    error: DVector<f64>,
    jacobians: Vec<DMatrix<f64>>,
    hessian: Vec<Option<BoundBlock>>,
    gradient: Vec<Option<usize>>,
    linearized: bool,
}

impl<K: EdgeKind> MultiEdge<K> {
    /// Create an unattached edge (arity 0). [`MultiEdge::resize`] must be
    /// called before any other use.
    pub fn new(kind: K) -> Self {
        let dim = kind.dimension();
        Self {
            kind,
            vertex_ids: Vec::new(),
            measurement: None,
            inverse_measurement: None,
            information: DMatrix::identity(dim, dim),
            kernel: None,
            error: DVector::zeros(0),
            jacobians: Vec::new(),
            hessian: Vec::new(),
            gradient: Vec::new(),
            linearized: false,
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Set the measurement. The stored inverse is recomputed so the pair can
    /// never disagree.
    pub fn set_measurement(&mut self, measurement: K::Measurement) {
        self.inverse_measurement = Some(measurement.inverse());
        self.measurement = Some(measurement);
        self.linearized = false;
    }

    /// Set the inverse measurement. The primary measurement is recomputed from
    /// it, mirroring [`MultiEdge::set_measurement`].
    pub fn set_inverse_measurement(&mut self, inverse: K::Measurement) {
        self.measurement = Some(inverse.inverse());
        self.inverse_measurement = Some(inverse);
        self.linearized = false;
    }

    pub fn measurement(&self) -> Option<&K::Measurement> {
        self.measurement.as_ref()
    }

    pub fn inverse_measurement(&self) -> Option<&K::Measurement> {
        self.inverse_measurement.as_ref()
    }

    /// Set the D×D information (inverse covariance) matrix.
    ///
    /// The matrix is trusted as given; a singular information matrix is the
    /// linear solver's concern, not the edge's.
    pub fn set_information(&mut self, information: DMatrix<f64>) -> GraphResult<()> {
        let dim = self.kind.dimension();
        if information.nrows() != dim || information.ncols() != dim {
            return Err(GraphError::dimensions(
                "information matrix",
                dim,
                information.nrows().max(information.ncols()),
            ));
        }
        self.information = information;
        Ok(())
    }

    pub fn information(&self) -> &DMatrix<f64> {
        &self.information
    }

    /// Attach a robust kernel; `None` disables down-weighting.
    pub fn set_robust_kernel(&mut self, kernel: Option<Box<dyn RobustKernel>>) {
        self.kernel = kernel;
    }

    fn measurement_pair(&self) -> GraphResult<(&K::Measurement, &K::Measurement)> {
        match (&self.measurement, &self.inverse_measurement) {
            (Some(m), Some(inv)) => Ok((m, inv)),
            _ => Err(GraphError::EdgeState(
                "edge is not configured: measurement has not been set".to_string(),
            )),
        }
    }

    fn require_sized(&self) -> GraphResult<()> {
        if self.vertex_ids.is_empty() {
            return Err(GraphError::EdgeState(
                "edge has not been resized; call resize(n) with n >= 1 first".to_string(),
            ));
        }
        Ok(())
    }

    fn require_linearized(&self) -> GraphResult<()> {
        if !self.linearized {
            return Err(GraphError::EdgeState(
                "edge has not been linearized in this pass".to_string(),
            ));
        }
        Ok(())
    }
}

impl<K: EdgeKind> MultiEdge<K> {
    /// Set the number of connected vertices.
    ///
    /// Reallocates the Jacobian-block list (length `n`) and the packed
    /// upper-triangular Hessian descriptor set (`n·(n+1)/2` pairs). Any
    /// previously bound descriptors and linearization results are invalidated.
    pub fn resize(&mut self, n: usize) -> GraphResult<()> {
        if n == 0 {
            return Err(GraphError::InvalidInput(
                "cannot resize an edge to zero vertices".to_string(),
            ));
        }
        self.vertex_ids.resize(n, None);
        self.vertex_ids.truncate(n);
        self.jacobians = vec![DMatrix::zeros(0, 0); n];
        self.hessian = vec![None; pair_count(n)];
        self.gradient = vec![None; n];
        self.linearized = false;
        Ok(())
    }

    /// Number of connected vertices (0 while unattached).
    pub fn arity(&self) -> usize {
        self.vertex_ids.len()
    }

    /// Residual dimension D of this edge.
    pub fn dimension(&self) -> usize {
        self.kind.dimension()
    }

    /// Connect the vertex with graph id `id` at slot `slot`.
    pub fn set_vertex(&mut self, slot: usize, id: VertexId) -> GraphResult<()> {
        let n = self.vertex_ids.len();
        if slot >= n {
            return Err(GraphError::InvalidInput(format!(
                "vertex slot {slot} out of range for arity {n}"
            )));
        }
        self.vertex_ids[slot] = Some(id);
        Ok(())
    }

    /// Graph id connected at `slot`, if any.
    pub fn vertex(&self, slot: usize) -> Option<VertexId> {
        self.vertex_ids.get(slot).copied().flatten()
    }

    /// Number of independent constraint rows contributed by this edge.
    pub fn rank(&self) -> usize {
        self.kind.rank()
    }

    /// Current residual, valid after [`MultiEdge::linearize`].
    pub fn error(&self) -> &DVector<f64> {
        &self.error
    }

    /// Jacobian block for the vertex at `slot`, valid after linearization.
    pub fn jacobian(&self, slot: usize) -> Option<&DMatrix<f64>> {
        self.jacobians.get(slot).filter(|_| self.linearized)
    }

    /// chi² = errorᵀ·Ω·error for the current linearization snapshot.
    ///
    /// Pure computation with no side effects. After
    /// [`MultiEdge::robustify_error`] the stored error already carries
    /// `sqrt(weight)`, so the returned value is the robustified cost.
    pub fn chi2(&self) -> GraphResult<f64> {
        self.require_linearized()?;
        Ok((&self.information * &self.error).dot(&self.error))
    }

    /// Compute and store the residual and one Jacobian block per vertex at the
    /// current estimates.
    ///
    /// Analytic Jacobians are taken from the kind when it provides them;
    /// otherwise each block is filled by central differencing along the
    /// vertex's tangent directions, routed through its `oplus` operator so the
    /// chain rule through the manifold update is respected.
    pub fn linearize(&mut self, vertices: &[&dyn Vertex]) -> GraphResult<()> {
        self.require_sized()?;
        let n = self.vertex_ids.len();
        if vertices.len() != n {
            return Err(GraphError::dimensions("linearize vertex slice", n, vertices.len()));
        }
        let dim = self.kind.dimension();
        let (measurement, _) = self.measurement_pair()?;

        let mut estimates: Vec<DVector<f64>> = vertices.iter().map(|v| v.estimate()).collect();
        let error = self.kind.error(measurement, &estimates)?;
        if error.len() != dim {
            return Err(GraphError::dimensions("edge residual", dim, error.len()));
        }

        let jacobians = match self.kind.jacobians(measurement, &estimates) {
            Some(analytic) => {
                let blocks = analytic?;
                if blocks.len() != n {
                    return Err(GraphError::dimensions("Jacobian block list", n, blocks.len()));
                }
                for (slot, block) in blocks.iter().enumerate() {
                    if block.nrows() != dim || block.ncols() != vertices[slot].dimension() {
                        return Err(GraphError::dimensions(
                            "Jacobian block",
                            dim * vertices[slot].dimension(),
                            block.nrows() * block.ncols(),
                        ));
                    }
                }
                blocks
            }
            None => {
                let mut blocks = Vec::with_capacity(n);
                for slot in 0..n {
                    let tangent_dim = vertices[slot].dimension();
                    let mut block = DMatrix::zeros(dim, tangent_dim);
                    let nominal = estimates[slot].clone();
                    let mut delta = DVector::zeros(tangent_dim);
                    for k in 0..tangent_dim {
                        delta[k] = NUMERIC_DELTA;
                        estimates[slot] = vertices[slot].oplus(&delta)?;
                        let error_plus = self.kind.error(measurement, &estimates)?;

                        delta[k] = -NUMERIC_DELTA;
                        estimates[slot] = vertices[slot].oplus(&delta)?;
                        let error_minus = self.kind.error(measurement, &estimates)?;

                        delta[k] = 0.0;
                        block.set_column(k, &((error_plus - error_minus) / (2.0 * NUMERIC_DELTA)));
                    }
                    estimates[slot] = nominal;
                    blocks.push(block);
                }
                blocks
            }
        };

        self.error = error;
        self.jacobians = jacobians;
        self.linearized = true;
        Ok(())
    }

    /// Scale the stored error by the square root of the robust weight.
    ///
    /// The residual norm is Mahalanobis-shaped, `r = sqrt(errorᵀ·Ω·error)`, so
    /// the compounded effect on chi² matches the kernel. A zero residual takes
    /// weight 1. Exactly one call per linearization pass: the operation is not
    /// idempotent and a second call double-applies the down-weighting.
    pub fn robustify_error(&mut self) -> GraphResult<()> {
        self.require_linearized()?;
        let Some(kernel) = self.kernel.as_ref() else {
            return Ok(());
        };
        let norm = (&self.information * &self.error).dot(&self.error).sqrt();
        let weight = if norm > 0.0 { kernel.weight(norm) } else { 1.0 };
        self.error *= weight.sqrt();
        Ok(())
    }

    /// Bind the descriptor of the unordered pair `(i, j)`, `i ≤ j`, to a block
    /// of caller-owned memory.
    ///
    /// `transposed` marks a slot physically oriented for the mirrored pair
    /// `(j, i)`. Only the upper triangle of the global Hessian is stored, so
    /// the assembler decides the orientation per pair. Every pair must be bound
    /// before the first [`MultiEdge::construct_quadratic_form`] of an assembly
    /// pass; re-binding between passes is allowed.
    pub fn map_hessian_memory(
        &mut self,
        i: usize,
        j: usize,
        block: HessianBlock,
        transposed: bool,
    ) -> GraphResult<()> {
        self.require_sized()?;
        let n = self.vertex_ids.len();
        if i > j || j >= n {
            return Err(GraphError::InvalidInput(format!(
                "Hessian pair ({i},{j}) out of range for arity {n}; require i <= j < n"
            )));
        }
        self.hessian[pair_index(i, j, n)] = Some(BoundBlock { block, transposed });
        Ok(())
    }

    /// Bind the gradient-accumulation segment for the vertex at `slot` to an
    /// offset inside the caller's gradient vector.
    pub fn bind_gradient(&mut self, slot: usize, offset: usize) -> GraphResult<()> {
        self.require_sized()?;
        let n = self.vertex_ids.len();
        if slot >= n {
            return Err(GraphError::InvalidInput(format!(
                "gradient slot {slot} out of range for arity {n}"
            )));
        }
        self.gradient[slot] = Some(offset);
        Ok(())
    }

    /// Accumulate this edge's contribution to the normal equations.
    ///
    /// For every unordered pair `(i, j)` including self-pairs, adds
    /// `Jᵢᵀ·Ω·Jⱼ` to the bound Hessian block (transposed when the slot is
    /// oriented `(j, i)`), and adds `Jᵢᵀ·Ω·error` to vertex `i`'s bound segment
    /// of `gradient`. The caller solves `H·Δx = −b` afterwards.
    ///
    /// Every binding is validated before the first write, so an unbound slot
    /// or misshapen block fails the call with the shared arena and gradient
    /// untouched. The per-pair inner loop performs no heap allocation; the
    /// `Jᵢᵀ·Ω` buffer is produced once per vertex in the outer loop with sizes
    /// fixed since linearization. Writers into shared arena/gradient storage
    /// must be serialized by the caller when edges share vertices.
    pub fn construct_quadratic_form(
        &self,
        arena: &mut BlockArena,
        gradient: &mut DVector<f64>,
    ) -> GraphResult<()> {
        self.require_linearized()?;
        let n = self.vertex_ids.len();

        // validation pass: no write may happen until every binding is known
        // good, otherwise the caller's shared system is left half-accumulated
        let mut offsets = Vec::with_capacity(n);
        let mut bindings = Vec::with_capacity(pair_count(n));
        for i in 0..n {
            let tangent_i = self.jacobians[i].ncols();
            let offset = self.gradient[i].ok_or_else(|| {
                GraphError::EdgeState(format!("gradient segment for vertex slot {i} is not bound"))
            })?;
            if offset + tangent_i > gradient.len() {
                return Err(GraphError::dimensions(
                    "gradient segment",
                    gradient.len(),
                    offset + tangent_i,
                ));
            }
            offsets.push(offset);

            for j in i..n {
                let bound = self.hessian[pair_index(i, j, n)].ok_or_else(|| {
                    GraphError::EdgeState(format!(
                        "Hessian block ({i},{j}) is not mapped; call map_hessian_memory first"
                    ))
                })?;
                let tangent_j = self.jacobians[j].ncols();
                let (rows, cols) = if bound.transposed {
                    (tangent_j, tangent_i)
                } else {
                    (tangent_i, tangent_j)
                };
                arena.check_block_shape(&bound.block, rows, cols)?;
                bindings.push(bound);
            }
        }

        for i in 0..n {
            let jacobian_i = &self.jacobians[i];
            let tangent_dim = jacobian_i.ncols();
            let jt_omega = jacobian_i.transpose() * &self.information;

            gradient
                .rows_mut(offsets[i], tangent_dim)
                .gemv(1.0, &jt_omega, &self.error, 1.0);

            for j in i..n {
                let bound = bindings[pair_index(i, j, n)];
                arena.accumulate_product(&bound.block, bound.transposed, &jt_omega, &self.jacobians[j])?;
            }
        }
        Ok(())
    }

    /// Seed the vertex at slot `target` by inverting the measurement model,
    /// treating the slots in `fixed` as known.
    ///
    /// The exact fixed set a kind accepts is part of its contract; a mismatched
    /// set is a typed error. The target vertex's estimate is replaced through
    /// its own `set_estimate`.
    pub fn initial_estimate(
        &self,
        fixed: &[usize],
        target: usize,
        vertices: &mut [&mut dyn Vertex],
    ) -> GraphResult<()> {
        self.require_sized()?;
        let n = self.vertex_ids.len();
        if vertices.len() != n {
            return Err(GraphError::dimensions("initial estimate vertex slice", n, vertices.len()));
        }
        if target >= n {
            return Err(GraphError::InvalidInput(format!(
                "initial estimate target slot {target} out of range for arity {n}"
            )));
        }
        if fixed.contains(&target) {
            return Err(GraphError::InvalidInput(format!(
                "initial estimate target slot {target} is also marked fixed"
            )));
        }
        if fixed.iter().any(|&slot| slot >= n) {
            return Err(GraphError::InvalidInput(format!(
                "fixed slot out of range for arity {n}"
            )));
        }
        let (measurement, inverse) = self.measurement_pair()?;
        let estimates: Vec<DVector<f64>> = vertices.iter().map(|v| v.estimate()).collect();
        let seeded = self
            .kind
            .initial_estimate(measurement, inverse, fixed, target, &estimates)?;
        vertices[target].set_estimate(seeded)
    }
}

/// Object-safe edge interface.
///
/// The optimizer and the graph hold `Box<dyn Edge>` so that edge kinds supplied
/// by dynamically loaded modules participate alongside the built-in generics.
/// Measurement assignment stays on the concrete type, which is kind-typed.
pub trait Edge: fmt::Debug + Send {
    fn dimension(&self) -> usize;
    fn arity(&self) -> usize;
    fn rank(&self) -> usize;
    fn resize(&mut self, n: usize) -> GraphResult<()>;
    fn set_vertex(&mut self, slot: usize, id: VertexId) -> GraphResult<()>;
    fn vertex(&self, slot: usize) -> Option<VertexId>;
    fn linearize(&mut self, vertices: &[&dyn Vertex]) -> GraphResult<()>;
    fn error(&self) -> &DVector<f64>;
    fn chi2(&self) -> GraphResult<f64>;
    fn robustify_error(&mut self) -> GraphResult<()>;
    fn map_hessian_memory(
        &mut self,
        i: usize,
        j: usize,
        block: HessianBlock,
        transposed: bool,
    ) -> GraphResult<()>;
    fn bind_gradient(&mut self, slot: usize, offset: usize) -> GraphResult<()>;
    fn construct_quadratic_form(
        &self,
        arena: &mut BlockArena,
        gradient: &mut DVector<f64>,
    ) -> GraphResult<()>;
    fn initial_estimate(
        &self,
        fixed: &[usize],
        target: usize,
        vertices: &mut [&mut dyn Vertex],
    ) -> GraphResult<()>;
}

impl<K: EdgeKind> Edge for MultiEdge<K> {
    fn dimension(&self) -> usize {
        MultiEdge::dimension(self)
    }

    fn arity(&self) -> usize {
        MultiEdge::arity(self)
    }

    fn rank(&self) -> usize {
        MultiEdge::rank(self)
    }

    fn resize(&mut self, n: usize) -> GraphResult<()> {
        MultiEdge::resize(self, n)
    }

    fn set_vertex(&mut self, slot: usize, id: VertexId) -> GraphResult<()> {
        MultiEdge::set_vertex(self, slot, id)
    }

    fn vertex(&self, slot: usize) -> Option<VertexId> {
        MultiEdge::vertex(self, slot)
    }

    fn linearize(&mut self, vertices: &[&dyn Vertex]) -> GraphResult<()> {
        MultiEdge::linearize(self, vertices)
    }

    fn error(&self) -> &DVector<f64> {
        MultiEdge::error(self)
    }

    fn chi2(&self) -> GraphResult<f64> {
        MultiEdge::chi2(self)
    }

    fn robustify_error(&mut self) -> GraphResult<()> {
        MultiEdge::robustify_error(self)
    }

    fn map_hessian_memory(
        &mut self,
        i: usize,
        j: usize,
        block: HessianBlock,
        transposed: bool,
    ) -> GraphResult<()> {
        MultiEdge::map_hessian_memory(self, i, j, block, transposed)
    }

    fn bind_gradient(&mut self, slot: usize, offset: usize) -> GraphResult<()> {
        MultiEdge::bind_gradient(self, slot, offset)
    }

    fn construct_quadratic_form(
        &self,
        arena: &mut BlockArena,
        gradient: &mut DVector<f64>,
    ) -> GraphResult<()> {
        MultiEdge::construct_quadratic_form(self, arena, gradient)
    }

    fn initial_estimate(
        &self,
        fixed: &[usize],
        target: usize,
        vertices: &mut [&mut dyn Vertex],
    ) -> GraphResult<()> {
        MultiEdge::initial_estimate(self, fixed, target, vertices)
    }
}
