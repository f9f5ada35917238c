//! Block descriptors and arena storage for sparse Hessian assembly.
//!
//! The assembler (linear solver side) owns the physical memory of the block
//! Hessian; edges only receive descriptors telling them where each per-pair
//! contribution accumulates. Only the upper triangle of the global symmetric
//! Hessian is physically stored, so a descriptor bound for pair (i, j) may be
//! oriented as the (j, i) slot and marked transposed.
//!
//! [`BlockArena`] is the canonical arena implementation: a flat `f64` buffer
//! from which fixed-size blocks are allocated once per assembly structure.
//! Accumulation is an indexed triple loop writing straight into the buffer, so
//! the per-pair inner loop of quadratic-form construction performs no heap
//! allocation.

use crate::error::{GraphError, GraphResult};
use nalgebra::DMatrix;

/// Descriptor of one block of caller-owned Hessian memory.
///
/// Identifies a `rows × cols` region starting at `offset` inside the arena that
/// issued it, together with the element layout of that region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HessianBlock {
    offset: usize,
    rows: usize,
    cols: usize,
    row_major: bool,
}

impl HessianBlock {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Linear index of element (r, c) relative to the block's offset.
    #[inline]
    fn index(&self, r: usize, c: usize) -> usize {
        if self.row_major {
            r * self.cols + c
        } else {
            r + c * self.rows
        }
    }
}

/// Flat storage arena standing in for the solver's block Hessian memory.
///
/// Blocks are allocated once when the assembly structure is fixed (after all
/// edges have been resized) and zeroed with [`BlockArena::reset`] between
/// optimizer iterations. Blocks never overlap by construction.
#[derive(Debug, Default)]
pub struct BlockArena {
    data: Vec<f64>,
}

impl BlockArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed `rows × cols` block and return its descriptor.
    pub fn alloc(&mut self, rows: usize, cols: usize, row_major: bool) -> GraphResult<HessianBlock> {
        if rows == 0 || cols == 0 {
            return Err(GraphError::InvalidInput(format!(
                "cannot allocate {rows}x{cols} Hessian block"
            )));
        }
        let offset = self.data.len();
        self.data.resize(offset + rows * cols, 0.0);
        Ok(HessianBlock {
            offset,
            rows,
            cols,
            row_major,
        })
    }

    /// Total number of stored coefficients.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Zero all storage. Called once per assembly pass, before the edges
    /// re-accumulate their contributions.
    pub fn reset(&mut self) {
        self.data.fill(0.0);
    }

    fn check_block(&self, block: &HessianBlock) -> GraphResult<()> {
        let end = block.offset + block.rows * block.cols;
        if end > self.data.len() {
            return Err(GraphError::InvalidInput(format!(
                "Hessian block [{}..{end}) exceeds arena size {}",
                block.offset,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Validate that a block belongs to this arena and has the given shape,
    /// without touching storage.
    pub(crate) fn check_block_shape(
        &self,
        block: &HessianBlock,
        rows: usize,
        cols: usize,
    ) -> GraphResult<()> {
        self.check_block(block)?;
        if block.rows != rows || block.cols != cols {
            return Err(GraphError::dimensions(
                "Hessian block shape",
                rows * cols,
                block.rows * block.cols,
            ));
        }
        Ok(())
    }

    /// Copy a block out as a dense matrix (for inspection or a dense solve).
    pub fn matrix(&self, block: &HessianBlock) -> GraphResult<DMatrix<f64>> {
        self.check_block(block)?;
        let mut out = DMatrix::zeros(block.rows, block.cols);
        for r in 0..block.rows {
            for c in 0..block.cols {
                out[(r, c)] = self.data[block.offset + block.index(r, c)];
            }
        }
        Ok(out)
    }

    /// Accumulate `left * right` (or its transpose) into a block.
    ///
    /// With `transposed == false` the block must be shaped like the product
    /// `left * right`; with `transposed == true` the block holds the transposed
    /// product, which is how a pair contribution lands in a slot oriented for
    /// the mirrored pair. Writes only within the block's region.
    pub fn accumulate_product(
        &mut self,
        block: &HessianBlock,
        transposed: bool,
        left: &DMatrix<f64>,
        right: &DMatrix<f64>,
    ) -> GraphResult<()> {
        self.check_block(block)?;
        if left.ncols() != right.nrows() {
            return Err(GraphError::dimensions(
                "Hessian block product inner dimension",
                left.ncols(),
                right.nrows(),
            ));
        }
        let (prod_rows, prod_cols) = (left.nrows(), right.ncols());
        let (want_rows, want_cols) = if transposed {
            (prod_cols, prod_rows)
        } else {
            (prod_rows, prod_cols)
        };
        if block.rows != want_rows || block.cols != want_cols {
            return Err(GraphError::dimensions(
                "Hessian block shape",
                want_rows * want_cols,
                block.rows * block.cols,
            ));
        }

        let inner = left.ncols();
        for r in 0..prod_rows {
            for c in 0..prod_cols {
                let mut acc = 0.0;
                for k in 0..inner {
                    acc += left[(r, k)] * right[(k, c)];
                }
                let idx = if transposed {
                    block.index(c, r)
                } else {
                    block.index(r, c)
                };
                self.data[block.offset + idx] += acc;
            }
        }
        Ok(())
    }
}

/// Index of the unordered pair (i, j), i ≤ j, inside the packed upper-triangular
/// descriptor list of an edge with `n` vertices.
pub(crate) fn pair_index(i: usize, j: usize, n: usize) -> usize {
    debug_assert!(i <= j && j < n);
    i * n - i * (i + 1) / 2 + j
}

/// Number of unordered vertex pairs (self-pairs included) for arity `n`.
pub(crate) fn pair_count(n: usize) -> usize {
    n * (n + 1) / 2
}
