//! # Hypergraph Solver
//!
//! The constraint (hyper-edge) core of a graph-based nonlinear least squares
//! optimization engine for estimation problems such as pose estimation, 3-D
//! reconstruction, and sensor fusion.
//!
//! A problem is modeled as a hypergraph: state variables (vertices) connected by
//! measurement constraints (edges) of arbitrary arity, each contributing a
//! residual weighted by an information (inverse-covariance) matrix. An outer
//! optimizer repeatedly linearizes all edges, assembles a sparse block
//! normal-equation system, solves it, and applies the update.
//!
//! ## Features
//!
//! - **Variable-arity hyper-edges**: a single [`core::MultiEdge`] type handles any
//!   number of connected vertices through the [`core::EdgeKind`] capability contract
//! - **Robust down-weighting**: pluggable width-parameterized kernels for outlier
//!   rejection
//! - **Allocation-free assembly**: per-pair Hessian contributions accumulate into
//!   caller-owned [`core::BlockArena`] memory through bound block descriptors
//! - **Runtime extensibility**: [`loader::ModuleRegistry`] discovers and opens
//!   plugin modules supplying additional vertex/edge kinds

pub mod core;
pub mod edges;
pub mod error;
pub mod loader;
pub mod logger;

pub use crate::core::{
    BlockArena, Edge, EdgeKind, GemanMcClureKernel, HessianBlock, HuberKernel, Measurement,
    MultiEdge, RobustKernel, TrivialKernel, Vertex, VertexId,
};
pub use error::{GraphError, GraphResult};
pub use loader::ModuleRegistry;
pub use logger::init_logger;
