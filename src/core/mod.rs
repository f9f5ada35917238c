//! Core hyper-edge abstraction and assembly protocol
//!
//! This module contains the pieces that run for every edge on every optimizer
//! iteration:
//!
//! - `vertex`: the vertex contract consumed by edges, plus simple implementations
//! - `edge`: the variable-arity [`MultiEdge`] and the [`EdgeKind`] capability contract
//! - `hessian`: block descriptors and the caller-owned [`BlockArena`]
//! - `robust`: width-parameterized robust kernels for outlier down-weighting

pub mod edge;
pub mod hessian;
pub mod robust;
pub mod vertex;

pub use edge::{Edge, EdgeKind, Measurement, MultiEdge};
pub use hessian::{BlockArena, HessianBlock};
pub use robust::{GemanMcClureKernel, HuberKernel, RobustKernel, TrivialKernel};
pub use vertex::{AngleVertex, VectorVertex, Vertex, VertexId};
