//! Concrete edge kinds for the hyper-edge abstraction
//!
//! Each kind supplies the per-kind measurement model mathematics behind the
//! [`crate::core::EdgeKind`] capability contract:
//!
//! - `sum`: K-ary linear sum constraint over scalar vertices (D = 1)
//! - `relative`: binary vector-difference constraint (D = state dimension)
//! - `range`: binary Euclidean-distance constraint between planar points (D = 1)
//!
//! Additional kinds can live outside the crate: anything implementing
//! [`crate::core::EdgeKind`] (or, for dynamically loaded modules, the
//! object-safe [`crate::core::Edge`]) participates in assembly the same way.

pub mod range;
pub mod relative;
pub mod sum;

pub use range::{Distance, RangeKind};
pub use relative::RelativeKind;
pub use sum::SumKind;
