//! Error types for the hypergraph-solver library
//!
//! This module provides the main error and result types used throughout the library.
//! All errors use the `thiserror` crate for automatic trait implementations.

use std::io;
use thiserror::Error;

/// Main result type used throughout the hypergraph-solver library
pub type GraphResult<T> = Result<T, GraphError>;

/// Main error type for the hypergraph-solver library
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// Invalid input parameters (programmer errors such as resizing an edge to zero)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation issued in the wrong edge lifecycle state
    /// (e.g. linearizing before measurement and information are set)
    #[error("Edge state error: {0}")]
    EdgeState(String),

    /// Dimension mismatch between interacting objects
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// Operation that a concrete edge kind does not support
    /// (e.g. initial estimation for an underdetermined measurement model)
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// General computation errors
    #[error("Computation error: {0}")]
    Computation(String),

    /// Dynamic module loading errors
    #[error("Module load error: {0}")]
    ModuleLoad(String),

    /// IO related errors (directory enumeration, file access)
    #[error("IO error: {0}")]
    Io(String),
}

impl GraphError {
    /// Shorthand for a [`GraphError::DimensionMismatch`] with a described context.
    pub fn dimensions(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        GraphError::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

// Conversions from standard library errors

impl From<io::Error> for GraphError {
    fn from(err: io::Error) -> Self {
        GraphError::Io(err.to_string())
    }
}
