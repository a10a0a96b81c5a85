//! Error types for model construction and evaluation.

use std::{io, path::PathBuf, result};

use crate::payload::ShapeMismatch;

/// Result type for variation model operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors that can occur while building or querying a variation model.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No location sits at the default of every axis.
    #[error("locations must contain default (missing base source)")]
    MissingBaseSource,

    /// Two locations are identical once zero coordinates are dropped.
    #[error("locations must be unique")]
    LocationsNotUnique,

    /// The number of values does not match the number of model locations.
    #[error("expected {expected} values, got {actual}")]
    SourceCountMismatch { expected: usize, actual: usize },

    /// Payloads of different shape were combined.
    #[error("{0}")]
    Shape(#[from] ShapeMismatch),

    /// A location or mapping refers to an axis that was not declared.
    #[error("unknown axis: {0}")]
    UnknownAxis(String),

    /// A discrete model was built without any source locations.
    #[error("no source locations")]
    NoSources,

    /// Deltas were computed by a different discrete model.
    #[error("deltas do not belong to this model (missing bucket {0})")]
    ForeignDeltas(String),

    /// Failed to read a design-space document.
    #[error("failed to read '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    /// Failed to parse a design-space document.
    #[error("invalid design-space document: {0}")]
    Json(#[from] serde_json::Error),
}
