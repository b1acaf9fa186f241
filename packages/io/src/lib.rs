#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geospatial and tabular I/O.
//!
//! Feature collections are read from and written to file-backed vector
//! formats through a [`FormatRegistry`] of [`VectorDriver`]s. Attribute
//! tables used for joins are read from delimited text with per-column
//! type inference.

pub mod geojson_file;
pub mod registry;
pub mod table;

use geocomp_feature_models::CollectionError;
use thiserror::Error;

pub use registry::{FormatRegistry, VectorDriver, VectorFormat};
pub use table::{TableOptions, read_attribute_table};

/// Errors that can occur while reading or writing data.
#[derive(Debug, Error)]
pub enum IoError {
    /// No driver handles the requested format or file extension.
    #[error("Unsupported format '{format}'")]
    UnsupportedFormat {
        /// Format name or file extension that was requested.
        format: String,
    },

    /// The input could not be interpreted as the expected format.
    #[error("Malformed file {path}: {message}")]
    MalformedFile {
        /// Path or label of the input.
        path: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reader failed outside of record parsing.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Parsed data violates the collection invariants.
    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),
}

impl IoError {
    pub(crate) fn malformed(path: &str, message: impl std::fmt::Display) -> Self {
        Self::MalformedFile {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

/// Options controlling how feature collections are read.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Property holding each feature's identifier, used when a feature has
    /// no `id` member. The property is not duplicated as an attribute.
    pub id_field: Option<String>,
}

impl ReadOptions {
    #[must_use]
    pub fn with_id_field(id_field: impl Into<String>) -> Self {
        Self {
            id_field: Some(id_field.into()),
        }
    }
}
