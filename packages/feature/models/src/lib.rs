#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature, schema, CRS and attribute table types.
//!
//! These types describe the data flowing through the subset-join
//! workflow: labelled geometric features grouped into collections with a
//! uniform attribute schema and a shared coordinate reference system,
//! plus non-spatial attribute tables used for enrichment.
//!
//! Every feature carries an explicit [`FeatureId`]. Nothing in the
//! workflow relies on a feature's position in its collection for
//! identity.

mod attribute;
mod collection;
mod crs;

pub use attribute::{AttributeValue, Column, ColumnType, Schema};
pub use collection::{AttributeTable, Feature, FeatureCollection, FeatureId};
pub use crs::Crs;

use thiserror::Error;

/// Violations of the uniform-schema invariant detected while building a
/// [`FeatureCollection`] or [`AttributeTable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// The same column name appears twice in a schema.
    #[error("Duplicate column '{name}' in schema")]
    DuplicateColumn {
        /// The repeated column name.
        name: String,
    },

    /// A row has a different number of values than the schema has columns.
    #[error("Row '{row}' has {found} values, schema expects {expected}")]
    RowWidth {
        /// Feature identifier or table row label.
        row: String,
        /// Number of columns in the schema.
        expected: usize,
        /// Number of values in the row.
        found: usize,
    },

    /// A value does not conform to its column's declared type.
    #[error("Row '{row}' column '{column}' holds a {found} value, schema declares {expected}")]
    TypeMismatch {
        /// Feature identifier or table row label.
        row: String,
        /// Column name.
        column: String,
        /// Declared column type.
        expected: ColumnType,
        /// Type of the offending value.
        found: ColumnType,
    },
}
