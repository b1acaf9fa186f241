#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial subset-join workflow.
//!
//! Filters a feature collection by a spatial predicate against a query
//! region, enriches the result with an external attribute table, and
//! concatenates collections. Every operation consumes its input
//! collection and returns a new one. Feature identifiers are carried
//! through unchanged (or derived, for decomposed multi-part features) so
//! that downstream joins never depend on row position.
//!
//! Conflicts are reported at the point of cause: a join that would
//! duplicate a column fails instead of renaming or overwriting it, and
//! subsetting never reprojects implicitly.

pub mod concat;
pub mod join;
pub mod region;
pub mod subset;

use geocomp_crs::ProjectionError;
use geocomp_feature_models::{CollectionError, ColumnType};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

pub use concat::concatenate;
pub use geocomp_spatial::SpatialPredicate;
pub use join::{attribute_join, attribute_join_on_id};
pub use region::{QueryRegion, build_query_region};
pub use subset::{MultiPartMode, spatial_subset};

/// Which side of a join an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum JoinSide {
    /// The feature collection (left side).
    Collection,
    /// The attribute table (right side).
    Table,
}

/// Errors raised by workflow operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    /// CRS missing, unresolvable or inconsistent between inputs.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// A produced collection violated the schema invariants.
    #[error("Collection error: {0}")]
    Collection(#[from] CollectionError),

    /// Buffer distance is negative or not finite.
    #[error("Invalid buffer distance {distance}: must be finite and non-negative")]
    InvalidDistance {
        /// The rejected distance.
        distance: f64,
    },

    /// The join key column does not exist on one side.
    #[error("Join key '{key}' is missing from the {side}")]
    MissingJoinKey {
        /// Join key name.
        key: String,
        /// Side lacking the column.
        side: JoinSide,
    },

    /// The join key columns have different types.
    #[error("Join key '{key}' is {collection} in the collection but {table} in the table")]
    JoinKeyTypeMismatch {
        /// Join key name.
        key: String,
        /// Key type in the collection.
        collection: ColumnType,
        /// Key type in the table.
        table: ColumnType,
    },

    /// The join key column has a type that cannot be matched exactly.
    #[error("Join key '{key}' has unsupported type {column_type}")]
    UnsupportedJoinKeyType {
        /// Join key name.
        key: String,
        /// The key column's type.
        column_type: ColumnType,
    },

    /// Non-key table columns already exist in the collection.
    #[error("Join would duplicate existing columns: {}", .columns.join(", "))]
    SchemaConflict {
        /// Every colliding column name, in table order.
        columns: Vec<String>,
    },

    /// The table holds the same key value more than once.
    #[error("Join key value {value} appears more than once in the table")]
    DuplicateJoinKey {
        /// The repeated key value.
        value: String,
    },

    /// Decomposing a multi-part feature derived an identifier that another
    /// feature already carries.
    #[error("Derived part identifier '{id}' collides with an existing feature")]
    DerivedIdCollision {
        /// The colliding identifier.
        id: String,
    },

    /// No collections were given to concatenate.
    #[error("Nothing to concatenate")]
    EmptyConcatenation,

    /// A collection's schema differs from the first collection's.
    #[error(
        "Schema of input {index} [{}] does not match [{}]",
        .found.join(", "),
        .expected.join(", ")
    )]
    SchemaMismatch {
        /// Position of the mismatching input.
        index: usize,
        /// Columns of the first input, as `name:type`.
        expected: Vec<String>,
        /// Columns of the mismatching input, as `name:type`.
        found: Vec<String>,
    },
}

#[cfg(test)]
pub(crate) mod test_support {
    use geo::{Geometry, MultiPolygon, Polygon, polygon};
    use geocomp_feature_models::{
        AttributeValue, Column, ColumnType, Crs, Feature, FeatureCollection, Schema,
    };

    pub fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size)
        ]
    }

    pub fn schema(columns: &[(&str, ColumnType)]) -> Schema {
        Schema::new(
            columns
                .iter()
                .map(|(name, ty)| Column::new(*name, *ty))
                .collect(),
        )
        .unwrap()
    }

    /// Countries with a code and a name, in an arbitrary planar CRS.
    ///
    /// `GBR` has two parts: one near the origin and one far away.
    pub fn countries() -> FeatureCollection {
        let gbr: Geometry<f64> =
            MultiPolygon::new(vec![square(0.0, 0.0, 2.0), square(50.0, 50.0, 2.0)]).into();

        FeatureCollection::new(
            schema(&[("iso_a2", ColumnType::Text), ("name", ColumnType::Text)]),
            Crs::Epsg(3857),
            vec![
                Feature::new(
                    "FRA",
                    vec!["FR".into(), "France".into()],
                    square(3.0, 0.0, 2.0),
                ),
                Feature::new("GBR", vec!["GB".into(), "United Kingdom".into()], gbr),
                Feature::new(
                    "NZL",
                    vec!["NZ".into(), AttributeValue::Null],
                    square(-40.0, -40.0, 2.0),
                ),
                Feature::new(
                    "DEU",
                    vec!["DE".into(), "Germany".into()],
                    square(6.0, 1.0, 2.0),
                ),
            ],
        )
        .unwrap()
    }
}
