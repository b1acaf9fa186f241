//! Features, feature collections and attribute tables.

use std::collections::BTreeSet;

use geo::{Geometry, MultiLineString, MultiPoint, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::{AttributeValue, CollectionError, Crs, Schema};

/// Stable identifier of a feature, carried through every transformation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier for the `index`-th part of a decomposed multi-part
    /// feature (e.g. `"GBR"` -> `"GBR#0"`).
    #[must_use]
    pub fn part(&self, index: usize) -> Self {
        Self(format!("{}#{index}", self.0))
    }
}

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One spatial entity: identifier, attribute values aligned with the
/// owning schema, and a geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    /// One value per schema column, in schema order.
    pub attributes: Vec<AttributeValue>,
    pub geometry: Geometry<f64>,
}

impl Feature {
    #[must_use]
    pub fn new(
        id: impl Into<FeatureId>,
        attributes: Vec<AttributeValue>,
        geometry: impl Into<Geometry<f64>>,
    ) -> Self {
        Self {
            id: id.into(),
            attributes,
            geometry: geometry.into(),
        }
    }
}

/// An ordered sequence of features sharing one schema and one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    schema: Schema,
    crs: Crs,
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// Builds a collection, validating every feature against `schema`.
    ///
    /// Identifiers are not required to be unique; see
    /// [`Self::has_unique_ids`].
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError`] if any feature's attributes do not match
    /// the schema's width or column types.
    pub fn new(schema: Schema, crs: Crs, features: Vec<Feature>) -> Result<Self, CollectionError> {
        for feature in &features {
            schema.validate_row(feature.id.as_str(), &feature.attributes)?;
        }
        Ok(Self {
            schema,
            crs,
            features,
        })
    }

    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub const fn crs(&self) -> &Crs {
        &self.crs
    }

    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &FeatureId> {
        self.features.iter().map(|f| &f.id)
    }

    /// First feature with the given identifier.
    #[must_use]
    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id.as_str() == id)
    }

    /// Value of `column` for `feature`, which must belong to this
    /// collection.
    #[must_use]
    pub fn value<'a>(&self, feature: &'a Feature, column: &str) -> Option<&'a AttributeValue> {
        self.schema
            .position(column)
            .and_then(|i| feature.attributes.get(i))
    }

    #[must_use]
    pub fn has_unique_ids(&self) -> bool {
        let mut seen = BTreeSet::new();
        self.features.iter().all(|f| seen.insert(&f.id))
    }

    /// Whether every row holds exactly one single-part geometry.
    #[must_use]
    pub fn is_single_part(&self) -> bool {
        self.features.iter().all(|f| {
            matches!(
                f.geometry,
                Geometry::Point(_)
                    | Geometry::Line(_)
                    | Geometry::LineString(_)
                    | Geometry::Polygon(_)
                    | Geometry::Rect(_)
                    | Geometry::Triangle(_)
            )
        })
    }

    /// Casts single-part points, lines and polygons into their multi-part
    /// counterparts so that every row has the same geometry cardinality.
    #[must_use]
    pub fn promote_to_multi(self) -> Self {
        let features = self
            .features
            .into_iter()
            .map(|feature| Feature {
                geometry: promote_geometry(feature.geometry),
                ..feature
            })
            .collect();

        Self { features, ..self }
    }

    /// Replaces every geometry through `f` and tags the result with `crs`.
    /// Identifiers and attributes are left untouched.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `f`.
    pub fn try_map_geometries<E>(
        self,
        crs: Crs,
        mut f: impl FnMut(Geometry<f64>) -> Result<Geometry<f64>, E>,
    ) -> Result<Self, E> {
        let features = self
            .features
            .into_iter()
            .map(|feature| {
                Ok(Feature {
                    geometry: f(feature.geometry)?,
                    ..feature
                })
            })
            .collect::<Result<Vec<_>, E>>()?;

        Ok(Self {
            schema: self.schema,
            crs,
            features,
        })
    }

    #[must_use]
    pub fn into_parts(self) -> (Schema, Crs, Vec<Feature>) {
        (self.schema, self.crs, self.features)
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}

fn promote_geometry(geometry: Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::Point(p) => MultiPoint::new(vec![p]).into(),
        Geometry::Line(l) => MultiLineString::new(vec![l.into()]).into(),
        Geometry::LineString(ls) => MultiLineString::new(vec![ls]).into(),
        Geometry::Polygon(p) => MultiPolygon::new(vec![p]).into(),
        Geometry::Rect(r) => MultiPolygon::new(vec![r.to_polygon()]).into(),
        Geometry::Triangle(t) => MultiPolygon::new(vec![t.to_polygon()]).into(),
        other => other,
    }
}

/// A non-spatial table of attribute rows, e.g. indicators keyed by
/// country code.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeTable {
    schema: Schema,
    rows: Vec<Vec<AttributeValue>>,
}

impl AttributeTable {
    /// Builds a table, validating every row against `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError`] if a row does not match the schema.
    pub fn new(schema: Schema, rows: Vec<Vec<AttributeValue>>) -> Result<Self, CollectionError> {
        for (i, row) in rows.iter().enumerate() {
            schema.validate_row(&format!("row {}", i + 1), row)?;
        }
        Ok(Self { schema, rows })
    }

    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<AttributeValue>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use geo::{Point, polygon};

    use super::*;
    use crate::{Column, ColumnType};

    fn name_schema() -> Schema {
        Schema::new(vec![Column::new("name", ColumnType::Text)]).unwrap()
    }

    #[test]
    fn part_ids_append_index() {
        assert_eq!(FeatureId::from("GBR").part(0).as_str(), "GBR#0");
        assert_eq!(FeatureId::from("GBR").part(12).to_string(), "GBR#12");
    }

    #[test]
    fn new_rejects_rows_that_break_the_schema() {
        let err = FeatureCollection::new(
            name_schema(),
            Crs::WGS84,
            vec![Feature::new("a", vec![1_i64.into()], Point::new(0.0, 0.0))],
        )
        .unwrap_err();

        assert!(matches!(err, CollectionError::TypeMismatch { ref row, .. } if row == "a"));
    }

    #[test]
    fn duplicate_ids_are_allowed_but_reported() {
        let feature = Feature::new("a", vec!["x".into()], Point::new(0.0, 0.0));
        let collection =
            FeatureCollection::new(name_schema(), Crs::WGS84, vec![feature.clone(), feature])
                .unwrap();

        assert_eq!(collection.len(), 2);
        assert!(!collection.has_unique_ids());
    }

    #[test]
    fn promote_to_multi_makes_rows_uniform() {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0)
        ];
        let collection = FeatureCollection::new(
            name_schema(),
            Crs::WGS84,
            vec![
                Feature::new("p", vec!["x".into()], Point::new(0.0, 0.0)),
                Feature::new("q", vec![AttributeValue::Null], square),
            ],
        )
        .unwrap();
        assert!(collection.is_single_part());

        let promoted = collection.promote_to_multi();

        assert!(!promoted.is_single_part());
        assert!(matches!(promoted.features()[0].geometry, Geometry::MultiPoint(_)));
        assert!(matches!(
            promoted.features()[1].geometry,
            Geometry::MultiPolygon(ref mp) if mp.0.len() == 1
        ));
        assert_eq!(promoted.features()[1].id.as_str(), "q");
    }

    #[test]
    fn value_looks_up_by_column_name() {
        let collection = FeatureCollection::new(
            name_schema(),
            Crs::WGS84,
            vec![Feature::new("a", vec!["Alpha".into()], Point::new(0.0, 0.0))],
        )
        .unwrap();
        let feature = collection.feature("a").unwrap();

        assert_eq!(
            collection.value(feature, "name"),
            Some(&AttributeValue::Text("Alpha".to_string()))
        );
        assert_eq!(collection.value(feature, "missing"), None);
    }

    #[test]
    fn table_rows_are_validated() {
        let err = AttributeTable::new(name_schema(), vec![vec![], vec!["x".into()]]).unwrap_err();
        assert!(matches!(err, CollectionError::RowWidth { ref row, .. } if row == "row 1"));
    }
}
