#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spatial predicates and candidate prefiltering.
//!
//! Provides the topological predicates used to subset feature
//! collections, decomposition of multi-part geometries into their parts,
//! and an R-tree over geometry envelopes so that exact predicate tests
//! only run against geometries whose bounding boxes overlap the query.

use std::collections::BTreeSet;

use geo::{BoundingRect, Geometry, Intersects, Relate};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A boolean spatial relationship between a feature geometry and a
/// query region.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SpatialPredicate {
    /// The geometries share at least one point.
    #[default]
    Intersects,
    /// The feature lies inside the region.
    Within,
    /// The feature contains the region.
    Contains,
    /// The geometries share boundary points but no interior points.
    Touches,
    /// The geometries share no point.
    Disjoint,
}

impl SpatialPredicate {
    /// Tests `feature` against `region`.
    #[must_use]
    pub fn evaluate(self, feature: &Geometry<f64>, region: &Geometry<f64>) -> bool {
        match self {
            Self::Intersects => feature.intersects(region),
            Self::Disjoint => !feature.intersects(region),
            Self::Within => feature.relate(region).is_within(),
            Self::Contains => feature.relate(region).is_contains(),
            Self::Touches => feature.relate(region).is_touches(),
        }
    }

    /// Whether the predicate can only hold when the two bounding boxes
    /// overlap, which makes an envelope prefilter exact.
    #[must_use]
    pub const fn requires_envelope_overlap(self) -> bool {
        !matches!(self, Self::Disjoint)
    }
}

/// Whether `geometry` is made of several parts (multi-geometries and
/// collections).
#[must_use]
pub const fn is_multi_part(geometry: &Geometry<f64>) -> bool {
    matches!(
        geometry,
        Geometry::MultiPoint(_)
            | Geometry::MultiLineString(_)
            | Geometry::MultiPolygon(_)
            | Geometry::GeometryCollection(_)
    )
}

/// Decomposes a geometry into single-part geometries, in order.
///
/// Geometry collections are flattened recursively. A single-part
/// geometry yields itself.
#[must_use]
pub fn split_parts(geometry: Geometry<f64>) -> Vec<Geometry<f64>> {
    match geometry {
        Geometry::MultiPoint(mp) => mp.0.into_iter().map(Geometry::Point).collect(),
        Geometry::MultiLineString(mls) => mls.0.into_iter().map(Geometry::LineString).collect(),
        Geometry::MultiPolygon(mp) => mp.0.into_iter().map(Geometry::Polygon).collect(),
        Geometry::GeometryCollection(gc) => gc.0.into_iter().flat_map(split_parts).collect(),
        single => vec![single],
    }
}

/// Whether a multi-part geometry holds at least one part. Single-part
/// geometries always count as one part.
#[must_use]
pub fn has_parts(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::MultiPoint(mp) => !mp.0.is_empty(),
        Geometry::MultiLineString(mls) => !mls.0.is_empty(),
        Geometry::MultiPolygon(mp) => !mp.0.is_empty(),
        Geometry::GeometryCollection(gc) => gc.0.iter().any(has_parts),
        _ => true,
    }
}

/// Whether any part of `feature` satisfies `predicate` against `region`.
///
/// A multi-part geometry with no parts is evaluated as a whole, so it is
/// disjoint from every region.
#[must_use]
pub fn any_part_matches(
    predicate: SpatialPredicate,
    feature: &Geometry<f64>,
    region: &Geometry<f64>,
) -> bool {
    if is_multi_part(feature) && has_parts(feature) {
        split_parts(feature.clone())
            .iter()
            .any(|part| predicate.evaluate(part, region))
    } else {
        predicate.evaluate(feature, region)
    }
}

/// A geometry envelope stored in the R-tree with its position in the
/// caller's sequence.
struct EnvelopeEntry {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for EnvelopeEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over the bounding boxes of a sequence of geometries.
///
/// Empty geometries have no envelope and are never returned as
/// candidates.
pub struct EnvelopeIndex {
    tree: RTree<EnvelopeEntry>,
}

impl EnvelopeIndex {
    /// Bulk-loads the envelopes of `geometries`, remembering each one's
    /// position.
    pub fn build<'a>(geometries: impl IntoIterator<Item = &'a Geometry<f64>>) -> Self {
        let entries: Vec<EnvelopeEntry> = geometries
            .into_iter()
            .enumerate()
            .filter_map(|(position, geometry)| {
                compute_envelope(geometry).map(|envelope| EnvelopeEntry { position, envelope })
            })
            .collect();

        log::trace!("Built envelope index over {} geometries", entries.len());

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed (non-empty) geometries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.tree.size()
    }

    /// Positions of every indexed geometry whose envelope intersects the
    /// envelope of `query`, in ascending order.
    #[must_use]
    pub fn intersecting(&self, query: &Geometry<f64>) -> BTreeSet<usize> {
        let Some(query_env) = compute_envelope(query) else {
            return BTreeSet::new();
        };

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .map(|entry| entry.position)
            .collect()
    }
}

/// Compute the bounding box envelope for a geometry, or `None` when it is
/// empty.
fn compute_envelope(geometry: &Geometry<f64>) -> Option<AABB<[f64; 2]>> {
    geometry
        .bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiPolygon, Point, Polygon, polygon};

    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size)
        ]
    }

    #[test]
    fn predicates_against_a_square_region() {
        let region: Geometry<f64> = square(0.0, 0.0, 10.0).into();
        let inside: Geometry<f64> = square(2.0, 2.0, 2.0).into();
        let edge: Geometry<f64> = square(10.0, 0.0, 2.0).into();
        let outside: Geometry<f64> = square(20.0, 20.0, 2.0).into();

        assert!(SpatialPredicate::Intersects.evaluate(&inside, &region));
        assert!(SpatialPredicate::Within.evaluate(&inside, &region));
        assert!(!SpatialPredicate::Contains.evaluate(&inside, &region));
        assert!(SpatialPredicate::Contains.evaluate(&region, &inside));

        assert!(SpatialPredicate::Touches.evaluate(&edge, &region));
        assert!(SpatialPredicate::Intersects.evaluate(&edge, &region));
        assert!(!SpatialPredicate::Within.evaluate(&edge, &region));

        assert!(SpatialPredicate::Disjoint.evaluate(&outside, &region));
        assert!(!SpatialPredicate::Intersects.evaluate(&outside, &region));
    }

    #[test]
    fn predicate_names_roundtrip() {
        assert_eq!(SpatialPredicate::default(), SpatialPredicate::Intersects);
        assert_eq!(
            "Within".parse::<SpatialPredicate>().unwrap(),
            SpatialPredicate::Within
        );
        assert_eq!(SpatialPredicate::Disjoint.to_string(), "disjoint");
        assert!(!SpatialPredicate::Disjoint.requires_envelope_overlap());
    }

    #[test]
    fn split_parts_flattens_collections() {
        let multi: Geometry<f64> =
            MultiPolygon::new(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 1.0)]).into();
        let collection = Geometry::GeometryCollection(geo::GeometryCollection::new_from(vec![
            multi.clone(),
            Point::new(9.0, 9.0).into(),
        ]));

        assert_eq!(split_parts(multi).len(), 2);
        let parts = split_parts(collection);
        assert_eq!(parts.len(), 3);
        assert!(matches!(parts[2], Geometry::Point(_)));

        let line: Geometry<f64> = LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]).into();
        assert_eq!(split_parts(line.clone()), vec![line]);
    }

    #[test]
    fn any_part_matches_when_one_part_is_inside() {
        let region: Geometry<f64> = square(0.0, 0.0, 10.0).into();
        let straddling: Geometry<f64> =
            MultiPolygon::new(vec![square(1.0, 1.0, 1.0), square(50.0, 50.0, 1.0)]).into();

        // The whole geometry is not within the region, but one part is.
        assert!(!SpatialPredicate::Within.evaluate(&straddling, &region));
        assert!(any_part_matches(SpatialPredicate::Within, &straddling, &region));
    }

    #[test]
    fn empty_multi_part_geometry_is_only_disjoint() {
        let region: Geometry<f64> = square(0.0, 0.0, 10.0).into();
        let empty: Geometry<f64> = MultiPolygon::<f64>::new(vec![]).into();

        assert!(any_part_matches(SpatialPredicate::Disjoint, &empty, &region));
        assert!(!any_part_matches(SpatialPredicate::Intersects, &empty, &region));
        assert!(!any_part_matches(SpatialPredicate::Within, &empty, &region));

        let nested = Geometry::GeometryCollection(geo::GeometryCollection::new_from(vec![empty]));
        assert!(!has_parts(&nested));
        assert!(any_part_matches(SpatialPredicate::Disjoint, &nested, &region));
    }

    #[test]
    fn envelope_index_returns_overlapping_positions_in_order() {
        let geometries: Vec<Geometry<f64>> = vec![
            square(20.0, 20.0, 1.0).into(),
            square(0.0, 0.0, 1.0).into(),
            MultiPolygon::<f64>::new(vec![]).into(),
            square(4.0, 4.0, 1.0).into(),
        ];
        let index = EnvelopeIndex::build(&geometries);

        assert_eq!(index.size(), 3);

        let query: Geometry<f64> = square(0.5, 0.5, 4.0).into();
        let hits: Vec<usize> = index.intersecting(&query).into_iter().collect();
        assert_eq!(hits, vec![1, 3]);
    }
}
