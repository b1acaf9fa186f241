#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate reference system resolution and reprojection.
//!
//! The [`Reprojector`] trait is the seam to a CRS provider. The bundled
//! [`BuiltinReprojector`] resolves WGS 84 geographic coordinates, Web
//! Mercator and the WGS 84 / UTM zones, which covers the projected CRSs
//! needed for metric buffering anywhere on the globe. Anything else can
//! be plugged in by implementing [`Reprojector`].

pub mod projection;

use geo::{BoundingRect, Coord, Geometry, MapCoords};
use geocomp_feature_models::{Crs, FeatureCollection};
use thiserror::Error;

pub use projection::Projection;

/// Errors raised while resolving or transforming between CRSs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// The data has no CRS, so it cannot be transformed.
    #[error("CRS is undefined; assign one before transforming")]
    UndefinedCrs,

    /// The CRS definition is not known to the provider.
    #[error("Unresolvable CRS '{crs}'")]
    Unresolvable {
        /// The offending definition.
        crs: Crs,
    },

    /// A projected CRS was required but a geographic one was given.
    #[error("CRS '{crs}' is not projected; metric operations need a projected CRS")]
    NotProjected {
        /// The geographic CRS.
        crs: Crs,
    },

    /// Two inputs that must share a CRS do not.
    #[error("CRS mismatch: expected '{expected}', found '{found}'")]
    CrsMismatch {
        /// CRS of the reference input.
        expected: Crs,
        /// CRS of the mismatching input.
        found: Crs,
    },

    /// A coordinate fell outside the domain of the projection.
    #[error("Coordinate ({x}, {y}) is outside the domain of '{crs}'")]
    OutOfDomain {
        /// CRS whose domain was left.
        crs: Crs,
        /// Input x.
        x: f64,
        /// Input y.
        y: f64,
    },

    /// A UTM zone was requested for a geometry without coordinates.
    #[error("Cannot pick a UTM zone for an empty geometry")]
    EmptyGeometry,
}

/// A CRS/reprojection provider.
pub trait Reprojector {
    /// Transforms a single coordinate from `from` into `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] if either CRS cannot be resolved or the
    /// coordinate is outside the domain of the target projection.
    fn transform_coord(&self, from: &Crs, to: &Crs, coord: Coord<f64>)
    -> Result<Coord<f64>, ProjectionError>;

    /// Whether the provider can treat `crs` as a projected, linear-unit CRS.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] if the CRS cannot be resolved.
    fn is_projected(&self, crs: &Crs) -> Result<bool, ProjectionError>;

    /// Transforms every coordinate of `geometry` from `from` into `to`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProjectionError`] raised for any coordinate.
    fn reproject_geometry(
        &self,
        geometry: &Geometry<f64>,
        from: &Crs,
        to: &Crs,
    ) -> Result<Geometry<f64>, ProjectionError> {
        check_defined(from)?;
        check_defined(to)?;
        if from == to {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|coord| self.transform_coord(from, to, coord))
    }
}

/// The bundled provider backed by [`Projection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinReprojector;

impl Reprojector for BuiltinReprojector {
    fn transform_coord(
        &self,
        from: &Crs,
        to: &Crs,
        coord: Coord<f64>,
    ) -> Result<Coord<f64>, ProjectionError> {
        check_defined(from)?;
        check_defined(to)?;
        if from == to {
            return Ok(coord);
        }

        let source = Projection::resolve(from)?;
        let target = Projection::resolve(to)?;

        let (lon, lat) = source.inverse(coord.x, coord.y);
        let (x, y) = target.forward(lon, lat);

        if x.is_finite() && y.is_finite() {
            Ok(Coord { x, y })
        } else {
            Err(ProjectionError::OutOfDomain {
                crs: to.clone(),
                x: coord.x,
                y: coord.y,
            })
        }
    }

    fn is_projected(&self, crs: &Crs) -> Result<bool, ProjectionError> {
        check_defined(crs)?;
        Ok(Projection::resolve(crs)?.is_projected())
    }
}

const fn check_defined(crs: &Crs) -> Result<(), ProjectionError> {
    if crs.is_defined() {
        Ok(())
    } else {
        Err(ProjectionError::UndefinedCrs)
    }
}

/// Reprojects every geometry of `collection` into `target`.
///
/// Identifiers, attributes and feature order are unchanged.
///
/// # Errors
///
/// Returns [`ProjectionError`] if the collection's CRS or `target` cannot
/// be resolved, or any coordinate cannot be transformed.
pub fn reproject_collection(
    collection: FeatureCollection,
    target: &Crs,
    reprojector: &dyn Reprojector,
) -> Result<FeatureCollection, ProjectionError> {
    let source = collection.crs().clone();
    check_defined(&source)?;
    check_defined(target)?;

    if &source == target {
        return Ok(collection);
    }

    log::debug!(
        "Reprojecting {} features from {source} to {target}",
        collection.len()
    );

    collection.try_map_geometries(target.clone(), |geometry| {
        reprojector.reproject_geometry(&geometry, &source, target)
    })
}

/// The WGS 84 / UTM zone centred nearest to `geometry`.
///
/// The geometry is transformed to WGS 84 and the zone is chosen from the
/// centre of its bounding box.
///
/// # Errors
///
/// Returns [`ProjectionError::EmptyGeometry`] for a geometry without
/// coordinates, or any error raised transforming it from `crs`.
pub fn local_utm(
    geometry: &Geometry<f64>,
    crs: &Crs,
    reprojector: &dyn Reprojector,
) -> Result<Crs, ProjectionError> {
    let geographic = reprojector.reproject_geometry(geometry, crs, &Crs::WGS84)?;
    let center = geographic
        .bounding_rect()
        .ok_or(ProjectionError::EmptyGeometry)?
        .center();

    Ok(Projection::utm_for(center.x, center.y))
}

#[cfg(test)]
mod tests {
    use geo::Point;
    use geocomp_feature_models::{Feature, Schema};

    use super::*;

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn identity_transform_accepts_unknown_crs() {
        let crs = Crs::Other("ESRI:54009".to_string());
        let coord = Coord { x: 1.0, y: 2.0 };
        assert_eq!(
            BuiltinReprojector.transform_coord(&crs, &crs, coord),
            Ok(coord)
        );
    }

    #[test]
    fn undefined_crs_is_rejected() {
        let result = BuiltinReprojector.transform_coord(
            &Crs::Undefined,
            &Crs::WGS84,
            Coord { x: 0.0, y: 0.0 },
        );
        assert_eq!(result, Err(ProjectionError::UndefinedCrs));
    }

    #[test]
    fn unknown_code_is_unresolvable() {
        let result = BuiltinReprojector.transform_coord(
            &Crs::WGS84,
            &Crs::Epsg(27700),
            Coord { x: 0.0, y: 51.0 },
        );
        assert_eq!(
            result,
            Err(ProjectionError::Unresolvable {
                crs: Crs::Epsg(27700)
            })
        );
    }

    #[test]
    fn web_mercator_pole_is_out_of_domain() {
        let result = BuiltinReprojector.transform_coord(
            &Crs::WGS84,
            &Crs::WEB_MERCATOR,
            Coord { x: 0.0, y: 90.0 },
        );
        assert!(matches!(result, Err(ProjectionError::OutOfDomain { .. })));
    }

    #[test]
    fn utm_far_outside_its_zone_is_out_of_domain() {
        let result = BuiltinReprojector.transform_coord(
            &Crs::WGS84,
            &Crs::Epsg(32760),
            Coord { x: 0.0, y: -17.0 },
        );
        assert!(matches!(result, Err(ProjectionError::OutOfDomain { .. })));
    }

    #[test]
    fn utm_roundtrip_across_the_antimeridian() {
        let fiji = Coord { x: -179.9, y: -17.0 };
        let projected = BuiltinReprojector
            .transform_coord(&Crs::WGS84, &Crs::Epsg(32760), fiji)
            .unwrap();
        let back = BuiltinReprojector
            .transform_coord(&Crs::Epsg(32760), &Crs::WGS84, projected)
            .unwrap();

        assert!(close(back.x, fiji.x, 1e-6), "lon {}", back.x);
        assert!(close(back.y, fiji.y, 1e-6), "lat {}", back.y);
    }

    #[test]
    fn local_utm_follows_the_geometry() {
        let london: Geometry<f64> = Point::new(-0.1276, 51.5072).into();
        assert_eq!(
            local_utm(&london, &Crs::WGS84, &BuiltinReprojector),
            Ok(Crs::Epsg(32630))
        );

        let cape_town = BuiltinReprojector
            .reproject_geometry(
                &Point::new(18.42, -33.92).into(),
                &Crs::WGS84,
                &Crs::WEB_MERCATOR,
            )
            .unwrap();
        assert_eq!(
            local_utm(&cape_town, &Crs::WEB_MERCATOR, &BuiltinReprojector),
            Ok(Crs::Epsg(32734))
        );

        let empty: Geometry<f64> = geo::MultiPolygon::<f64>::new(vec![]).into();
        assert_eq!(
            local_utm(&empty, &Crs::WGS84, &BuiltinReprojector),
            Err(ProjectionError::EmptyGeometry)
        );
    }

    #[test]
    fn utm_roundtrip_through_wgs84() {
        let utm = Crs::Epsg(32630);
        let london = Coord { x: -0.1276, y: 51.5072 };

        let projected = BuiltinReprojector
            .transform_coord(&Crs::WGS84, &utm, london)
            .unwrap();
        assert!(close(projected.x, 699_331.0, 1.0), "easting {}", projected.x);
        assert!(close(projected.y, 5_710_142.1, 1.0), "northing {}", projected.y);

        let back = BuiltinReprojector
            .transform_coord(&utm, &Crs::WGS84, projected)
            .unwrap();
        assert!(close(back.x, london.x, 1e-7));
        assert!(close(back.y, london.y, 1e-7));
    }

    #[test]
    fn utm_central_meridian_on_equator_is_false_origin() {
        let projected = BuiltinReprojector
            .transform_coord(&Crs::WGS84, &Crs::Epsg(32631), Coord { x: 3.0, y: 0.0 })
            .unwrap();
        assert!(close(projected.x, 500_000.0, 1e-6));
        assert!(close(projected.y, 0.0, 1e-6));

        let south = BuiltinReprojector
            .transform_coord(&Crs::WGS84, &Crs::Epsg(32731), Coord { x: 3.0, y: 0.0 })
            .unwrap();
        assert!(close(south.y, 10_000_000.0, 1e-6));
    }

    #[test]
    fn is_projected_distinguishes_geographic() {
        assert_eq!(BuiltinReprojector.is_projected(&Crs::WGS84), Ok(false));
        assert_eq!(BuiltinReprojector.is_projected(&Crs::Epsg(32733)), Ok(true));
        assert_eq!(
            BuiltinReprojector.is_projected(&Crs::Undefined),
            Err(ProjectionError::UndefinedCrs)
        );
    }

    #[test]
    fn reproject_collection_keeps_ids_and_order() {
        let collection = FeatureCollection::new(
            Schema::empty(),
            Crs::WGS84,
            vec![
                Feature::new("b", vec![], Point::new(10.0, 0.0)),
                Feature::new("a", vec![], Point::new(0.0, 0.0)),
            ],
        )
        .unwrap();

        let projected =
            reproject_collection(collection, &Crs::WEB_MERCATOR, &BuiltinReprojector).unwrap();

        assert_eq!(projected.crs(), &Crs::WEB_MERCATOR);
        let ids: Vec<&str> = projected.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        let Geometry::Point(p) = projected.features()[0].geometry else {
            panic!("expected point");
        };
        assert!(close(p.x(), 1_113_194.9, 0.1));
        assert!(close(p.y(), 0.0, 1e-6));
    }
}
