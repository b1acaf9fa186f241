//! Projections known to the built-in provider.
//!
//! All transforms pivot through WGS 84 longitude/latitude in degrees, so a
//! conversion between two projected CRSs is an inverse followed by a
//! forward projection. No datum shifts are performed; every supported CRS
//! is on the WGS 84 ellipsoid (or its sphere, for Web Mercator).

use geocomp_feature_models::Crs;

use crate::ProjectionError;

/// WGS 84 semi-major axis in metres.
const WGS84_A: f64 = 6_378_137.0;

/// WGS 84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// UTM scale factor on the central meridian.
const UTM_K0: f64 = 0.9996;

const UTM_FALSE_EASTING: f64 = 500_000.0;

/// False northing applied in the southern hemisphere zones.
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Widest longitude offset from a zone's central meridian that the UTM
/// series is evaluated for.
const UTM_MAX_OFFSET_DEGREES: f64 = 90.0;

/// Latitude at which Web Mercator becomes square.
const WEB_MERCATOR_MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// A resolved CRS the built-in provider can transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Longitude/latitude in degrees on WGS 84 (`EPSG:4326`).
    Geographic,
    /// Spherical Web Mercator in metres (`EPSG:3857`).
    WebMercator,
    /// WGS 84 / UTM (`EPSG:326zz` north, `EPSG:327zz` south).
    Utm {
        /// Zone number, 1 to 60.
        zone: u8,
        /// Northern hemisphere zone.
        north: bool,
    },
}

impl Projection {
    /// Resolves a CRS identifier into a projection.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::UndefinedCrs`] for an undefined CRS and
    /// [`ProjectionError::Unresolvable`] for anything the built-in provider
    /// does not know.
    pub fn resolve(crs: &Crs) -> Result<Self, ProjectionError> {
        let code = match crs {
            Crs::Undefined => return Err(ProjectionError::UndefinedCrs),
            Crs::Other(_) => {
                return Err(ProjectionError::Unresolvable { crs: crs.clone() });
            }
            Crs::Epsg(code) => *code,
        };

        match code {
            4326 => Ok(Self::Geographic),
            3857 | 900_913 => Ok(Self::WebMercator),
            32601..=32660 => Ok(Self::Utm {
                zone: zone_of(code - 32600),
                north: true,
            }),
            32701..=32760 => Ok(Self::Utm {
                zone: zone_of(code - 32700),
                north: false,
            }),
            _ => Err(ProjectionError::Unresolvable { crs: crs.clone() }),
        }
    }

    /// The UTM zone (WGS 84) whose central meridian is closest to `lon`,
    /// on the hemisphere of `lat`.
    #[must_use]
    pub fn utm_for(lon: f64, lat: f64) -> Crs {
        let normalized = (lon + 180.0).rem_euclid(360.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let zone = ((normalized / 6.0).floor() as u32).min(59) + 1;
        let base = if lat >= 0.0 { 32600 } else { 32700 };
        Crs::Epsg(base + zone)
    }

    #[must_use]
    pub const fn is_projected(self) -> bool {
        !matches!(self, Self::Geographic)
    }

    /// Projects longitude/latitude degrees into this CRS. Returns
    /// non-finite values outside the projection's domain.
    #[must_use]
    pub fn forward(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Self::Geographic => (lon, lat),
            Self::WebMercator => web_mercator_forward(lon, lat),
            Self::Utm { zone, north } => utm_forward(lon, lat, zone, north),
        }
    }

    /// Unprojects coordinates in this CRS into longitude/latitude degrees.
    #[must_use]
    pub fn inverse(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Self::Geographic => (x, y),
            Self::WebMercator => web_mercator_inverse(x, y),
            Self::Utm { zone, north } => utm_inverse(x, y, zone, north),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn zone_of(offset: u32) -> u8 {
    offset as u8
}

fn web_mercator_forward(lon: f64, lat: f64) -> (f64, f64) {
    if lat.abs() > WEB_MERCATOR_MAX_LATITUDE {
        return (f64::NAN, f64::NAN);
    }
    let x = WGS84_A * lon.to_radians();
    let y = WGS84_A * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}

fn web_mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WGS84_A).to_degrees();
    let lat = 2.0f64
        .mul_add((y / WGS84_A).exp().atan(), -std::f64::consts::FRAC_PI_2)
        .to_degrees();
    (lon, lat)
}

/// Ellipsoid constants shared by the UTM series expansions.
struct Ellipsoid {
    e2: f64,
    ep2: f64,
}

impl Ellipsoid {
    const fn wgs84() -> Self {
        let e2 = WGS84_F * (2.0 - WGS84_F);
        Self {
            e2,
            ep2: e2 / (1.0 - e2),
        }
    }

    /// Meridian arc length from the equator to `phi`.
    fn meridian_arc(&self, phi: f64) -> f64 {
        let e2 = self.e2;
        let e4 = e2 * e2;
        let e6 = e4 * e2;
        WGS84_A
            * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
                - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
                + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
                - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
    }
}

fn central_meridian(zone: u8) -> f64 {
    (f64::from(zone) - 1.0).mul_add(6.0, -177.0).to_radians()
}

/// Wraps an angle in radians into `[-pi, pi)`.
fn wrap_radians(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};

    (angle + PI).rem_euclid(TAU) - PI
}

#[allow(clippy::suboptimal_flops, clippy::many_single_char_names)]
fn utm_forward(lon: f64, lat: f64, zone: u8, north: bool) -> (f64, f64) {
    let ell = Ellipsoid::wgs84();
    let phi = lat.to_radians();
    let offset = wrap_radians(lon.to_radians() - central_meridian(zone));
    if offset.abs() > UTM_MAX_OFFSET_DEGREES.to_radians() {
        return (f64::NAN, f64::NAN);
    }

    let sin_phi = phi.sin();
    let n = WGS84_A / (1.0 - ell.e2 * sin_phi * sin_phi).sqrt();
    let t = phi.tan().powi(2);
    let c = ell.ep2 * phi.cos().powi(2);
    let a = phi.cos() * offset;
    let m = ell.meridian_arc(phi);

    let x = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ell.ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;

    let mut y = UTM_K0
        * (m + n
            * phi.tan()
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ell.ep2) * a.powi(6) / 720.0));

    if !north {
        y += UTM_FALSE_NORTHING_SOUTH;
    }

    (x, y)
}

#[allow(clippy::suboptimal_flops, clippy::many_single_char_names)]
fn utm_inverse(x: f64, y: f64, zone: u8, north: bool) -> (f64, f64) {
    let ell = Ellipsoid::wgs84();
    let e2 = ell.e2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    let x = x - UTM_FALSE_EASTING;
    let y = if north { y } else { y - UTM_FALSE_NORTHING_SOUTH };

    let m = y / UTM_K0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    // footpoint latitude
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let n1 = WGS84_A / (1.0 - e2 * sin_phi1 * sin_phi1).sqrt();
    let t1 = phi1.tan().powi(2);
    let c1 = ell.ep2 * phi1.cos().powi(2);
    let r1 = WGS84_A * (1.0 - e2) / (1.0 - e2 * sin_phi1 * sin_phi1).powf(1.5);
    let d = x / (n1 * UTM_K0);

    let phi = phi1
        - (n1 * phi1.tan() / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ell.ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ell.ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lam = central_meridian(zone)
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ell.ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / phi1.cos();

    (wrap_radians(lam).to_degrees(), phi.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_supported_codes() {
        assert_eq!(Projection::resolve(&Crs::WGS84), Ok(Projection::Geographic));
        assert_eq!(
            Projection::resolve(&Crs::WEB_MERCATOR),
            Ok(Projection::WebMercator)
        );
        assert_eq!(
            Projection::resolve(&Crs::Epsg(32630)),
            Ok(Projection::Utm {
                zone: 30,
                north: true
            })
        );
        assert_eq!(
            Projection::resolve(&Crs::Epsg(32760)),
            Ok(Projection::Utm {
                zone: 60,
                north: false
            })
        );
    }

    #[test]
    fn rejects_unknown_and_undefined() {
        assert_eq!(
            Projection::resolve(&Crs::Epsg(32661)),
            Err(ProjectionError::Unresolvable {
                crs: Crs::Epsg(32661)
            })
        );
        assert_eq!(
            Projection::resolve(&Crs::Undefined),
            Err(ProjectionError::UndefinedCrs)
        );
        assert!(matches!(
            Projection::resolve(&Crs::Other("+proj=aeqd".into())),
            Err(ProjectionError::Unresolvable { .. })
        ));
    }

    #[test]
    fn picks_utm_zone_from_longitude() {
        assert_eq!(Projection::utm_for(-0.1276, 51.5), Crs::Epsg(32630));
        assert_eq!(Projection::utm_for(18.4, -33.9), Crs::Epsg(32734));
        assert_eq!(Projection::utm_for(180.0, 10.0), Crs::Epsg(32601));
        assert_eq!(Projection::utm_for(179.9, 10.0), Crs::Epsg(32660));
    }

    #[test]
    fn utm_wraps_longitude_across_the_antimeridian() {
        let zone_60_south = Projection::resolve(&Crs::Epsg(32760)).unwrap();

        let (x, y) = zone_60_south.forward(-179.9, -17.0);
        assert!((x - 500_000.0).abs() < 700_000.0, "easting {x}");

        let (lon, lat) = zone_60_south.inverse(x, y);
        assert!((lon - -179.9).abs() < 1e-6, "lon {lon}");
        assert!((lat - -17.0).abs() < 1e-6, "lat {lat}");

        let east_of_zone_1 = Projection::resolve(&Crs::Epsg(32601))
            .unwrap()
            .forward(179.9, 10.0);
        assert!(east_of_zone_1.0 < 500_000.0);
    }

    #[test]
    fn utm_is_undefined_far_from_the_central_meridian() {
        let zone_60_south = Projection::resolve(&Crs::Epsg(32760)).unwrap();
        let (x, y) = zone_60_south.forward(0.0, -17.0);
        assert!(x.is_nan() && y.is_nan());
    }

    #[test]
    fn web_mercator_roundtrip() {
        let (x, y) = Projection::WebMercator.forward(13.4, 52.5);
        let (lon, lat) = Projection::WebMercator.inverse(x, y);
        assert!((lon - 13.4).abs() < 1e-9);
        assert!((lat - 52.5).abs() < 1e-9);
    }
}
