//! Query regions used as the right-hand operand of spatial predicates.

use geo::{Buffer, Geometry};
use geocomp_crs::{ProjectionError, Reprojector};
use geocomp_feature_models::{Crs, Feature};

use crate::WorkflowError;

/// A single geometry with the CRS its coordinates are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRegion {
    geometry: Geometry<f64>,
    crs: Crs,
}

impl QueryRegion {
    #[must_use]
    pub const fn new(geometry: Geometry<f64>, crs: Crs) -> Self {
        Self { geometry, crs }
    }

    #[must_use]
    pub const fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    #[must_use]
    pub const fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Reprojects the region into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] if either CRS cannot be resolved.
    pub fn reproject(
        self,
        target: &Crs,
        reprojector: &dyn Reprojector,
    ) -> Result<Self, ProjectionError> {
        if &self.crs == target {
            return Ok(self);
        }
        let geometry = reprojector.reproject_geometry(&self.geometry, &self.crs, target)?;
        Ok(Self::new(geometry, target.clone()))
    }
}

/// Buffers `feature` by `distance` and returns the buffer in `output_crs`.
///
/// The buffer is computed in `working_crs`, which must be projected so
/// that `distance` is in linear units. Buffering in angular coordinates
/// would distort the region.
///
/// # Errors
///
/// * [`WorkflowError::InvalidDistance`] if `distance` is negative or not
///   finite.
/// * [`ProjectionError::UndefinedCrs`] if `feature_crs` is undefined.
/// * [`ProjectionError::NotProjected`] if `working_crs` is geographic.
/// * [`ProjectionError::Unresolvable`] if any CRS is unknown to
///   `reprojector`.
pub fn build_query_region(
    reprojector: &dyn Reprojector,
    feature: &Feature,
    feature_crs: &Crs,
    distance: f64,
    working_crs: &Crs,
    output_crs: &Crs,
) -> Result<QueryRegion, WorkflowError> {
    if !distance.is_finite() || distance < 0.0 {
        return Err(WorkflowError::InvalidDistance { distance });
    }
    if !feature_crs.is_defined() {
        return Err(ProjectionError::UndefinedCrs.into());
    }
    if !reprojector.is_projected(working_crs)? {
        return Err(ProjectionError::NotProjected {
            crs: working_crs.clone(),
        }
        .into());
    }

    let working = reprojector.reproject_geometry(&feature.geometry, feature_crs, working_crs)?;
    let buffered = Geometry::MultiPolygon(working.buffer(distance));
    let geometry = reprojector.reproject_geometry(&buffered, working_crs, output_crs)?;

    log::debug!(
        "Built query region around '{}': {distance} units in {working_crs}, \
         returned in {output_crs}",
        feature.id
    );

    Ok(QueryRegion::new(geometry, output_crs.clone()))
}
