//! Row-wise concatenation of feature collections.
//!
//! Attribute rows and geometries are concatenated as two separate
//! sequences and recombined afterwards, so inputs mixing single-part and
//! multi-part geometries per row concatenate the same way as uniform
//! ones.

use geo::Geometry;
use geocomp_crs::ProjectionError;
use geocomp_feature_models::{AttributeValue, Feature, FeatureCollection, FeatureId, Schema};

use crate::WorkflowError;

/// Concatenates `collections` in order.
///
/// The first collection fixes the schema and CRS. Later collections must
/// hold the same columns with the same types, in any order; their values
/// are realigned to the first collection's column order. A single input
/// is returned unchanged.
///
/// # Errors
///
/// * [`WorkflowError::EmptyConcatenation`] if `collections` is empty.
/// * [`WorkflowError::SchemaMismatch`] if a schema differs from the
///   first.
/// * [`ProjectionError::CrsMismatch`] if a CRS differs from the first.
pub fn concatenate(
    collections: Vec<FeatureCollection>,
) -> Result<FeatureCollection, WorkflowError> {
    let count = collections.len();
    let mut inputs = collections.into_iter();
    let Some(first) = inputs.next() else {
        return Err(WorkflowError::EmptyConcatenation);
    };
    if count == 1 {
        return Ok(first);
    }

    let (schema, crs, features) = first.into_parts();

    let mut ids: Vec<FeatureId> = Vec::new();
    let mut rows: Vec<Vec<AttributeValue>> = Vec::new();
    let mut geometries: Vec<Geometry<f64>> = Vec::new();

    for feature in features {
        ids.push(feature.id);
        rows.push(feature.attributes);
        geometries.push(feature.geometry);
    }

    for (offset, collection) in inputs.enumerate() {
        let index = offset + 1;

        let alignment = schema.alignment(collection.schema()).ok_or_else(|| {
            WorkflowError::SchemaMismatch {
                index,
                expected: describe(&schema),
                found: describe(collection.schema()),
            }
        })?;
        if collection.crs() != &crs {
            return Err(ProjectionError::CrsMismatch {
                expected: crs,
                found: collection.crs().clone(),
            }
            .into());
        }

        let (_, _, features) = collection.into_parts();
        for Feature {
            id,
            mut attributes,
            geometry,
        } in features
        {
            ids.push(id);
            rows.push(
                alignment
                    .iter()
                    .map(|&i| attributes.get_mut(i).map(std::mem::take).unwrap_or_default())
                    .collect(),
            );
            geometries.push(geometry);
        }
    }

    let features: Vec<Feature> = ids
        .into_iter()
        .zip(rows)
        .zip(geometries)
        .map(|((id, attributes), geometry)| Feature {
            id,
            attributes,
            geometry,
        })
        .collect();

    log::debug!(
        "Concatenated {count} collections into {} features",
        features.len()
    );

    Ok(FeatureCollection::new(schema, crs, features)?)
}

fn describe(schema: &Schema) -> Vec<String> {
    schema
        .columns()
        .iter()
        .map(|c| format!("{}:{}", c.name, c.column_type))
        .collect()
}
