//! Predicate-based subsetting of feature collections.

use std::collections::BTreeSet;

use geocomp_crs::ProjectionError;
use geocomp_feature_models::{Feature, FeatureCollection, FeatureId};
use geocomp_spatial::{
    EnvelopeIndex, SpatialPredicate, any_part_matches, has_parts, is_multi_part, split_parts,
};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{QueryRegion, WorkflowError};

/// How multi-part features are treated when only some parts match.
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
pub enum MultiPartMode {
    /// Keep the whole, unmodified feature if any part matches.
    #[default]
    WholeFeature,
    /// Decompose multi-part features into parts with derived identifiers
    /// (`id#index`) and keep only the matching parts. Multi-part geometries
    /// with no parts are kept whole under their own identifier.
    SplitBeforeFilter,
}

/// Keeps the features of `collection` that satisfy `predicate` against
/// `region`.
///
/// The result is a subsequence of the input: order, identifiers and
/// attributes are unchanged. In [`MultiPartMode::SplitBeforeFilter`] the
/// subsequence is taken over the decomposed parts instead.
///
/// # Errors
///
/// Returns [`ProjectionError::CrsMismatch`] if the collection and region
/// are in different CRSs. Reproject one of them first. In
/// [`MultiPartMode::SplitBeforeFilter`], returns
/// [`WorkflowError::DerivedIdCollision`] if a derived part identifier
/// equals the identifier of a feature that is not decomposed, whether or
/// not either would match.
pub fn spatial_subset(
    collection: FeatureCollection,
    region: &QueryRegion,
    predicate: SpatialPredicate,
    mode: MultiPartMode,
) -> Result<FeatureCollection, WorkflowError> {
    if collection.crs() != region.crs() {
        return Err(ProjectionError::CrsMismatch {
            expected: region.crs().clone(),
            found: collection.crs().clone(),
        }
        .into());
    }

    let input_len = collection.len();
    let (schema, crs, features) = collection.into_parts();

    let candidates: Vec<Feature> = match mode {
        MultiPartMode::WholeFeature => features,
        MultiPartMode::SplitBeforeFilter => split_features(features)?,
    };

    let prefilter = predicate.requires_envelope_overlap().then(|| {
        EnvelopeIndex::build(candidates.iter().map(|f| &f.geometry)).intersecting(region.geometry())
    });

    let kept: Vec<Feature> = candidates
        .into_iter()
        .enumerate()
        .filter(|(position, feature)| {
            prefilter.as_ref().is_none_or(|set| set.contains(position))
                && any_part_matches(predicate, &feature.geometry, region.geometry())
        })
        .map(|(_, feature)| feature)
        .collect();

    log::debug!(
        "Subset {input_len} features by {predicate} ({mode}): kept {}",
        kept.len()
    );

    Ok(FeatureCollection::new(schema, crs, kept)?)
}

fn decomposes(feature: &Feature) -> bool {
    is_multi_part(&feature.geometry) && has_parts(&feature.geometry)
}

/// One feature per part, with derived identifiers. Features that do not
/// decompose are returned as they are.
fn split_features(features: Vec<Feature>) -> Result<Vec<Feature>, WorkflowError> {
    let kept_ids: BTreeSet<FeatureId> = features
        .iter()
        .filter(|feature| !decomposes(feature))
        .map(|feature| feature.id.clone())
        .collect();

    let mut split = Vec::with_capacity(features.len());
    for feature in features {
        if !decomposes(&feature) {
            split.push(feature);
            continue;
        }

        let Feature {
            id,
            attributes,
            geometry,
        } = feature;

        for (index, part) in split_parts(geometry).into_iter().enumerate() {
            let part_id = id.part(index);
            if kept_ids.contains(&part_id) {
                return Err(WorkflowError::DerivedIdCollision {
                    id: part_id.to_string(),
                });
            }
            split.push(Feature {
                id: part_id,
                attributes: attributes.clone(),
                geometry: part,
            });
        }
    }

    Ok(split)
}
