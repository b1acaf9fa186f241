//! Job runner.
//!
//! Chains read -> concatenate -> reproject -> region -> subset -> join ->
//! write, reporting each finished step to a [`ProgressCallback`].

use std::path::PathBuf;

use geocomp_cli_utils::ProgressCallback;
use geocomp_crs::{Reprojector, local_utm, reproject_collection};
use geocomp_feature_models::{Crs, FeatureCollection};
use geocomp_io::{FormatRegistry, TableOptions, read_attribute_table};
use geocomp_workflow::{
    QueryRegion, attribute_join, attribute_join_on_id, build_query_region, concatenate,
    spatial_subset,
};

use crate::JobError;
use crate::job::{JobDefinition, RegionDefinition};

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    /// Features read across all inputs.
    pub read: usize,
    /// Features written.
    pub written: usize,
    pub output: PathBuf,
}

/// Number of progress steps `job` reports.
#[must_use]
pub fn step_count(job: &JobDefinition) -> u64 {
    4 + u64::from(job.crs.is_some()) + u64::from(job.join.is_some())
}

/// Runs `job` end to end.
///
/// # Errors
///
/// Returns [`JobError`] from the first step that fails. Nothing is written
/// unless every earlier step succeeded.
pub fn run_job(
    job: &JobDefinition,
    registry: &FormatRegistry,
    reprojector: &dyn Reprojector,
    progress: &dyn ProgressCallback,
) -> Result<JobSummary, JobError> {
    progress.set_message("Reading inputs".to_string());
    let mut inputs = vec![registry.read(&job.input.path, &job.input.read_options())?];
    for extra in &job.concat {
        inputs.push(registry.read(&extra.path, &extra.read_options())?);
    }
    let read: usize = inputs.iter().map(FeatureCollection::len).sum();
    let mut collection = concatenate(inputs)?;
    progress.inc(1);

    if let Some(crs) = &job.crs {
        progress.set_message(format!("Reprojecting to {crs}"));
        collection = reproject_collection(collection, crs, reprojector)?;
        progress.inc(1);
    }

    progress.set_message("Building query region".to_string());
    let region = load_region(&job.region, collection.crs(), registry, reprojector)?;
    progress.inc(1);

    progress.set_message(format!("Subsetting by {}", job.subset.predicate));
    collection = spatial_subset(collection, &region, job.subset.predicate, job.subset.mode)?;
    log::info!(
        "{} of {read} features satisfy {} ({})",
        collection.len(),
        job.subset.predicate,
        job.subset.mode
    );
    progress.inc(1);

    if let Some(join) = &job.join {
        progress.set_message(format!("Joining {}", join.table.display()));
        let options = TableOptions {
            delimiter: join.delimiter_byte()?,
            text_columns: join.text_columns.clone(),
        };
        let table = read_attribute_table(&join.table, &options)?;
        collection = if join.on_id {
            attribute_join_on_id(collection, &table, &join.key)?
        } else {
            attribute_join(collection, &table, &join.key)?
        };
        progress.inc(1);
    }

    progress.set_message("Writing output".to_string());
    let format = job
        .output
        .format
        .as_deref()
        .map(|name| registry.resolve_format(name))
        .transpose()?;
    registry.write(&collection, &job.output.path, format)?;
    progress.inc(1);

    Ok(JobSummary {
        read,
        written: collection.len(),
        output: job.output.path.clone(),
    })
}

fn load_region(
    definition: &RegionDefinition,
    collection_crs: &Crs,
    registry: &FormatRegistry,
    reprojector: &dyn Reprojector,
) -> Result<QueryRegion, JobError> {
    let source = registry.read(definition.source(), &definition.read_options())?;
    let feature = source
        .feature(definition.feature())
        .ok_or_else(|| JobError::FeatureNotFound {
            feature: definition.feature().to_string(),
            path: definition.source().display().to_string(),
        })?;

    let region = match definition {
        RegionDefinition::Buffer {
            distance,
            working_crs,
            output_crs,
            ..
        } => {
            let working_crs = match working_crs {
                Some(crs) => crs.clone(),
                None => local_utm(&feature.geometry, source.crs(), reprojector)?,
            };
            log::info!("Buffering '{}' by {distance} in {working_crs}", definition.feature());

            build_query_region(
                reprojector,
                feature,
                source.crs(),
                *distance,
                &working_crs,
                output_crs.as_ref().unwrap_or(collection_crs),
            )?
        }
        RegionDefinition::Feature { .. } => {
            QueryRegion::new(feature.geometry.clone(), source.crs().clone())
                .reproject(collection_crs, reprojector)?
        }
    };

    log::debug!(
        "Query region from '{}' in {} is in {}",
        definition.feature(),
        definition.source().display(),
        region.crs()
    );

    Ok(region)
}
