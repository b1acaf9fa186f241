//! TOML job definitions.
//!
//! A job reads one or more feature collections, concatenates them,
//! optionally reprojects them, subsets them against a query region,
//! optionally joins an attribute table, and writes the result.
//!
//! ```toml
//! crs = "EPSG:3857"
//!
//! [input]
//! path = "data/countries.geojson"
//! id_field = "iso_a3"
//!
//! [region]
//! type = "buffer"
//! source = "data/cities.geojson"
//! feature = "LON"
//! distance = 500000.0
//! working_crs = "EPSG:32630"
//!
//! [subset]
//! predicate = "intersects"
//! mode = "whole_feature"
//!
//! [join]
//! table = "data/indicators.csv"
//! key = "iso_a2"
//! text_columns = ["region_code"]
//!
//! [output]
//! path = "out/near_london.geojson"
//! ```

use std::path::{Path, PathBuf};

use geocomp_feature_models::Crs;
use geocomp_io::ReadOptions;
use geocomp_workflow::{MultiPartMode, SpatialPredicate};
use serde::Deserialize;

use crate::JobError;

/// A complete subset-join job.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobDefinition {
    /// Primary input collection.
    pub input: InputDefinition,
    /// Further collections appended to the primary input, in order.
    #[serde(default)]
    pub concat: Vec<InputDefinition>,
    /// CRS the inputs are reprojected into before subsetting. Inputs are
    /// used as read when absent.
    #[serde(default)]
    pub crs: Option<Crs>,
    /// Query region the inputs are subset against.
    pub region: RegionDefinition,
    #[serde(default)]
    pub subset: SubsetDefinition,
    #[serde(default)]
    pub join: Option<JoinDefinition>,
    pub output: OutputDefinition,
}

/// A vector file to read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputDefinition {
    pub path: PathBuf,
    /// Property holding feature identifiers when features lack an `id`.
    #[serde(default)]
    pub id_field: Option<String>,
}

impl InputDefinition {
    #[must_use]
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            id_field: self.id_field.clone(),
        }
    }
}

/// How the query region is derived from a reference feature.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegionDefinition {
    /// Buffer a feature by a distance measured in a projected CRS.
    Buffer {
        source: PathBuf,
        #[serde(default)]
        source_id_field: Option<String>,
        /// Identifier of the reference feature in `source`.
        feature: String,
        /// Buffer distance in the linear unit of `working_crs`.
        distance: f64,
        /// Projected CRS the buffer is computed in. Defaults to the UTM
        /// zone centred nearest to the reference feature.
        #[serde(default)]
        working_crs: Option<Crs>,
        /// Defaults to the CRS of the (reprojected) inputs.
        #[serde(default)]
        output_crs: Option<Crs>,
    },
    /// Use a feature's geometry as it is.
    Feature {
        source: PathBuf,
        #[serde(default)]
        source_id_field: Option<String>,
        feature: String,
    },
}

impl RegionDefinition {
    #[must_use]
    pub fn source(&self) -> &Path {
        match self {
            Self::Buffer { source, .. } | Self::Feature { source, .. } => source,
        }
    }

    #[must_use]
    pub fn feature(&self) -> &str {
        match self {
            Self::Buffer { feature, .. } | Self::Feature { feature, .. } => feature,
        }
    }

    #[must_use]
    pub fn read_options(&self) -> ReadOptions {
        let (Self::Buffer {
            source_id_field, ..
        }
        | Self::Feature {
            source_id_field, ..
        }) = self;

        ReadOptions {
            id_field: source_id_field.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubsetDefinition {
    pub predicate: SpatialPredicate,
    pub mode: MultiPartMode,
}

/// Attribute table to left-join onto the subset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinDefinition {
    pub table: PathBuf,
    /// Key column. Must exist in both the collection and the table unless
    /// `on_id` is set, in which case it names the table column matched
    /// against feature identifiers.
    pub key: String,
    #[serde(default)]
    pub on_id: bool,
    /// Columns read as text regardless of their content.
    #[serde(default)]
    pub text_columns: Vec<String>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

const fn default_delimiter() -> char {
    ','
}

impl JoinDefinition {
    /// The delimiter as a byte.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidDelimiter`] unless it is a single ASCII
    /// character.
    pub fn delimiter_byte(&self) -> Result<u8, JobError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(JobError::InvalidDelimiter {
                delimiter: self.delimiter,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputDefinition {
    pub path: PathBuf,
    /// Format name; inferred from the extension when absent.
    #[serde(default)]
    pub format: Option<String>,
}

/// Parses a job definition from TOML text.
///
/// # Errors
///
/// Returns [`JobError::Parse`] if the text is not a valid job.
pub fn parse_job(text: &str) -> Result<JobDefinition, JobError> {
    Ok(toml::from_str(text)?)
}

/// Reads and parses the job definition stored at `path`.
///
/// # Errors
///
/// Returns [`JobError`] if the file cannot be read or parsed.
pub fn load_job(path: &Path) -> Result<JobDefinition, JobError> {
    let text = std::fs::read_to_string(path)?;
    let job = parse_job(&text)?;

    log::debug!("Loaded job from {}", path.display());

    Ok(job)
}
