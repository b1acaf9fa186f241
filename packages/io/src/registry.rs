//! Registry of vector format drivers.
//!
//! Drivers are looked up by [`VectorFormat`] name or by file extension.
//! The default registry contains the `GeoJSON` and newline-delimited
//! `GeoJSON` drivers.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use geocomp_feature_models::FeatureCollection;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::geojson_file::{GeoJsonDriver, GeoJsonSeqDriver};
use crate::{IoError, ReadOptions};

/// A vector format handled by a registered driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum VectorFormat {
    /// RFC 7946 `GeoJSON` `FeatureCollection`.
    #[strum(serialize = "geojson")]
    GeoJson,
    /// RFC 8142 text sequence / newline-delimited `GeoJSON` features.
    #[strum(serialize = "geojsonseq")]
    GeoJsonSeq,
}

/// Reads and writes feature collections in one format.
pub trait VectorDriver: Send + Sync {
    /// Format handled by this driver.
    fn format(&self) -> VectorFormat;

    /// Lowercase file extensions (without the dot) this driver claims.
    fn extensions(&self) -> &'static [&'static str];

    /// Reads a collection. `label` names the input in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MalformedFile`] if the input is not valid for
    /// this format, or [`IoError::Io`] if reading fails.
    fn read(
        &self,
        input: &mut dyn Read,
        label: &str,
        options: &ReadOptions,
    ) -> Result<FeatureCollection, IoError>;

    /// Writes a collection.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`] if serialization or writing fails.
    fn write(&self, collection: &FeatureCollection, output: &mut dyn Write) -> Result<(), IoError>;
}

/// The set of drivers available for reading and writing.
pub struct FormatRegistry {
    drivers: Vec<Box<dyn VectorDriver>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self {
            drivers: vec![Box::new(GeoJsonDriver), Box::new(GeoJsonSeqDriver)],
        }
    }
}

impl FormatRegistry {
    /// Registered formats in registration order.
    #[must_use]
    pub fn formats(&self) -> Vec<VectorFormat> {
        self.drivers.iter().map(|d| d.format()).collect()
    }

    /// Parses a format name such as `"geojson"`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnsupportedFormat`] if no driver handles it.
    pub fn resolve_format(&self, name: &str) -> Result<VectorFormat, IoError> {
        name.parse::<VectorFormat>()
            .ok()
            .filter(|format| self.drivers.iter().any(|d| d.format() == *format))
            .ok_or_else(|| IoError::UnsupportedFormat {
                format: name.to_string(),
            })
    }

    /// Driver for `format`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnsupportedFormat`] if the format has no driver.
    pub fn driver(&self, format: VectorFormat) -> Result<&dyn VectorDriver, IoError> {
        self.drivers
            .iter()
            .find(|d| d.format() == format)
            .map(Box::as_ref)
            .ok_or_else(|| IoError::UnsupportedFormat {
                format: format.to_string(),
            })
    }

    /// Driver claiming the extension of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnsupportedFormat`] if the extension is missing
    /// or unclaimed.
    pub fn driver_for_path(&self, path: &Path) -> Result<&dyn VectorDriver, IoError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        self.drivers
            .iter()
            .find(|d| d.extensions().contains(&extension.as_str()))
            .map(Box::as_ref)
            .ok_or_else(|| IoError::UnsupportedFormat {
                format: if extension.is_empty() {
                    path.display().to_string()
                } else {
                    extension
                },
            })
    }

    /// Reads the collection stored at `path`, choosing the driver by
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`] if the format is unsupported, the file cannot be
    /// opened, or its content is malformed.
    pub fn read(&self, path: &Path, options: &ReadOptions) -> Result<FeatureCollection, IoError> {
        let driver = self.driver_for_path(path)?;
        let mut reader = BufReader::new(File::open(path)?);
        let collection = driver.read(&mut reader, &path.display().to_string(), options)?;

        log::info!(
            "Read {} features ({} columns, {}) from {}",
            collection.len(),
            collection.schema().len(),
            collection.crs(),
            path.display()
        );

        Ok(collection)
    }

    /// Writes `collection` to `path` in `format`, or in the format implied
    /// by the extension when `format` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`] if the format is unsupported or writing fails.
    pub fn write(
        &self,
        collection: &FeatureCollection,
        path: &Path,
        format: Option<VectorFormat>,
    ) -> Result<(), IoError> {
        let driver = match format {
            Some(format) => self.driver(format)?,
            None => self.driver_for_path(path)?,
        };

        let mut writer = BufWriter::new(File::create(path)?);
        driver.write(collection, &mut writer)?;
        writer.flush()?;

        log::info!(
            "Wrote {} features as {} to {}",
            collection.len(),
            driver.format(),
            path.display()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use geo::Point;
    use geocomp_feature_models::{Column, ColumnType, Crs, Feature, Schema};

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("geocomp_io_{}_{name}", std::process::id()))
    }

    #[test]
    fn lists_default_formats() {
        let registry = FormatRegistry::default();
        assert_eq!(
            registry.formats(),
            vec![VectorFormat::GeoJson, VectorFormat::GeoJsonSeq]
        );
    }

    #[test]
    fn resolves_format_names_and_extensions() {
        let registry = FormatRegistry::default();

        assert_eq!(
            registry.resolve_format("GeoJSON").unwrap(),
            VectorFormat::GeoJson
        );
        assert_eq!(
            registry
                .driver_for_path(Path::new("data/world.JSON"))
                .unwrap()
                .format(),
            VectorFormat::GeoJson
        );
        assert_eq!(
            registry
                .driver_for_path(Path::new("data/points.geojsonl"))
                .unwrap()
                .format(),
            VectorFormat::GeoJsonSeq
        );
    }

    #[test]
    fn unknown_formats_are_unsupported() {
        let registry = FormatRegistry::default();

        assert!(matches!(
            registry.resolve_format("gpkg"),
            Err(IoError::UnsupportedFormat { ref format }) if format == "gpkg"
        ));
        assert!(matches!(
            registry.driver_for_path(Path::new("world.gpkg")),
            Err(IoError::UnsupportedFormat { ref format }) if format == "gpkg"
        ));
        assert!(matches!(
            registry.driver_for_path(Path::new("world")),
            Err(IoError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn write_then_read_file() {
        let registry = FormatRegistry::default();
        let schema = Schema::new(vec![Column::new("name", ColumnType::Text)]).unwrap();
        let collection = FeatureCollection::new(
            schema,
            Crs::WGS84,
            vec![Feature::new("lon", vec!["London".into()], Point::new(-0.13, 51.5))],
        )
        .unwrap();

        let path = temp_path("cities.geojson");
        registry.write(&collection, &path, None).unwrap();
        let read = registry.read(&path, &ReadOptions::default()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(read, collection);
    }
}
