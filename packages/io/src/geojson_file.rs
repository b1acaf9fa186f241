//! `GeoJSON` and newline-delimited `GeoJSON` drivers.
//!
//! Identifiers are taken from each feature's `id` member, then from the
//! configured id property, then from the feature's 1-based position in
//! the file. The position fallback is applied once at read time; after
//! that the identifier travels with the feature.
//!
//! The attribute schema is inferred from the properties of all features.
//! The legacy `crs` member is honoured when present, otherwise data is
//! taken to be `EPSG:4326` as RFC 7946 requires.

use std::io::{BufRead, BufReader, Read, Write};

use geo::Geometry;
use geocomp_feature_models::{
    AttributeValue, Column, ColumnType, Crs, Feature, FeatureCollection, FeatureId, Schema,
};
use geojson::{GeoJson, JsonObject, JsonValue, feature::Id};

use crate::registry::{VectorDriver, VectorFormat};
use crate::{IoError, ReadOptions};

/// Driver for `GeoJSON` `FeatureCollection` documents.
pub struct GeoJsonDriver;

impl VectorDriver for GeoJsonDriver {
    fn format(&self) -> VectorFormat {
        VectorFormat::GeoJson
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["geojson", "json"]
    }

    fn read(
        &self,
        input: &mut dyn Read,
        label: &str,
        options: &ReadOptions,
    ) -> Result<FeatureCollection, IoError> {
        let mut text = String::new();
        input.read_to_string(&mut text)?;
        parse_feature_collection(&text, label, options)
    }

    fn write(&self, collection: &FeatureCollection, output: &mut dyn Write) -> Result<(), IoError> {
        let document = to_geojson(collection);
        serde_json::to_writer_pretty(&mut *output, &document)?;
        output.write_all(b"\n")?;
        Ok(())
    }
}

/// Driver for one `GeoJSON` feature per line (RFC 8142 record separators
/// are tolerated).
pub struct GeoJsonSeqDriver;

impl VectorDriver for GeoJsonSeqDriver {
    fn format(&self) -> VectorFormat {
        VectorFormat::GeoJsonSeq
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["geojsonl", "geojsons", "ndjson"]
    }

    fn read(
        &self,
        input: &mut dyn Read,
        label: &str,
        options: &ReadOptions,
    ) -> Result<FeatureCollection, IoError> {
        let mut features = Vec::new();

        for (line_no, line) in BufReader::new(input).lines().enumerate() {
            let line = line?;
            let record = line.trim().trim_start_matches('\u{1e}');
            if record.is_empty() {
                continue;
            }

            match record.parse::<GeoJson>() {
                Ok(GeoJson::Feature(feature)) => features.push(feature),
                Ok(_) => {
                    return Err(IoError::malformed(
                        label,
                        format!("line {}: expected a Feature", line_no + 1),
                    ));
                }
                Err(e) => {
                    return Err(IoError::malformed(label, format!("line {}: {e}", line_no + 1)));
                }
            }
        }

        build_collection(features, Crs::WGS84, label, options)
    }

    fn write(&self, collection: &FeatureCollection, output: &mut dyn Write) -> Result<(), IoError> {
        if collection.crs() != &Crs::WGS84 {
            log::warn!(
                "Writing {} coordinates to a GeoJSON sequence, which cannot record its CRS",
                collection.crs()
            );
        }

        for feature in collection {
            let feature = to_geojson_feature(collection.schema(), feature);
            serde_json::to_writer(&mut *output, &feature)?;
            output.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// Parses a `GeoJSON` `FeatureCollection` document.
///
/// # Errors
///
/// Returns [`IoError::MalformedFile`] if the text is not a
/// `FeatureCollection`, a feature has no geometry or identifier, or a
/// property holds values of incompatible kinds.
pub fn parse_feature_collection(
    text: &str,
    label: &str,
    options: &ReadOptions,
) -> Result<FeatureCollection, IoError> {
    let geojson: GeoJson = text.parse().map_err(|e| IoError::malformed(label, e))?;

    let GeoJson::FeatureCollection(fc) = geojson else {
        return Err(IoError::malformed(label, "expected a FeatureCollection"));
    };

    let crs = declared_crs(fc.foreign_members.as_ref()).unwrap_or(Crs::WGS84);
    build_collection(fc.features, crs, label, options)
}

/// Reads the legacy `{"crs": {"type": "name", "properties": {"name": ...}}}`
/// member.
fn declared_crs(foreign_members: Option<&JsonObject>) -> Option<Crs> {
    foreign_members?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(Crs::from)
}

/// The kind of values seen so far in a property column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Inferred {
    /// Only nulls so far.
    Unknown,
    Known(ColumnType),
}

impl Inferred {
    fn merge(self, value: &JsonValue) -> Result<Self, (ColumnType, ColumnType)> {
        let Some(seen) = json_kind(value) else {
            return Ok(self);
        };
        match self {
            Self::Unknown => Ok(Self::Known(seen)),
            Self::Known(current) if current == seen => Ok(self),
            Self::Known(ColumnType::Integer) if seen == ColumnType::Float => {
                Ok(Self::Known(ColumnType::Float))
            }
            Self::Known(ColumnType::Float) if seen == ColumnType::Integer => Ok(self),
            Self::Known(current) => Err((current, seen)),
        }
    }

    const fn column_type(self) -> ColumnType {
        match self {
            Self::Unknown => ColumnType::Text,
            Self::Known(ty) => ty,
        }
    }
}

fn json_kind(value: &JsonValue) -> Option<ColumnType> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(_) => Some(ColumnType::Boolean),
        JsonValue::Number(n) if n.is_i64() => Some(ColumnType::Integer),
        JsonValue::Number(_) => Some(ColumnType::Float),
        JsonValue::String(_) | JsonValue::Array(_) | JsonValue::Object(_) => {
            Some(ColumnType::Text)
        }
    }
}

fn id_from_json(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn convert_value(value: Option<&JsonValue>, column_type: ColumnType) -> AttributeValue {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return AttributeValue::Null;
    };

    match (column_type, value) {
        (ColumnType::Boolean, JsonValue::Bool(b)) => AttributeValue::Boolean(*b),
        (ColumnType::Integer, JsonValue::Number(n)) => n.as_i64().into(),
        (ColumnType::Float, JsonValue::Number(n)) => n.as_f64().into(),
        (ColumnType::Text, JsonValue::String(s)) => AttributeValue::Text(s.clone()),
        (ColumnType::Text, other) => AttributeValue::Text(other.to_string()),
        _ => AttributeValue::Null,
    }
}

/// Builds a collection from parsed features, inferring the schema.
fn build_collection(
    features: Vec<geojson::Feature>,
    crs: Crs,
    label: &str,
    options: &ReadOptions,
) -> Result<FeatureCollection, IoError> {
    let id_field = options.id_field.as_deref();

    let mut names: Vec<String> = Vec::new();
    let mut kinds: Vec<Inferred> = Vec::new();
    let mut parsed: Vec<(FeatureId, JsonObject, Geometry<f64>)> =
        Vec::with_capacity(features.len());

    for (index, feature) in features.into_iter().enumerate() {
        let position = index + 1;

        let geometry = feature.geometry.ok_or_else(|| {
            IoError::malformed(label, format!("feature {position} has no geometry"))
        })?;
        let geometry: Geometry<f64> = geometry
            .try_into()
            .map_err(|e| IoError::malformed(label, format!("feature {position}: {e}")))?;

        let properties = feature.properties.unwrap_or_default();

        let id = match (&feature.id, id_field) {
            (Some(Id::String(s)), _) => s.clone(),
            (Some(Id::Number(n)), _) => n.to_string(),
            (None, Some(field)) => properties.get(field).and_then(id_from_json).ok_or_else(|| {
                IoError::malformed(
                    label,
                    format!("feature {position} has no usable '{field}' identifier"),
                )
            })?,
            (None, None) => position.to_string(),
        };

        for (name, value) in &properties {
            if Some(name.as_str()) == id_field {
                continue;
            }
            let slot = names.iter().position(|n| n == name).unwrap_or_else(|| {
                names.push(name.clone());
                kinds.push(Inferred::Unknown);
                names.len() - 1
            });
            kinds[slot] = kinds[slot].merge(value).map_err(|(current, seen)| {
                IoError::malformed(
                    label,
                    format!("property '{name}' mixes {current} and {seen} values"),
                )
            })?;
        }

        parsed.push((FeatureId::new(id), properties, geometry));
    }

    let schema = Schema::new(
        names
            .iter()
            .zip(&kinds)
            .map(|(name, kind)| Column::new(name.clone(), kind.column_type()))
            .collect(),
    )?;

    let features = parsed
        .into_iter()
        .map(|(id, properties, geometry)| {
            let attributes = schema
                .columns()
                .iter()
                .map(|column| convert_value(properties.get(&column.name), column.column_type))
                .collect();
            Feature {
                id,
                attributes,
                geometry,
            }
        })
        .collect();

    Ok(FeatureCollection::new(schema, crs, features)?)
}

/// Non-finite floats have no JSON form and are written as null.
fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Boolean(b) => JsonValue::Bool(*b),
        AttributeValue::Integer(i) => JsonValue::from(*i),
        AttributeValue::Float(f) => {
            serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number)
        }
        AttributeValue::Text(s) => JsonValue::String(s.clone()),
    }
}

fn to_geojson_feature(schema: &Schema, feature: &Feature) -> geojson::Feature {
    let properties: JsonObject = schema
        .columns()
        .iter()
        .zip(&feature.attributes)
        .map(|(column, value)| (column.name.clone(), attribute_to_json(value)))
        .collect();

    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&feature.geometry))),
        id: Some(Id::String(feature.id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Converts a collection into a `GeoJSON` `FeatureCollection`, recording a
/// legacy `crs` member when the CRS is not `EPSG:4326`.
///
/// Every schema column is written on every feature, with explicit nulls,
/// so columns holding only nulls survive a round trip (read back as
/// text). An undefined CRS cannot be recorded and reads back as
/// `EPSG:4326`; a warning is logged.
#[must_use]
pub fn to_geojson(collection: &FeatureCollection) -> geojson::FeatureCollection {
    let features = collection
        .iter()
        .map(|feature| to_geojson_feature(collection.schema(), feature))
        .collect();

    let foreign_members = match collection.crs() {
        Crs::Undefined => {
            log::warn!(
                "Writing {} features without a CRS; GeoJSON readers will assume EPSG:4326",
                collection.len()
            );
            None
        }
        crs if crs == &Crs::WGS84 => None,
        crs => {
            let name = crs
                .epsg()
                .map_or_else(|| crs.to_string(), |code| format!("urn:ogc:def:crs:EPSG::{code}"));
            let mut members = JsonObject::new();
            members.insert(
                "crs".to_string(),
                serde_json::json!({ "type": "name", "properties": { "name": name } }),
            );
            Some(members)
        }
    };

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    }
}
