//! Left joins of feature collections with attribute tables.

use std::collections::BTreeMap;
use std::fmt;

use geocomp_feature_models::{
    AttributeTable, AttributeValue, Column, ColumnType, Feature, FeatureCollection,
};

use crate::{JoinSide, WorkflowError};

/// A key value that can be matched exactly. Nulls and floats never are.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum JoinKey {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl JoinKey {
    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::Boolean(b) => Some(Self::Boolean(*b)),
            AttributeValue::Integer(i) => Some(Self::Integer(*i)),
            AttributeValue::Text(s) => Some(Self::Text(s.clone())),
            AttributeValue::Null | AttributeValue::Float(_) => None,
        }
    }
}

impl fmt::Display for JoinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "'{s}'"),
        }
    }
}

/// Left-joins `table` onto `collection` on the column `key`.
///
/// Every feature is kept exactly once, in order. Matching table rows
/// contribute their non-key columns, appended in table order; features
/// without a match get nulls. Null keys never match.
///
/// # Errors
///
/// * [`WorkflowError::MissingJoinKey`] if either side lacks `key`.
/// * [`WorkflowError::JoinKeyTypeMismatch`] if the key types differ.
/// * [`WorkflowError::UnsupportedJoinKeyType`] for float keys.
/// * [`WorkflowError::SchemaConflict`] if a non-key table column already
///   exists in the collection.
/// * [`WorkflowError::DuplicateJoinKey`] if a key value repeats in the
///   table.
pub fn attribute_join(
    collection: FeatureCollection,
    table: &AttributeTable,
    key: &str,
) -> Result<FeatureCollection, WorkflowError> {
    let position = collection
        .schema()
        .position(key)
        .ok_or_else(|| WorkflowError::MissingJoinKey {
            key: key.to_string(),
            side: JoinSide::Collection,
        })?;
    let collection_type = collection.schema().columns()[position].column_type;

    let table_type = table_key_type(table, key)?;
    if collection_type != table_type {
        return Err(WorkflowError::JoinKeyTypeMismatch {
            key: key.to_string(),
            collection: collection_type,
            table: table_type,
        });
    }

    left_join(collection, table, key, |feature| {
        feature.attributes.get(position).and_then(JoinKey::from_value)
    })
}

/// Left-joins `table` onto `collection`, matching feature identifiers
/// against the text column `table_key`.
///
/// # Errors
///
/// As [`attribute_join`], with the identifier treated as a text column.
pub fn attribute_join_on_id(
    collection: FeatureCollection,
    table: &AttributeTable,
    table_key: &str,
) -> Result<FeatureCollection, WorkflowError> {
    let table_type = table_key_type(table, table_key)?;
    if table_type != ColumnType::Text {
        return Err(WorkflowError::JoinKeyTypeMismatch {
            key: table_key.to_string(),
            collection: ColumnType::Text,
            table: table_type,
        });
    }

    left_join(collection, table, table_key, |feature| {
        Some(JoinKey::Text(feature.id.as_str().to_string()))
    })
}

fn table_key_type(table: &AttributeTable, key: &str) -> Result<ColumnType, WorkflowError> {
    let column_type = table
        .schema()
        .column(key)
        .map(|c| c.column_type)
        .ok_or_else(|| WorkflowError::MissingJoinKey {
            key: key.to_string(),
            side: JoinSide::Table,
        })?;

    if column_type == ColumnType::Float {
        return Err(WorkflowError::UnsupportedJoinKeyType {
            key: key.to_string(),
            column_type,
        });
    }

    Ok(column_type)
}

fn left_join(
    collection: FeatureCollection,
    table: &AttributeTable,
    key: &str,
    feature_key: impl Fn(&Feature) -> Option<JoinKey>,
) -> Result<FeatureCollection, WorkflowError> {
    let appended: Vec<(usize, &Column)> = table
        .schema()
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, column)| column.name != key)
        .collect();

    let conflicts: Vec<String> = appended
        .iter()
        .filter(|(_, column)| collection.schema().contains(&column.name))
        .map(|(_, column)| column.name.clone())
        .collect();
    if !conflicts.is_empty() {
        return Err(WorkflowError::SchemaConflict { columns: conflicts });
    }

    let key_position = table.schema().position(key).ok_or_else(|| WorkflowError::MissingJoinKey {
        key: key.to_string(),
        side: JoinSide::Table,
    })?;

    let mut index: BTreeMap<JoinKey, usize> = BTreeMap::new();
    for (row_index, row) in table.rows().iter().enumerate() {
        let Some(value) = row.get(key_position).and_then(JoinKey::from_value) else {
            continue;
        };
        if index.contains_key(&value) {
            return Err(WorkflowError::DuplicateJoinKey {
                value: value.to_string(),
            });
        }
        index.insert(value, row_index);
    }

    let schema = collection
        .schema()
        .extended(appended.iter().map(|(_, column)| (*column).clone()))?;

    let matches: Vec<Option<usize>> = collection
        .iter()
        .map(|feature| feature_key(feature).and_then(|k| index.get(&k).copied()))
        .collect();
    let matched = matches.iter().flatten().count();

    let (_, crs, features) = collection.into_parts();
    let features: Vec<Feature> = features
        .into_iter()
        .zip(matches)
        .map(|(mut feature, row)| {
            let row = row.map(|i| &table.rows()[i]);
            feature.attributes.extend(appended.iter().map(|(position, _)| {
                row.and_then(|r| r.get(*position)).cloned().unwrap_or_default()
            }));
            feature
        })
        .collect();

    if matched == 0 && !features.is_empty() {
        log::warn!("Join on '{key}' matched none of {} features", features.len());
    } else {
        log::debug!(
            "Joined {} columns on '{key}': {matched} of {} features matched",
            appended.len(),
            features.len()
        );
    }

    Ok(FeatureCollection::new(schema, crs, features)?)
}
