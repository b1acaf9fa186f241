//! Attribute values, column types and schemas.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::CollectionError;

/// The declared type of an attribute column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ColumnType {
    /// `true` / `false`.
    Boolean,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// UTF-8 text, including categorical codes.
    Text,
}

/// A single scalar attribute value. `Null` is valid in any column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Missing value.
    #[default]
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl AttributeValue {
    /// Returns the column type this value belongs to, or `None` for `Null`.
    #[must_use]
    pub const fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(ColumnType::Boolean),
            Self::Integer(_) => Some(ColumnType::Integer),
            Self::Float(_) => Some(ColumnType::Float),
            Self::Text(_) => Some(ColumnType::Text),
        }
    }

    /// Whether this value may be stored in a column of type `column_type`.
    #[must_use]
    pub fn conforms_to(&self, column_type: ColumnType) -> bool {
        self.column_type().is_none_or(|t| t == column_type)
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text content for `Text` values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A named, typed attribute column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within a schema.
    pub name: String,
    /// Declared value type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// An ordered list of uniquely named columns shared by every row of a
/// collection or table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Column>", into = "Vec<Column>")]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Builds a schema from columns in order.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateColumn`] if two columns share a
    /// name.
    pub fn new(columns: Vec<Column>) -> Result<Self, CollectionError> {
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(CollectionError::DuplicateColumn {
                    name: column.name.clone(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// A schema with no columns.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterates over column names in schema order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Position of the named column.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Whether `other` has the same column names with the same types,
    /// ignoring order.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.alignment(other).is_some()
    }

    /// For each column of `self`, the position of the same column in
    /// `other`. Returns `None` unless both schemas hold the same column set
    /// with matching types.
    #[must_use]
    pub fn alignment(&self, other: &Self) -> Option<Vec<usize>> {
        if self.len() != other.len() {
            return None;
        }
        self.columns
            .iter()
            .map(|column| {
                other
                    .position(&column.name)
                    .filter(|&i| other.columns[i].column_type == column.column_type)
            })
            .collect()
    }

    /// Appends `extra` after the existing columns.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateColumn`] if any name collides.
    pub fn extended(
        &self,
        extra: impl IntoIterator<Item = Column>,
    ) -> Result<Self, CollectionError> {
        let mut columns = self.columns.clone();
        columns.extend(extra);
        Self::new(columns)
    }

    /// Checks that `row` has one conforming value per column.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::RowWidth`] or
    /// [`CollectionError::TypeMismatch`] naming `label`.
    pub fn validate_row(&self, label: &str, row: &[AttributeValue]) -> Result<(), CollectionError> {
        if row.len() != self.columns.len() {
            return Err(CollectionError::RowWidth {
                row: label.to_string(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }

        for (column, value) in self.columns.iter().zip(row) {
            if let Some(found) = value.column_type()
                && found != column.column_type
            {
                return Err(CollectionError::TypeMismatch {
                    row: label.to_string(),
                    column: column.name.clone(),
                    expected: column.column_type,
                    found,
                });
            }
        }

        Ok(())
    }
}

impl TryFrom<Vec<Column>> for Schema {
    type Error = CollectionError;

    fn try_from(columns: Vec<Column>) -> Result<Self, Self::Error> {
        Self::new(columns)
    }
}

impl From<Schema> for Vec<Column> {
    fn from(schema: Schema) -> Self {
        schema.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(columns: &[(&str, ColumnType)]) -> Schema {
        Schema::new(
            columns
                .iter()
                .map(|(name, ty)| Column::new(*name, *ty))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = Schema::new(vec![
            Column::new("name", ColumnType::Text),
            Column::new("name", ColumnType::Integer),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            CollectionError::DuplicateColumn {
                name: "name".to_string()
            }
        );
    }

    #[test]
    fn null_conforms_to_every_type() {
        for ty in [
            ColumnType::Boolean,
            ColumnType::Integer,
            ColumnType::Float,
            ColumnType::Text,
        ] {
            assert!(AttributeValue::Null.conforms_to(ty));
        }
        assert!(!AttributeValue::Integer(1).conforms_to(ColumnType::Float));
    }

    #[test]
    fn alignment_ignores_order_but_not_types() {
        let a = schema(&[("pop", ColumnType::Integer), ("name", ColumnType::Text)]);
        let b = schema(&[("name", ColumnType::Text), ("pop", ColumnType::Integer)]);
        let c = schema(&[("name", ColumnType::Text), ("pop", ColumnType::Float)]);

        assert_eq!(a.alignment(&b), Some(vec![1, 0]));
        assert!(a.is_compatible(&b));
        assert!(!a.is_compatible(&c));
        assert!(!a.is_compatible(&schema(&[("pop", ColumnType::Integer)])));
    }

    #[test]
    fn validate_row_reports_width_and_type() {
        let s = schema(&[("pop", ColumnType::Integer)]);

        assert!(s.validate_row("a", &[AttributeValue::Integer(3)]).is_ok());
        assert!(s.validate_row("a", &[AttributeValue::Null]).is_ok());
        assert!(matches!(
            s.validate_row("a", &[]),
            Err(CollectionError::RowWidth {
                expected: 1,
                found: 0,
                ..
            })
        ));
        assert!(matches!(
            s.validate_row("a", &["x".into()]),
            Err(CollectionError::TypeMismatch {
                expected: ColumnType::Integer,
                found: ColumnType::Text,
                ..
            })
        ));
    }

    #[test]
    fn column_type_parses_case_insensitively() {
        assert_eq!("Integer".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!(ColumnType::Text.to_string(), "text");
    }
}
