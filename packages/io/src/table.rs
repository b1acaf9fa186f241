//! Delimited-text attribute tables.
//!
//! Column types are inferred from every non-empty cell: a column is
//! `boolean` if all cells are `true`/`false`, `integer` if all parse as
//! integers, `float` if all parse as numbers, and `text` otherwise.
//! Empty cells are nulls. Codes such as `"01"` lose their leading zero
//! when inferred as integers, so such columns can be forced to text.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use geocomp_feature_models::{AttributeTable, AttributeValue, Column, ColumnType, Schema};

use crate::IoError;

/// Options controlling how attribute tables are read.
#[derive(Debug, Clone)]
pub struct TableOptions {
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Columns always read as text, bypassing inference.
    pub text_columns: Vec<String>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            text_columns: Vec::new(),
        }
    }
}

/// Reads the attribute table stored at `path`.
///
/// # Errors
///
/// Returns [`IoError`] if the file cannot be opened or is malformed.
pub fn read_attribute_table(
    path: &Path,
    options: &TableOptions,
) -> Result<AttributeTable, IoError> {
    let file = File::open(path)?;
    let table = parse_attribute_table(file, &path.display().to_string(), options)?;

    log::info!(
        "Read attribute table with {} rows and {} columns from {}",
        table.len(),
        table.schema().len(),
        path.display()
    );

    Ok(table)
}

/// Parses an attribute table with a header row from `reader`.
///
/// # Errors
///
/// Returns [`IoError::MalformedFile`] for rows with the wrong number of
/// fields, and [`IoError::Collection`] for duplicate header names.
pub fn parse_attribute_table(
    reader: impl Read,
    label: &str,
    options: &TableOptions,
) -> Result<AttributeTable, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| IoError::malformed(label, format!("record {}: {e}", index + 1)))?;
        raw_rows.push(record.iter().map(|cell| cell.trim().to_string()).collect());
    }

    let column_types: Vec<ColumnType> = (0..headers.len())
        .map(|i| {
            if options.text_columns.iter().any(|c| c == &headers[i]) {
                ColumnType::Text
            } else {
                infer_column(raw_rows.iter().map(|row| row[i].as_str()))
            }
        })
        .collect();

    let schema = Schema::new(
        headers
            .iter()
            .zip(&column_types)
            .map(|(name, ty)| Column::new(name.clone(), *ty))
            .collect(),
    )?;

    let rows = raw_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&column_types)
                .map(|(cell, ty)| parse_cell(cell, *ty))
                .collect()
        })
        .collect();

    Ok(AttributeTable::new(schema, rows)?)
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn infer_column<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnType {
    let mut boolean = true;
    let mut integer = true;
    let mut float = true;
    let mut any = false;

    for cell in cells.filter(|c| !c.is_empty()) {
        any = true;
        boolean &= parse_bool(cell).is_some();
        integer &= cell.parse::<i64>().is_ok();
        float &= cell.parse::<f64>().is_ok();
    }

    match (any, boolean, integer, float) {
        (false, ..) => ColumnType::Text,
        (true, true, _, _) => ColumnType::Boolean,
        (true, false, true, _) => ColumnType::Integer,
        (true, false, false, true) => ColumnType::Float,
        _ => ColumnType::Text,
    }
}

fn parse_cell(cell: String, column_type: ColumnType) -> AttributeValue {
    if cell.is_empty() {
        return AttributeValue::Null;
    }
    match column_type {
        ColumnType::Boolean => parse_bool(&cell).into(),
        ColumnType::Integer => cell.parse::<i64>().ok().into(),
        ColumnType::Float => cell.parse::<f64>().ok().into(),
        ColumnType::Text => AttributeValue::Text(cell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDICATORS: &str = "\
iso_a2,region_code,pop,gdp_per_cap,landlocked,notes
FR,01,67000000,40493.9,false,
GB,02,66900000,,false,island
AT,03,,53267.1,TRUE,
";

    #[test]
    fn infers_column_types() {
        let table =
            parse_attribute_table(INDICATORS.as_bytes(), "wb", &TableOptions::default()).unwrap();
        let types: Vec<ColumnType> = table
            .schema()
            .columns()
            .iter()
            .map(|c| c.column_type)
            .collect();

        assert_eq!(
            types,
            vec![
                ColumnType::Text,
                ColumnType::Integer,
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::Boolean,
                ColumnType::Text,
            ]
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[1][3], AttributeValue::Null);
        assert_eq!(table.rows()[2][4], AttributeValue::Boolean(true));
        assert_eq!(table.rows()[0][5], AttributeValue::Null);
    }

    #[test]
    fn text_columns_keep_leading_zeros() {
        let options = TableOptions {
            text_columns: vec!["region_code".to_string()],
            ..TableOptions::default()
        };
        let table = parse_attribute_table(INDICATORS.as_bytes(), "wb", &options).unwrap();

        assert_eq!(table.rows()[0][1], AttributeValue::Text("01".to_string()));
    }

    #[test]
    fn custom_delimiter() {
        let options = TableOptions {
            delimiter: b';',
            ..TableOptions::default()
        };
        let table = parse_attribute_table("code;value\nA;1.5\n".as_bytes(), "t", &options).unwrap();

        assert_eq!(table.rows()[0][1], AttributeValue::Float(1.5));
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let ragged = "a,b\n1,2\n3\n".as_bytes();
        let err = parse_attribute_table(ragged, "ragged", &TableOptions::default()).unwrap_err();
        assert!(matches!(err, IoError::MalformedFile { ref path, .. } if path == "ragged"));
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let err = parse_attribute_table("a,a\n1,2\n".as_bytes(), "dup", &TableOptions::default())
            .unwrap_err();
        assert!(matches!(err, IoError::Collection(_)));
    }
}
