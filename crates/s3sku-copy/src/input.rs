//! Tabular input: a CSV file read into rows keyed by column name.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use csv::ReaderBuilder;

use crate::error::{Error, Result};

/// One input row, mapping column name to raw cell value
pub type Row = HashMap<String, String>;

/// Header names plus rows of a CSV file
#[derive(Debug, Clone, Default)]
pub struct InputTable {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl InputTable {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// Read a CSV file with a header row.
    ///
    /// Short rows are allowed; missing cells are simply absent from the row map.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::config(
                "csv_path",
                format!("CSV file not found: {}", path.display()),
            ));
        }
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: Row = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.clone(), v.to_string()))
                .collect();
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Values of one column, row by row; `None` where a row has no cell for it.
    pub fn column_values<'a>(
        &'a self,
        column: &'a str,
    ) -> Result<impl Iterator<Item = Option<&'a str>> + 'a> {
        if !self.headers.iter().any(|h| h == column) {
            return Err(Error::Config {
                message: format!(
                    "column \"{}\" not found; available columns: {}",
                    column,
                    self.headers.join(", ")
                ),
                key: Some(column.to_string()),
            });
        }
        Ok(self
            .rows
            .iter()
            .map(move |row| row.get(column).map(String::as_str)))
    }
}
