use std::io::{Read, Write};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::Column;

/// One row of a catalog table, keyed by header. Empty cells are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: IndexMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// The cell value, or `None` when missing or blank.
    pub fn non_empty(&self, column: &str) -> Option<&str> {
        self.get(column).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    pub fn isbn(&self) -> Option<&str> {
        self.non_empty(Column::ISBN_HEADER)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn ensure(&mut self, column: &str) {
        if !self.values.contains_key(column) {
            self.values.insert(column.to_string(), String::new());
        }
    }
}

/// An in-memory catalog table read from and written back to CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Record>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Add every column in `columns` that the table lacks, initialized empty.
    ///
    /// Returns the headers that were added.
    pub fn ensure_columns<'a, I>(&mut self, columns: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut added = Vec::new();
        for column in columns {
            if self.has_column(column) {
                continue;
            }
            self.headers.push(column.to_string());
            for row in &mut self.rows {
                row.ensure(column);
            }
            added.push(column.to_string());
        }
        added
    }

    /// Add every recognized catalog column the table lacks.
    pub fn ensure_recognized_columns(&mut self) -> Vec<String> {
        self.ensure_columns(Column::headers())
    }

    /// Recognized columns present in this table, in header order.
    pub fn recognized_columns(&self) -> Vec<Column> {
        self.headers
            .iter()
            .filter_map(|h| Column::from_header(h))
            .collect()
    }

    /// Parse a table from CSV. Rows shorter than the header are padded with
    /// empty cells; longer rows are rejected.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut table = Self::new(headers);
        for row in rdr.records() {
            let row = row?;
            if row.len() > table.headers.len() {
                return Err(CoreError::RaggedRow {
                    line: row.position().map_or(0, |pos| pos.line()),
                    expected: table.headers.len(),
                    found: row.len(),
                });
            }
            let mut record = Record::new();
            for (idx, header) in table.headers.iter().enumerate() {
                record.set(header.clone(), row.get(idx).unwrap_or_default());
            }
            table.rows.push(record);
        }
        Ok(table)
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file)?;
        tracing::debug!(path = %path.display(), rows = table.rows.len(), "read table");
        Ok(table)
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(self.headers.iter().map(|h| row.get(h).unwrap_or_default()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.to_writer(file)?;
        tracing::debug!(path = %path.display(), rows = self.rows.len(), "wrote table");
        Ok(())
    }
}
