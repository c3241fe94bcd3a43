use std::path::Path;

use async_trait::async_trait;
use isbnmeta_core::{Column, CoreError, SourceId, Table};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::identifiers::normalize_key;
use crate::sources::{MetadataProvider, ProviderResult};

/// A catalog CSV on disk used as a provider. Loaded once when opened.
///
/// Rows are matched on `product_isbn`; every non-empty cell of the first
/// matching row becomes a string value keyed by its header.
pub struct LocalCsvSource {
    table: Table,
}

impl LocalCsvSource {
    pub fn open(path: &Path) -> Result<Self> {
        let table = Table::read_csv(path)?;
        Self::from_table(path, table)
    }

    pub fn from_table(path: &Path, table: Table) -> Result<Self> {
        if !table.has_column(Column::ISBN_HEADER) {
            return Err(CoreError::ColumnNotFound(Column::ISBN_HEADER.to_string()).into());
        }
        tracing::debug!(path = %path.display(), rows = table.rows.len(), "loaded local CSV source");
        Ok(Self { table })
    }
}

#[async_trait]
impl MetadataProvider for LocalCsvSource {
    fn id(&self) -> SourceId {
        SourceId::LocalCsv
    }

    async fn lookup(&self, isbn: &str) -> Result<Option<ProviderResult>> {
        let row = self
            .table
            .rows
            .iter()
            .find(|row| row.isbn().is_some_and(|cell| normalize_key(cell) == isbn));

        Ok(row.map(|row| {
            row.columns()
                .filter_map(|column| {
                    row.non_empty(column)
                        .map(|value| (column.to_string(), Value::String(value.to_string())))
                })
                .collect::<Map<_, _>>()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CATALOG: &str = "product_isbn,product_title,publisher,weight\n\
                           978-0-7112-4681-2,The Book of Trees,Princeton Architectural Press,\n\
                           9780306406157,,Plenum,1.2 Pounds\n";

    #[tokio::test]
    async fn finds_row_by_normalized_isbn() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.csv");
        std::fs::write(&path, CATALOG).unwrap();

        let source = LocalCsvSource::open(&path).unwrap();
        let record = source.lookup("9780711246812").await.unwrap().unwrap();
        assert_eq!(record["product_title"], "The Book of Trees");
        assert!(!record.contains_key("weight"));

        let record = source.lookup("9780306406157").await.unwrap().unwrap();
        assert!(!record.contains_key("product_title"));
        assert_eq!(record["weight"], "1.2 Pounds");
    }

    #[tokio::test]
    async fn unknown_isbn_is_no_data() {
        let table = Table::from_reader(CATALOG.as_bytes()).unwrap();
        let source = LocalCsvSource::from_table(Path::new("mem.csv"), table).unwrap();
        assert!(source.lookup("97843776156O1").await.unwrap().is_none());
    }

    #[test]
    fn requires_isbn_column() {
        let table = Table::from_reader("sku,title\nA-1,x\n".as_bytes()).unwrap();
        assert!(LocalCsvSource::from_table(Path::new("mem.csv"), table).is_err());
    }
}
