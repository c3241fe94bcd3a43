use std::path::{Path, PathBuf};

use async_trait::async_trait;
use isbnmeta_core::SourceId;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::{Map, Number, Value};

use crate::error::{EnrichError, Result};
use crate::identifiers::is_isbn13_shaped;
use crate::sources::{MetadataProvider, ProviderResult};

const LOOKUP_SQL: &str = "SELECT * FROM product WHERE CAST(product_isbn AS TEXT) = ?1 LIMIT 1";

/// A catalog database used as a provider: the `product` table, one row per ISBN.
///
/// The database is opened read-only for each lookup on the blocking pool.
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

fn lookup_blocking(path: &Path, isbn: &str) -> Result<Option<ProviderResult>> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let mut stmt = conn.prepare(LOOKUP_SQL)?;
    let names = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();

    let row = stmt
        .query_row([isbn], |row| {
            let mut map = Map::new();
            for (idx, name) in names.iter().enumerate() {
                if let Some(value) = json_value(row.get_ref(idx)?) {
                    map.insert(name.clone(), value);
                }
            }
            Ok(map)
        })
        .optional()?;
    Ok(row)
}

/// NULLs and blobs are dropped; empty text counts as missing.
fn json_value(value: ValueRef<'_>) -> Option<Value> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(i) => Some(Value::Number(i.into())),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            let text = text.trim();
            (!text.is_empty()).then(|| Value::String(text.to_string()))
        }
    }
}

#[async_trait]
impl MetadataProvider for SqliteSource {
    fn id(&self) -> SourceId {
        SourceId::Sqlite
    }

    async fn lookup(&self, isbn: &str) -> Result<Option<ProviderResult>> {
        if !is_isbn13_shaped(isbn) {
            return Ok(None);
        }
        let path = self.path.clone();
        let isbn = isbn.to_string();
        tokio::task::spawn_blocking(move || lookup_blocking(&path, &isbn))
            .await
            .map_err(|e| EnrichError::Task(e.to_string()))?
    }
}
