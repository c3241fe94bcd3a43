use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use isbnmeta_core::{AppConfig, Column, ColumnKind, Field, Table};
use serde::Serialize;

use crate::aggregate::{AggregatedMetadata, Aggregator};
use crate::cache::CachePolicy;
use crate::choose::choose;
use crate::error::{EnrichError, Result};
use crate::extract::{FieldCandidates, FieldExtractor};
use crate::http::HttpClient;
use crate::identifiers::{is_isbn13_shaped, normalize_key};
use crate::sources::build_providers;

const DEFAULT_ROW_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowProblem {
    /// Zero-based data row index.
    pub row: usize,
    pub isbn: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrichmentReport {
    pub rows_processed: usize,
    pub rows_skipped: usize,
    pub cells_filled: usize,
    pub columns_added: Vec<String>,
    pub sources_used: Vec<String>,
    pub problems: Vec<RowProblem>,
}

impl EnrichmentReport {
    fn add_source(&mut self, source: impl Into<String>) {
        push_unique(&mut self.sources_used, source.into());
    }

    fn add_problem(&mut self, row: usize, isbn: Option<&str>, message: impl Into<String>) {
        self.rows_skipped += 1;
        self.problems.push(RowProblem {
            row,
            isbn: isbn.map(str::to_string),
            message: message.into(),
        });
    }
}

/// Cells resolved for one row: `(header, chosen value)` per lookup column.
type RowValues = Vec<(&'static str, String)>;

/// Fills catalog tables from the configured providers.
pub struct EnrichmentPipeline {
    aggregator: Aggregator,
    extractor: FieldExtractor,
    row_concurrency: usize,
}

impl EnrichmentPipeline {
    pub fn new(aggregator: Aggregator, extractor: FieldExtractor) -> Self {
        Self {
            aggregator,
            extractor,
            row_concurrency: DEFAULT_ROW_CONCURRENCY,
        }
    }

    /// Validate `config` and build the providers, cache and HTTP session it names.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let enrichment = &config.enrichment;
        let http = HttpClient::from_config(enrichment)?;
        let providers = build_providers(config, &http)?;

        let aggregator = Aggregator::new(providers)
            .with_concurrency(enrichment.concurrency)
            .with_error_policy(enrichment.on_source_error)
            .with_cache_policy(CachePolicy::from(&enrichment.cache));

        Ok(Self::new(aggregator, FieldExtractor::new(config.open_library.clone()))
            .with_row_concurrency(enrichment.row_concurrency))
    }

    pub fn with_row_concurrency(mut self, row_concurrency: usize) -> Self {
        self.row_concurrency = row_concurrency.max(1);
        self
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Aggregated provider records for one ISBN.
    pub async fn lookup(&self, isbn: &str) -> Result<Arc<AggregatedMetadata>> {
        self.aggregator.metadata(&normalize_key(isbn)).await
    }

    /// Every source's value for `field`, before reconciliation.
    pub async fn candidates(&self, field: Field, isbn: &str) -> Result<FieldCandidates> {
        let isbn = normalize_key(isbn);
        let metadata = self.aggregator.metadata(&isbn).await?;
        Ok(self.extractor.extract(field, &isbn, &metadata))
    }

    /// The reconciled value of `field` for one ISBN.
    pub async fn field(&self, field: Field, isbn: &str) -> Result<Option<String>> {
        Ok(choose(&self.candidates(field, isbn).await?))
    }

    /// Add every recognized column the table lacks, empty. Returns the added headers.
    pub fn ensure_columns(table: &mut Table) -> Vec<String> {
        table.ensure_recognized_columns()
    }

    /// Populate every recognized column of every row with a valid ISBN.
    ///
    /// Rows with a blank or malformed ISBN are left untouched and listed in
    /// the report. A lookup error fails the whole run.
    pub async fn enrich(&self, table: &mut Table) -> Result<EnrichmentReport> {
        let mut report = EnrichmentReport {
            columns_added: Self::ensure_columns(table),
            ..Default::default()
        };

        let lookups = table
            .recognized_columns()
            .into_iter()
            .filter_map(|column| match column.kind() {
                ColumnKind::Lookup(field) => Some((column, field)),
                ColumnKind::Identity => None,
            })
            .collect::<Vec<_>>();

        let mut jobs = Vec::new();
        for (row, record) in table.rows.iter().enumerate() {
            match record.isbn().map(normalize_key) {
                Some(key) if is_isbn13_shaped(&key) => jobs.push((row, key)),
                Some(key) => {
                    tracing::warn!(row, isbn = %key, "not an ISBN-13, row skipped");
                    report.add_problem(row, Some(key.as_str()), "not an ISBN-13");
                }
                None => {
                    tracing::warn!(row, "empty ISBN, row skipped");
                    report.add_problem(row, None, "empty ISBN");
                }
            }
        }

        tracing::info!(
            rows = jobs.len(),
            columns = lookups.len(),
            concurrency = self.row_concurrency,
            "enriching table"
        );

        let lookups = &lookups;
        let resolved = stream::iter(jobs)
            .map(|(row, isbn)| async move {
                let metadata = self.aggregator.metadata(&isbn).await?;
                Ok::<_, EnrichError>((row, self.resolve_row(&isbn, &metadata, lookups)))
            })
            .buffered(self.row_concurrency)
            .try_collect::<Vec<_>>()
            .await?;

        for (row, (values, sources)) in resolved {
            let Some(record) = table.rows.get_mut(row) else {
                continue;
            };
            for (header, value) in values {
                if !value.is_empty() {
                    report.cells_filled += 1;
                }
                record.set(header, value);
            }
            for source in sources {
                report.add_source(source);
            }
            report.rows_processed += 1;
        }

        tracing::info!(
            rows = report.rows_processed,
            skipped = report.rows_skipped,
            cells = report.cells_filled,
            "table enriched"
        );
        Ok(report)
    }

    fn resolve_row(
        &self,
        isbn: &str,
        metadata: &AggregatedMetadata,
        lookups: &[(Column, Field)],
    ) -> (RowValues, Vec<String>) {
        let mut sources = Vec::new();
        let values = lookups
            .iter()
            .map(|(column, field)| {
                let candidates = self.extractor.extract(*field, isbn, metadata);
                for source in candidates.keys() {
                    push_unique(&mut sources, source.to_string());
                }
                let chosen = choose(&candidates).unwrap_or_default();
                tracing::trace!(isbn, field = %field, candidates = candidates.len(), "reconciled");
                (column.header(), chosen)
            })
            .collect();
        (values, sources)
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.iter().any(|existing| existing == &value) {
        values.push(value);
    }
}
