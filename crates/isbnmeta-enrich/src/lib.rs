pub mod aggregate;
pub mod cache;
pub mod choose;
pub mod enrichment;
pub mod error;
pub mod extract;
pub mod http;
pub mod identifiers;
pub mod metric;
pub mod sources;

pub use aggregate::{AggregatedMetadata, Aggregator};
pub use cache::{CachePolicy, CacheStats, MetadataCache};
pub use choose::{choose, similarity};
pub use enrichment::{EnrichmentPipeline, EnrichmentReport, RowProblem};
pub use error::{EnrichError, Result};
pub use extract::{FieldCandidates, FieldExtractor, labelled};
pub use http::HttpClient;
pub use identifiers::{Isbn, generate_bogus, generate_isbn13, is_isbn13_shaped, normalize_key};
pub use sources::{MetadataProvider, ProviderResult, build_providers};
