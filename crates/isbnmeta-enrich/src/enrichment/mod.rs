pub mod pipeline;

pub use pipeline::{EnrichmentPipeline, EnrichmentReport, RowProblem};
