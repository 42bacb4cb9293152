pub mod aggregate;
pub mod dataset;
pub mod query;
pub mod render;

pub use dataset::Dataset;
pub use query::AnalysisOptions;
