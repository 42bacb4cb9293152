pub mod correlate;
pub mod detect;
pub mod extract;
pub mod pipeline;

pub use pipeline::{ParsedBatch, run_batch};
