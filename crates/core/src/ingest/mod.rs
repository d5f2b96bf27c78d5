//! Parallel ingestion of many class files into one index.

mod batch;

pub use batch::{BatchFailure, BatchIndexer, BatchReport};
