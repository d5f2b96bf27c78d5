pub mod config;
pub mod error;
pub mod logging;

pub mod index;
pub mod ingest;
pub mod model;
pub mod parser;

pub use config::{BatchConfig, ParserConfig};
pub use error::{ClassFileError, ClassdexError, IndexError, Malformed, Result};
pub use index::{Index, Indexer};
pub use ingest::{BatchFailure, BatchIndexer, BatchReport};
pub use model::names::{NameTable, NameTableStats};
pub use parser::{ClassFileParser, ParsedClass};
