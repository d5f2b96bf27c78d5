use crate::config::BatchConfig;
use crate::error::{ClassdexError, Result};
use crate::index::{Index, Indexer};
use crate::model::NameTable;
use crate::parser::{ClassFileParser, ParsedClass};
use rayon::prelude::*;
use std::sync::Arc;

/// A class that could not be indexed, with the label its bytes came in with.
#[derive(Debug)]
pub struct BatchFailure {
    pub label: String,
    pub error: ClassdexError,
}

#[derive(Debug)]
pub struct BatchReport {
    pub index: Index,
    /// Classes parsed successfully, duplicates included.
    pub indexed: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Parses class files on a rayon pool against one shared [`NameTable`] and
/// feeds the results to a single [`Indexer`] in input order.
pub struct BatchIndexer {
    names: Arc<NameTable>,
    config: BatchConfig,
}

impl BatchIndexer {
    pub fn new(config: BatchConfig) -> Self {
        Self::with_names(Arc::new(NameTable::new()), config)
    }

    pub fn with_names(names: Arc<NameTable>, config: BatchConfig) -> Self {
        Self { names, config }
    }

    pub fn names(&self) -> &Arc<NameTable> {
        &self.names
    }

    /// Indexes `(label, bytes)` pairs. A failing class is reported and does
    /// not stop the batch, unless it has an unsupported version and
    /// `fail_fast_on_unsupported` is set.
    pub fn run<L, B>(&self, inputs: &[(L, B)]) -> Result<BatchReport>
    where
        L: AsRef<str> + Sync,
        B: AsRef<[u8]> + Sync,
    {
        let results = self.parse_all(inputs);

        let mut indexer = Indexer::new(Arc::clone(&self.names), self.config.parser.clone());
        let mut indexed = 0;
        let mut failures = Vec::new();
        for ((label, _), result) in inputs.iter().zip(results) {
            match result {
                Ok(parsed) => {
                    indexer.add_class(parsed.info);
                    indexed += 1;
                }
                Err(e) if e.is_unsupported_version() && self.config.fail_fast_on_unsupported => {
                    tracing::warn!("Aborting batch at {}: {}", label.as_ref(), e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Failed to index {}: {}", label.as_ref(), e);
                    failures.push(BatchFailure {
                        label: label.as_ref().to_string(),
                        error: e,
                    });
                }
            }
        }

        let index = indexer.complete();
        tracing::info!(
            "Indexed {} classes ({} failed, {} distinct)",
            indexed,
            failures.len(),
            index.class_count()
        );
        let stats = self.names.stats();
        tracing::debug!(
            "Name table: {} atoms, {} names, {} strings, {} byte buffers, {} types",
            stats.atoms,
            stats.names,
            stats.strings,
            stats.byte_buffers,
            stats.types
        );

        Ok(BatchReport {
            index,
            indexed,
            failures,
        })
    }

    fn parse_all<L, B>(&self, inputs: &[(L, B)]) -> Vec<Result<ParsedClass>>
    where
        L: Sync,
        B: AsRef<[u8]> + Sync,
    {
        let parse = || -> Vec<Result<ParsedClass>> {
            let parser = ClassFileParser::new(&self.names, &self.config.parser);
            inputs
                .par_iter()
                .map(|(_, bytes)| parser.parse(bytes.as_ref()))
                .collect()
        };

        match self.config.threads {
            Some(threads) => match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(parse),
                Err(e) => {
                    tracing::warn!(
                        "Failed to build a {}-thread pool, using the global pool: {}",
                        threads,
                        e
                    );
                    parse()
                }
            },
            None => parse(),
        }
    }
}
