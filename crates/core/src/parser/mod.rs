mod annotations;
mod class_file;
mod constant_pool;
mod descriptor;
mod module;
mod reader;
mod signature;
mod type_annotations;

use crate::config::ParserConfig;
use crate::error::Result;
use crate::model::NameTable;
use classdex_api::{ClassInfo, ClassSummary};

/// Result of parsing one class file.
#[derive(Debug, Clone)]
pub struct ParsedClass {
    pub info: ClassInfo,
    pub summary: ClassSummary,
}

/// Turns class-file bytes into a [`ClassInfo`].
///
/// Every name and string is interned through the shared [`NameTable`], so
/// parsers on different threads can feed one index.
#[derive(Debug, Clone, Copy)]
pub struct ClassFileParser<'t> {
    names: &'t NameTable,
    config: &'t ParserConfig,
}

impl<'t> ClassFileParser<'t> {
    pub fn new(names: &'t NameTable, config: &'t ParserConfig) -> Self {
        Self { names, config }
    }

    pub fn names(&self) -> &'t NameTable {
        self.names
    }

    /// Parses a complete class file.
    ///
    /// Never panics on hostile input: every read is bounds checked and every
    /// constant pool reference is validated before use.
    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedClass> {
        let parsed = class_file::decode_class(bytes, self.names, self.config)?;
        tracing::trace!(
            "parsed {} ({} fields, {} methods)",
            parsed.summary.name,
            parsed.summary.field_count,
            parsed.summary.method_count
        );
        Ok(parsed)
    }
}
