/// Highest class-file major version the parser accepts by default (Java 25).
pub const DEFAULT_MAX_MAJOR_VERSION: u16 = 69;

pub const ENV_MAX_MAJOR_VERSION: &str = "CLASSDEX_MAX_MAJOR_VERSION";
pub const ENV_SKIP_INVISIBLE: &str = "CLASSDEX_SKIP_INVISIBLE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Class files with a newer major version fail with `UnsupportedVersion`.
    pub max_major_version: u16,
    /// Whether `RuntimeInvisible*` annotation tables are decoded.
    pub include_invisible_annotations: bool,
    /// Whether finished field, method and component types go through the
    /// shared type table.
    pub intern_types: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_major_version: DEFAULT_MAX_MAJOR_VERSION,
            include_invisible_annotations: true,
            intern_types: true,
        }
    }
}

impl ParserConfig {
    /// Defaults overridden by `CLASSDEX_MAX_MAJOR_VERSION` and
    /// `CLASSDEX_SKIP_INVISIBLE`. Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(version) = lookup(ENV_MAX_MAJOR_VERSION).and_then(|v| v.trim().parse().ok()) {
            config.max_major_version = version;
        }
        if let Some(skip) = lookup(ENV_SKIP_INVISIBLE) {
            config.include_invisible_annotations =
                !matches!(skip.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        config
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchConfig {
    pub parser: ParserConfig,
    /// Worker threads for parsing; `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Abort the whole batch on a class with an unsupported version instead
    /// of recording it as a failure.
    pub fail_fast_on_unsupported: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.max_major_version, 69);
        assert!(config.include_invisible_annotations);
        assert!(config.intern_types);
    }

    #[test]
    fn test_lookup_overrides() {
        let config = ParserConfig::from_lookup(|key| match key {
            ENV_MAX_MAJOR_VERSION => Some("52".to_string()),
            ENV_SKIP_INVISIBLE => Some("true".to_string()),
            _ => None,
        });
        assert_eq!(config.max_major_version, 52);
        assert!(!config.include_invisible_annotations);

        let garbage = ParserConfig::from_lookup(|key| match key {
            ENV_MAX_MAJOR_VERSION => Some("latest".to_string()),
            _ => None,
        });
        assert_eq!(garbage, ParserConfig::default());
    }
}
