use thiserror::Error;

/// Problems with the reference tables or engine configuration.
///
/// Any of these aborts the aggregation pass before a matrix is built.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("{table} table not found at {path}")]
    MissingTable { table: &'static str, path: String },

    #[error("{table} table is missing required column {column:?}")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("{table} table is malformed at row {row}: {message}")]
    Malformed {
        table: &'static str,
        row: usize,
        message: String,
    },

    #[error("{table} table could not be read: {source}")]
    Csv {
        table: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("invalid fallback rule #{index} in rule set {version:?}: {message}")]
    InvalidRule {
        version: String,
        index: usize,
        message: String,
    },

    #[error("unknown built-in rule set {0:?} (expected \"legacy\" or \"extended\")")]
    UnknownRuleSet(String),

    #[error("engine configuration could not be read: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("feed payload is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("feed reports an upstream failure: {0}")]
    Upstream(String),
}

#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("baseline I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("baseline table could not be parsed: {0}")]
    Csv(#[from] csv::Error),

    #[error("baseline table has an unexpected shape: {0}")]
    Schema(String),
}
