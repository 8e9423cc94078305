//! Error taxonomy.
//!
//! A `thiserror` enum per failure domain plus a crate-local `Result` alias for each,
//! since the failure modes here are few and worth naming precisely rather than bubbling
//! up as an ad-hoc `anyhow::Result`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("malformed {format} row {row}: {reason}")]
    Malformed {
        format: &'static str,
        row: usize,
        reason: String,
    },
    #[error("I/O error reading {format}: {source}")]
    Io {
        format: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
pub type FormatResult<T> = Result<T, FormatError>;
