// src/error.rs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

/// Errors raised by the hub library.
///
/// "No data" outcomes (stats block past the end of the payload, no sold
/// table on a listing page) are not errors; they come back as `None`.
#[derive(Debug, Error)]
pub enum HubError {
    /// A view that must be numeric carried a non-numeric value.
    #[error("{view}: value {value:?} for {key:?} is not an integer")]
    NotAnInteger {
        view: &'static str,
        key: String,
        value: String,
    },

    /// A stats block a view reads is not a list of `{key, value}` records.
    #[error("{view}: block {index} is malformed: {detail}")]
    MalformedBlock {
        view: &'static str,
        index: usize,
        detail: String,
    },

    /// The sold history table did not have the expected shape.
    #[error("sold history table has {found} columns, expected 4 (headers: {headers:?})")]
    UnexpectedColumns { found: usize, headers: Vec<String> },

    #[error("address not found: {0}")]
    AddressNotFound(String),

    #[error("no statistics returned for {0}")]
    NoStatistics(String),

    #[error("could not read as-of date from {0:?}")]
    AsOfDate(String),

    /// A Maps web service answered with a failure status such as
    /// `REQUEST_DENIED` or `OVER_QUERY_LIMIT`.
    #[error("{endpoint} returned {status}: {message}")]
    Api {
        endpoint: String,
        status: String,
        message: String,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HubError {
    /// True for errors that mean the upstream data shape changed.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            HubError::NotAnInteger { .. }
                | HubError::MalformedBlock { .. }
                | HubError::UnexpectedColumns { .. }
        )
    }
}

impl From<arrow::error::ArrowError> for HubError {
    fn from(e: arrow::error::ArrowError) -> Self {
        HubError::Cache(e.to_string())
    }
}

impl From<parquet::errors::ParquetError> for HubError {
    fn from(e: parquet::errors::ParquetError) -> Self {
        HubError::Cache(e.to_string())
    }
}

impl From<glob::PatternError> for HubError {
    fn from(e: glob::PatternError) -> Self {
        HubError::Cache(e.to_string())
    }
}

impl From<glob::GlobError> for HubError {
    fn from(e: glob::GlobError) -> Self {
        HubError::Cache(e.to_string())
    }
}
