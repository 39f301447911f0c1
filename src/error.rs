// src/error.rs

//! Unified error handling for the aggregator.

use std::fmt;

use thiserror::Error;

/// Result type alias for aggregator operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// No crawler is registered under the requested name
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// A single source failed to fetch or parse
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },

    /// Durable store write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Cache or sorted-set backend unreachable
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Every registered source failed during a full crawl
    #[error("All {} sources failed: {}", failed.len(), failed.join("; "))]
    AllSourcesFailed { failed: Vec<String> },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error.
    pub fn persistence(message: impl fmt::Display) -> Self {
        Self::Persistence(message.to_string())
    }

    /// Create a cache availability error.
    pub fn cache(message: impl fmt::Display) -> Self {
        Self::CacheUnavailable(message.to_string())
    }

    /// Whether the error was caused by caller input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownSource(_))
    }

    /// Stable machine-readable code for error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownSource(_) => "UNKNOWN_SOURCE",
            Self::Crawl { .. } | Self::Http(_) | Self::Selector { .. } | Self::Url(_) => {
                "CRAWL_FAILED"
            }
            Self::AllSourcesFailed { .. } => "ALL_SOURCES_FAILED",
            Self::Persistence(_) | Self::Io(_) | Self::Json(_) => "PERSISTENCE_FAILED",
            Self::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            Self::Config(_) | Self::Toml(_) | Self::Validation(_) => "INVALID_CONFIGURATION",
        }
    }
}
