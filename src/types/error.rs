//! Unified Error Type System
//!
//! Centralized error types for the entire crate.
//! Backend failures carry a category so the router can log them uniformly.
//!
//! ## Error Categories
//!
//! - **RateLimit**: API rate limiting
//! - **Auth**: Missing or rejected credentials
//! - **Network**: Connectivity issues and timeouts
//! - **Unavailable**: Backend down or not installed
//! - **BadRequest**: Rejected request
//! - **Transient**: Temporary server issues

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Categories used to describe backend failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    RateLimit,
    Auth,
    Network,
    Unavailable,
    BadRequest,
    Transient,
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// =============================================================================
// Backend Error
// =============================================================================

/// Model backend failure with category and backend context
#[derive(Debug, Clone)]
pub struct BackendError {
    pub category: ErrorCategory,
    pub message: String,
    pub backend: Option<String>,
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(backend) = &self.backend {
            write!(f, "[{}:{}] {}", backend, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for BackendError {}

impl BackendError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            backend: None,
        }
    }

    pub fn with_backend(
        category: ErrorCategory,
        message: impl Into<String>,
        backend: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            backend: Some(backend.into()),
        }
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Maps raw backend failures onto an [`ErrorCategory`]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any backend
    pub fn classify(message: &str, backend: &str) -> BackendError {
        let lower = message.to_lowercase();

        let category = if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
        {
            ErrorCategory::RateLimit
        } else if lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("unauthorized")
        {
            ErrorCategory::Auth
        } else if lower.contains("connect")
            || lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("dns")
        {
            ErrorCategory::Network
        } else if lower.contains("503")
            || lower.contains("502")
            || lower.contains("unavailable")
            || lower.contains("not found")
        {
            ErrorCategory::Unavailable
        } else if lower.contains("400") || lower.contains("bad request") {
            ErrorCategory::BadRequest
        } else if lower.contains("500") || lower.contains("overloaded") {
            ErrorCategory::Transient
        } else {
            ErrorCategory::Unknown
        };

        BackendError::with_backend(category, message, backend)
    }

    /// Classify an HTTP status code directly
    pub fn classify_http_status(status: u16, message: &str, backend: &str) -> BackendError {
        let category = match status {
            429 => ErrorCategory::RateLimit,
            401 | 403 => ErrorCategory::Auth,
            400 => ErrorCategory::BadRequest,
            404 => ErrorCategory::Unavailable,
            500 | 502 | 503 | 504 => ErrorCategory::Transient,
            _ => ErrorCategory::Unknown,
        };
        BackendError::with_backend(category, message, backend)
    }

    /// Category of any crate error, for logging
    pub fn category_of(err: &LensError, backend: &str) -> ErrorCategory {
        match err {
            LensError::Backend(e) => e.category,
            LensError::Timeout { .. } => ErrorCategory::Network,
            LensError::Config(_) => ErrorCategory::Auth,
            other => Self::classify(&other.to_string(), backend).category,
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum LensError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(BackendError),

    #[error("No model backend available")]
    NoBackendAvailable,

    #[error("Unparseable model response: {preview}")]
    UnparseableResponse { preview: String },

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("{tier} analysis failed: {message}")]
    Analysis { tier: String, message: String },

    #[error("Skipped: {reason}")]
    Skipped { reason: String },
}

impl From<BackendError> for LensError {
    fn from(err: BackendError) -> Self {
        LensError::Backend(err)
    }
}

pub type Result<T> = std::result::Result<T, LensError>;

impl LensError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn analysis(tier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Analysis {
            tier: tier.into(),
            message: message.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Map an IO error, keeping "not found" distinguishable
    pub fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path: path.into() }
        } else {
            Self::Io(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// =============================================================================
// Tests
// =============================================================================
