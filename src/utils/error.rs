use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Failed to fetch {url}: HTTP {status}")]
    Fetch { url: String, status: u16 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Extraction failed for '{field}' on {url}: {reason}")]
    Extraction {
        url: String,
        field: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration value: {field}")]
    MissingConfig { field: String },

    #[error("Unknown flow: {name}")]
    UnknownFlow { name: String },

    #[error("Task '{task}' did not complete: {message}")]
    Task { task: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Extraction,
    Validation,
    Configuration,
    Storage,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FlowError {
    pub fn extraction(url: &str, field: &str, reason: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch { .. } | Self::Http(_) => ErrorCategory::Network,
            Self::Extraction { .. } => ErrorCategory::Extraction,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Config { .. }
            | Self::InvalidConfigValue { .. }
            | Self::MissingConfig { .. }
            | Self::UnknownFlow { .. } => ErrorCategory::Configuration,
            Self::Io(_) | Self::Serialization(_) | Self::Csv(_) => ErrorCategory::Storage,
            Self::Task { .. } => ErrorCategory::Runtime,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Extraction | ErrorCategory::Validation => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage | ErrorCategory::Runtime => ErrorSeverity::Critical,
        }
    }

    /// Transient network failures are worth another attempt; a page whose
    /// markup no longer matches the selectors is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::Fetch { .. } | Self::Http(_) => {
                "Check network connectivity and retry; the site may be rate limiting requests"
            }
            Self::Extraction { .. } => {
                "The page markup has probably changed; update the selectors in imdb::extract"
            }
            Self::Validation { .. } => {
                "Use sort_by in {ranking, imdb_rating, release_date, number_of_ratings}, sort_direction in {ASC, DESC} and limit <= 5"
            }
            Self::Config { .. } | Self::InvalidConfigValue { .. } | Self::MissingConfig { .. } => {
                "Fix the configuration file or the command line arguments"
            }
            Self::UnknownFlow { .. } => "Run with --list to see the registered flows",
            Self::Io(_) | Self::Serialization(_) | Self::Csv(_) => {
                "Check that the results directory exists and is writable"
            }
            Self::Task { .. } => "Re-run the flow; a task panicked or was cancelled",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Fetch { url, status } => format!("Could not download {} (HTTP {})", url, status),
            Self::Http(_) => "Network request failed".to_string(),
            Self::Extraction { field, url, .. } => {
                format!("Could not read {} from {}", field, url)
            }
            Self::UnknownFlow { name } => format!("No flow named '{}'", name),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
