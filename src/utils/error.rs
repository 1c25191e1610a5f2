use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootcampError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Config server {uri} failed: {message}")]
    ConfigServerError { uri: String, message: String },

    #[error("Circuit for command '{command}' is open")]
    CircuitOpen { command: String },

    #[error("Command '{command}' timed out after {timeout_ms}ms")]
    CommandTimeout { command: String, timeout_ms: u64 },

    #[error("Upstream service error: {message}")]
    UpstreamError { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },
}

pub type Result<T> = std::result::Result<T, BootcampError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Persistence,
    Resilience,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BootcampError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::TomlError(_) => ErrorCategory::Configuration,
            Self::HttpError(_) | Self::ConfigServerError { .. } | Self::UpstreamError { .. } => {
                ErrorCategory::Network
            }
            Self::DatabaseError(_) | Self::MigrationError(_) => ErrorCategory::Persistence,
            Self::CircuitOpen { .. } | Self::CommandTimeout { .. } => ErrorCategory::Resilience,
            Self::SerializationError(_) | Self::NotFound { .. } => ErrorCategory::Data,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } => ErrorSeverity::Low,
            Self::HttpError(_)
            | Self::UpstreamError { .. }
            | Self::CircuitOpen { .. }
            | Self::CommandTimeout { .. }
            | Self::ConfigServerError { .. } => ErrorSeverity::Medium,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. }
            | Self::TomlError(_)
            | Self::SerializationError(_) => ErrorSeverity::High,
            Self::IoError(_) | Self::DatabaseError(_) | Self::MigrationError(_) => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check appsettings files, environment variables and --set overrides"
            }
            ErrorCategory::Network => {
                "Verify the remote service is reachable and the configured URI is correct"
            }
            ErrorCategory::Persistence => {
                "Check database:url and that the database file is writable"
            }
            ErrorCategory::Resilience => {
                "The dependency is failing; wait for the circuit sleep window to elapse"
            }
            ErrorCategory::Data => "Inspect the payload returned by the remote service",
            ErrorCategory::System => "Check file permissions and available ports",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting '{}' is invalid: {}", field, reason)
            }
            Self::MissingConfigError { field } => format!("Setting '{}' is required", field),
            Self::ConfigServerError { uri, .. } => {
                format!("Could not load configuration from {}", uri)
            }
            Self::CircuitOpen { command } => {
                format!("{} is temporarily unavailable", command)
            }
            other => other.to_string(),
        }
    }

    /// Process exit code for a launcher that failed with this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::CircuitOpen { .. } | Self::CommandTimeout { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::UpstreamError { .. } | Self::HttpError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BootcampError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(category = ?self.category(), "request failed: {}", self);
        }
        let body = serde_json::json!({
            "error": self.user_friendly_message(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
