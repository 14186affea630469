use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Presign error: {message}")]
    PresignError { message: String },

    #[error("Storage {operation} failed for '{key}': {message}")]
    StorageError {
        operation: String,
        key: String,
        message: String,
    },

    #[error("Object not found: {key}")]
    ObjectNotFound { key: String },

    #[error("Transport error: {message}")]
    TransportError { message: String },

    #[error("Form rejected by its own policy: {condition}")]
    PolicyRejected { condition: String },
}

pub type Result<T> = std::result::Result<T, ProbeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Signing,
    Network,
    Storage,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 程式結束碼：網路 2、設定與系統 3、其他 1
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl ProbeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProbeError::ConfigError { .. }
            | ProbeError::MissingConfigError { .. }
            | ProbeError::InvalidConfigValueError { .. }
            | ProbeError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            ProbeError::PresignError { .. } | ProbeError::PolicyRejected { .. } => {
                ErrorCategory::Signing
            }
            ProbeError::Http(_) | ProbeError::TransportError { .. } => ErrorCategory::Network,
            ProbeError::StorageError { .. } | ProbeError::ObjectNotFound { .. } => {
                ErrorCategory::Storage
            }
            ProbeError::IoError(_) | ProbeError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Storage => ErrorSeverity::High,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Signing => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            ProbeError::MissingConfigError { field } => {
                format!("Set '{}' in the config file or pass it on the command line", field)
            }
            ProbeError::InvalidConfigValueError { field, .. }
            | ProbeError::ConfigValidationError { field, .. } => {
                format!("Check the value of '{}'", field)
            }
            ProbeError::ConfigError { .. } => "Check the configuration file syntax".to_string(),
            ProbeError::Http(_) => {
                "Check that the endpoint is reachable and the service is running".to_string()
            }
            ProbeError::TransportError { .. } => {
                "Check that curl is installed, or use --transport reqwest".to_string()
            }
            ProbeError::PresignError { .. } => {
                "Check the credentials, region and expiry settings".to_string()
            }
            ProbeError::PolicyRejected { .. } => {
                "The form fields do not match the policy conditions; check the [post] section"
                    .to_string()
            }
            ProbeError::StorageError { .. } | ProbeError::ObjectNotFound { .. } => {
                "Check the bucket name and that the credentials may read and delete objects"
                    .to_string()
            }
            ProbeError::IoError(_) => "Check file paths and permissions".to_string(),
            ProbeError::SerializationError(_) => "Report this as a bug".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Signing => format!("Could not sign the request: {}", self),
            ErrorCategory::Network => format!("Could not reach the storage service: {}", self),
            ErrorCategory::Storage => format!("Storage operation failed: {}", self),
            ErrorCategory::System => format!("Local system error: {}", self),
        }
    }
}
