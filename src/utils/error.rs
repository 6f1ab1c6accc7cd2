use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to read {}: {source}", .path.display())]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} in {path}: {message}")]
    DecodeError {
        format: String,
        path: String,
        message: String,
    },

    #[error("Unsupported config type: {0}")]
    UnsupportedFormatError(String),

    #[error("There is no such {} config dir, stopping", .path.display())]
    EnvironmentDirUnreadable { path: PathBuf },

    #[error("Store write failed for {name} (shop {shop_id}): {message}")]
    StoreError {
        shop_id: String,
        name: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Store,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ImportError {
    pub fn store(shop_id: &str, name: &str, message: impl Into<String>) -> Self {
        Self::StoreError {
            shop_id: shop_id.to_string(),
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn decode(format: &str, path: impl Into<String>, message: impl ToString) -> Self {
        Self::DecodeError {
            format: format.to_string(),
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::UnsupportedFormatError(_)
            | Self::EnvironmentDirUnreadable { .. } => ErrorCategory::Configuration,
            Self::DecodeError { .. } | Self::FileReadError { .. } => ErrorCategory::Input,
            Self::StoreError { .. } | Self::SerializationError(_) => ErrorCategory::Store,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Store => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::EnvironmentDirUnreadable { path } => format!(
                "Create {} or set env.<name>.dir in the configuration file",
                path.display()
            ),
            Self::DecodeError { path, .. } => {
                format!("Fix the syntax of {} and run the import again", path)
            }
            Self::FileReadError { path, .. } => {
                format!("Make sure {} exists and is readable", path.display())
            }
            Self::UnsupportedFormatError(_) => "Set type = \"json\" or type = \"yaml\"".to_string(),
            Self::StoreError { .. } => {
                "Check the store backend; the import can be re-run safely".to_string()
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => {
                "Review the importer configuration file".to_string()
            }
            Self::SerializationError(_) | Self::IoError(_) => {
                "Check file permissions and free disk space".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Could not read import data: {}", self),
            ErrorCategory::Store => format!("Writing to the shop store failed: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        let err = ImportError::EnvironmentDirUnreadable {
            path: PathBuf::from("/nope"),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);

        let err = ImportError::store("1", "sFoo", "disk full");
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.to_string().contains("sFoo"));
    }

    #[test]
    fn test_decode_error_message() {
        let err = ImportError::decode("json", "shops.json", "expected value");
        assert_eq!(
            err.to_string(),
            "Invalid json in shops.json: expected value"
        );
        assert!(err.recovery_suggestion().contains("shops.json"));
    }
}
