use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Identity required: sign in to generate this model")]
    IdentityRequired,

    #[error("Not entitled to generate '{model}'")]
    NotEntitled { model: String },

    #[error("Entitlement lookup failed: {message}")]
    EntitlementLookup { message: String },

    #[error("Generation backend failed: {message}")]
    GeneratorUnavailable { message: String },

    #[error("Generation backend returned an unusable reply: {message}")]
    GeneratorMalformed { message: String },

    #[error("Could not sign download URL: {message}")]
    SigningFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid configuration value for {field} ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// 錯誤分類，對應呼叫端應採取的動作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    AuthRequired,
    NotEntitled,
    Upstream,
    Signing,
    Internal,
}

impl ForgeError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ForgeError::InvalidRequest { .. } => ErrorKind::Input,
            ForgeError::IdentityRequired => ErrorKind::AuthRequired,
            ForgeError::NotEntitled { .. } => ErrorKind::NotEntitled,
            ForgeError::GeneratorUnavailable { .. } | ForgeError::GeneratorMalformed { .. } => {
                ErrorKind::Upstream
            }
            ForgeError::SigningFailed { .. } => ErrorKind::Signing,
            ForgeError::EntitlementLookup { .. }
            | ForgeError::ConfigError { .. }
            | ForgeError::MissingConfigError { .. }
            | ForgeError::InvalidConfigValueError { .. }
            | ForgeError::IoError(_)
            | ForgeError::SerializationError(_) => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ForgeError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ForgeError::IdentityRequired => StatusCode::UNAUTHORIZED,
            ForgeError::NotEntitled { .. } => StatusCode::FORBIDDEN,
            ForgeError::GeneratorMalformed { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Only backend failures are worth retrying; every other kind needs the user to act.
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::Upstream
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Input => "Check the model identifier and parameter values",
            ErrorKind::AuthRequired => "Sign in and retry",
            ErrorKind::NotEntitled => "Purchase this model or subscribe to a plan",
            ErrorKind::Upstream => "The generator is busy or down, retry in a few seconds",
            ErrorKind::Signing => "Storage could not issue a download link, contact support",
            ErrorKind::Internal => "Check the service configuration and logs",
        }
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
