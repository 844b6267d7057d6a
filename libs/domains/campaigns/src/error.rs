//! Error types for the campaigns domain.

use job_queue::QueueError;
use thiserror::Error;
use uuid::Uuid;

/// Result type for campaign operations.
pub type CampaignResult<T> = Result<T, CampaignError>;

/// Errors that can occur in the campaigns domain.
///
/// Per-recipient send failures never surface here during a campaign run; they
/// are recorded in the delivery journal and the job's `SendOutcome`.
#[derive(Debug, Error)]
pub enum CampaignError {
    /// Request or job payload failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Every recipient of a campaign request is on the owner's suppression list.
    #[error("All recipients are suppressed ({blocked} blocked)")]
    AllRecipientsSuppressed { blocked: usize },

    /// Campaign not found.
    #[error("Campaign not found: {0}")]
    CampaignNotFound(Uuid),

    /// Provider settings are missing or inconsistent.
    #[error("Invalid provider configuration: {0}")]
    ProviderConfig(String),

    /// A job asked for the managed SES account but the server has none.
    #[error("Shared SES is not configured on the server")]
    SharedSesNotConfigured,

    /// A transport could not be constructed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A single (legacy) send failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Queue error.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for CampaignError {
    fn from(err: sea_orm::DbErr) -> Self {
        CampaignError::Database(err.to_string())
    }
}

impl From<QueueError> for CampaignError {
    fn from(err: QueueError) -> Self {
        CampaignError::Queue(err.to_string())
    }
}

impl From<validator::ValidationErrors> for CampaignError {
    fn from(err: validator::ValidationErrors) -> Self {
        CampaignError::Validation(err.to_string())
    }
}

impl From<core_config::ConfigError> for CampaignError {
    fn from(err: core_config::ConfigError) -> Self {
        CampaignError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CampaignError {
    fn from(err: serde_json::Error) -> Self {
        CampaignError::Internal(err.to_string())
    }
}

impl From<CampaignError> for QueueError {
    fn from(err: CampaignError) -> Self {
        match err {
            CampaignError::Queue(message) => QueueError::Internal(message),
            other => QueueError::Processing(other.to_string()),
        }
    }
}
