//! Queue error types

use crate::job::JobId;
use thiserror::Error;

/// Errors raised by queue backends, workers and processors
#[derive(Error, Debug)]
pub enum QueueError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Payload, progress or result could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The processor rejected or failed the job
    #[error("Processing error: {0}")]
    Processing(String),

    /// No job with this id is known to the queue
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Create a processing error
    pub fn processing(message: impl Into<String>) -> Self {
        QueueError::Processing(message.into())
    }

    /// Whether the error comes from a lost or refused backend connection
    pub fn is_connection_error(&self) -> bool {
        match self {
            QueueError::Redis(err) => {
                err.is_connection_dropped()
                    || err.is_connection_refusal()
                    || err.is_io_error()
                    || err.is_timeout()
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err.to_string())
    }
}
