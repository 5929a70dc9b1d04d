use thiserror::Error;

use crate::protocol::FrameId;

/// Errors from the persistence medium behind the draft store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("write rejected: {0}")]
    WriteRejected(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors from the cross-frame transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("frame {0} is not registered")]
    NotRegistered(FrameId),

    #[error("mailbox full for frame {0}")]
    MailboxFull(FrameId),

    #[error("mailbox closed for frame {0}")]
    Closed(FrameId),
}

/// Errors from the final submission exchange.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The endpoint answered with a structured error payload.
    #[error("submission rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("submission transport error: {0}")]
    Transport(String),

    #[error("declaration has not been confirmed")]
    DeclarationUnconfirmed,

    #[error("no draft data loaded")]
    NoData,

    #[error("application already submitted")]
    AlreadySubmitted,
}

/// Errors from the identity provider.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity provider initialization failed: {0}")]
    Initialization(String),

    #[error("redirect callback failed: {0}")]
    Callback(String),

    #[error("identity provider error: {0}")]
    Provider(String),
}

/// A required, visible field has no value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("required field '{field}' is empty")]
pub struct ValidationError {
    pub field: String,
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}
