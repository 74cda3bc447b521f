//! Error types for the agent.

use std::time::Duration;

use crate::dispatch::Capability;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Intent classifier errors.
///
/// `ModelLoad` is fatal for the backend it names. `Inference` covers a single
/// failed call and is absorbed by the routers as an `unknown` outcome.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Failed to load {backend} model from {path}: {reason}")]
    ModelLoad {
        backend: String,
        path: String,
        reason: String,
    },

    #[error("{backend} inference failed: {reason}")]
    Inference { backend: String, reason: String },
}

impl ClassifierError {
    pub fn model_load(
        backend: impl Into<String>,
        path: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::ModelLoad {
            backend: backend.into(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn inference(backend: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Inference {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure raised by an external collaborator (chat, speech, mailbox, ...).
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} request failed: {reason}")]
    RequestFailed { service: String, reason: String },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{service} timed out after {after:?}")]
    Timeout { service: String, after: Duration },
}

impl CollaboratorError {
    pub fn request_failed(service: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::RequestFailed {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_response(service: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            service: service.into(),
            reason: reason.to_string(),
        }
    }
}

/// Typed failure carried inside a `CapabilityResult`.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("{capability} cannot run: {reason}")]
    Precondition {
        capability: Capability,
        reason: String,
    },

    #[error("{capability} is not configured")]
    Unavailable { capability: Capability },

    #[error("No capability matches this request")]
    UnrecognizedIntent,

    #[error("{capability} failed: {source}")]
    Collaborator {
        capability: Capability,
        #[source]
        source: CollaboratorError,
    },
}

impl CapabilityError {
    /// Capability this failure belongs to, if any.
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Self::Precondition { capability, .. }
            | Self::Unavailable { capability }
            | Self::Collaborator { capability, .. } => Some(*capability),
            Self::UnrecognizedIntent => None,
        }
    }

    /// Short diagnostic suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Precondition { reason, .. } => reason.clone(),
            Self::Unavailable { capability } => {
                format!("{} is not available right now.", capability.title())
            }
            Self::UnrecognizedIntent => "Unknown or unsupported request.".to_string(),
            Self::Collaborator {
                source: CollaboratorError::InvalidInput(reason),
                ..
            } => reason.clone(),
            Self::Collaborator { capability, .. } => {
                format!("{} failed. See the log for details.", capability.title())
            }
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Precondition { .. } => "precondition",
            Self::Unavailable { .. } => "unavailable",
            Self::UnrecognizedIntent => "unrecognized_intent",
            Self::Collaborator { .. } => "collaborator",
        }
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Mailbox protocol errors (IMAP/SMTP).
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Connection to {host} failed: {reason}")]
    Connect { host: String, reason: String },

    #[error("IMAP command {command} failed: {reason}")]
    Imap { command: String, reason: String },

    #[error("Send failed: {0}")]
    Send(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MailboxError> for CollaboratorError {
    fn from(e: MailboxError) -> Self {
        CollaboratorError::request_failed("mailbox", e)
    }
}

impl From<LlmError> for CollaboratorError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::RequestFailed { provider, reason } => CollaboratorError::RequestFailed {
                service: provider,
                reason,
            },
            LlmError::InvalidResponse { provider, reason } => {
                CollaboratorError::InvalidResponse {
                    service: provider,
                    reason,
                }
            }
        }
    }
}
