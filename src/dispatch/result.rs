//! Dispatch inputs and outcomes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dispatch::Capability;
use crate::error::CapabilityError;
use crate::intent::SubIntentLabel;

// ── Inputs ──────────────────────────────────────────────────────────

/// Optional file sent alongside an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `image/png`.
    pub media_type: String,
    pub file_name: Option<String>,
}

impl Attachment {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: media_type.into(),
            file_name: None,
        }
    }

    /// Read a file, guessing its media type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self {
            bytes,
            media_type,
            file_name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
        })
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

// ── Collaborator data ───────────────────────────────────────────────

/// Synthesized speech.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

/// Company identified in free text, plus where to look for its news.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub name: String,
    /// News source locator (URL) handed to the sentiment analyzer.
    pub locator: String,
}

/// One analyzed news article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentRow {
    pub headline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// `positive`, `neutral` or `negative`.
    pub label: String,
    pub score: f32,
}

/// A message returned by the mailbox collaborator.
///
/// Every field is optional; the dispatcher passes them through unchecked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub snippet: Option<String>,
    pub body: Option<String>,
}

/// What a mailbox action produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MailboxReply {
    Records { records: Vec<MessageRecord> },
    Status { status: String },
}

// ── Outcome ─────────────────────────────────────────────────────────

/// Structured payload of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CapabilityPayload {
    Notes {
        text: String,
        /// Empty when speech synthesis failed or is not configured.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio: Option<AudioClip>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        advisory: Option<String>,
    },
    Audio(AudioClip),
    Sentiment {
        company: String,
        rows: Vec<SentimentRow>,
    },
    Chat {
        reply: String,
    },
    Messages {
        action: SubIntentLabel,
        records: Vec<MessageRecord>,
    },
    MailStatus {
        action: SubIntentLabel,
        status: String,
    },
}

/// Outcome of one dispatch. Always returned, never raised.
#[derive(Debug)]
pub enum CapabilityResult {
    Success(CapabilityPayload),
    /// The capability ran but had nothing to return. Not a failure.
    Empty {
        capability: Capability,
        message: String,
    },
    /// Recognized capability with no implementation yet. Not a failure.
    NotImplemented { capability: Capability },
    Failure(CapabilityError),
}

impl CapabilityResult {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Empty { .. } => "empty",
            Self::NotImplemented { .. } => "not_implemented",
            Self::Failure(e) => e.label(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn payload(&self) -> Option<&CapabilityPayload> {
        match self {
            Self::Success(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&CapabilityError> {
        match self {
            Self::Failure(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CapabilityError> for CapabilityResult {
    fn from(e: CapabilityError) -> Self {
        Self::Failure(e)
    }
}
