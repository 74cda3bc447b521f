//! Collaborator traits for the external modules capabilities are built on.
//!
//! Implementations are pure I/O with no routing logic. Availability checks,
//! preconditions and failure isolation live in `CapabilityDispatcher`.

use async_trait::async_trait;

use crate::dispatch::result::{Attachment, AudioClip, CompanyRef, MailboxReply, SentimentRow};
use crate::error::CollaboratorError;
use crate::intent::SubIntentLabel;

/// OCR / note extraction from an image.
#[async_trait]
pub trait NotesExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract_notes(&self, image: &Attachment) -> Result<String, CollaboratorError>;
}

/// Text-to-speech.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str) -> Result<AudioClip, CollaboratorError>;
}

/// Company name and news locator extraction.
#[async_trait]
pub trait CompanyResolver: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when the text names no company.
    async fn resolve(&self, text: &str) -> Result<Option<CompanyRef>, CollaboratorError>;
}

/// News sentiment analysis over a source locator.
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    /// One row per article; empty when no articles were found.
    async fn analyze(&self, locator: &str) -> Result<Vec<SentimentRow>, CollaboratorError>;
}

/// General chat / LLM.
#[async_trait]
pub trait ChatResponder: Send + Sync {
    fn name(&self) -> &str;

    async fn reply(&self, text: &str) -> Result<String, CollaboratorError>;
}

/// Mailbox operations.
#[async_trait]
pub trait Mailbox: Send + Sync {
    fn name(&self) -> &str;

    /// Run one mailbox action. Read, search and summarize return records;
    /// send returns a status.
    async fn execute(
        &self,
        text: &str,
        action: SubIntentLabel,
    ) -> Result<MailboxReply, CollaboratorError>;
}
