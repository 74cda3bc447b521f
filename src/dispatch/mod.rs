//! Capability dispatch.
//!
//! A resolved intent is routed to exactly one capability. Each capability is
//! fulfilled by external collaborators registered at startup in a
//! `CapabilityRegistry`; the `CapabilityDispatcher` checks availability,
//! calls them, and folds every failure into a typed `CapabilityResult`.

pub mod collaborators;
pub mod dispatcher;
pub mod registry;
pub mod result;

pub use collaborators::{
    ChatResponder, CompanyResolver, Mailbox, NotesExtractor, SentimentAnalyzer, SpeechSynthesizer,
};
pub use dispatcher::CapabilityDispatcher;
pub use registry::{Availability, CapabilityRegistry};
pub use result::{
    Attachment, AudioClip, CapabilityPayload, CapabilityResult, CompanyRef, MailboxReply,
    MessageRecord, SentimentRow,
};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::intent::IntentLabel;

/// A user-facing capability, one per recognized intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Notes,
    TextToSpeech,
    StockSentiment,
    Chat,
    VoiceSummary,
    Mailbox,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Notes,
        Capability::TextToSpeech,
        Capability::StockSentiment,
        Capability::Chat,
        Capability::VoiceSummary,
        Capability::Mailbox,
    ];

    /// Capability serving an intent. `Unknown` has none.
    pub fn for_intent(intent: IntentLabel) -> Option<Self> {
        match intent {
            IntentLabel::MakeNotes => Some(Self::Notes),
            IntentLabel::ConvertToAudio => Some(Self::TextToSpeech),
            IntentLabel::StockSentiment => Some(Self::StockSentiment),
            IntentLabel::GeneralChat => Some(Self::Chat),
            IntentLabel::VoiceSummary => Some(Self::VoiceSummary),
            IntentLabel::MailboxOperations => Some(Self::Mailbox),
            IntentLabel::Unknown => None,
        }
    }

    /// The intent this capability serves.
    pub fn intent(&self) -> IntentLabel {
        match self {
            Self::Notes => IntentLabel::MakeNotes,
            Self::TextToSpeech => IntentLabel::ConvertToAudio,
            Self::StockSentiment => IntentLabel::StockSentiment,
            Self::Chat => IntentLabel::GeneralChat,
            Self::VoiceSummary => IntentLabel::VoiceSummary,
            Self::Mailbox => IntentLabel::MailboxOperations,
        }
    }

    /// Human-readable name.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Notes => "Note maker",
            Self::TextToSpeech => "Text to speech",
            Self::StockSentiment => "Stock sentiment",
            Self::Chat => "General chat",
            Self::VoiceSummary => "Audio summarization",
            Self::Mailbox => "Mailbox",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.intent().as_str())
    }
}
