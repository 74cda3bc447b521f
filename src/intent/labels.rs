//! Closed label sets shared by every classifier backend.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Utterance ───────────────────────────────────────────────────────

/// One piece of user input, classified and dispatched exactly once.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Correlation id for log lines of this interaction.
    pub id: Uuid,
    text: String,
    pub received_at: DateTime<Utc>,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            received_at: Utc::now(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

// ── Intent ──────────────────────────────────────────────────────────

/// Top-level capability a user utterance is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    MakeNotes,
    ConvertToAudio,
    StockSentiment,
    GeneralChat,
    VoiceSummary,
    MailboxOperations,
    Unknown,
}

impl IntentLabel {
    /// Every label, `Unknown` last.
    pub const ALL: [IntentLabel; 7] = [
        IntentLabel::MakeNotes,
        IntentLabel::ConvertToAudio,
        IntentLabel::StockSentiment,
        IntentLabel::GeneralChat,
        IntentLabel::VoiceSummary,
        IntentLabel::MailboxOperations,
        IntentLabel::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MakeNotes => "make_notes",
            Self::ConvertToAudio => "convert_to_audio",
            Self::StockSentiment => "stock_sentiment",
            Self::GeneralChat => "general_chat",
            Self::VoiceSummary => "voice_summary",
            Self::MailboxOperations => "mailbox_operations",
            Self::Unknown => "unknown",
        }
    }

    /// Map a classifier's native label onto the closed set.
    ///
    /// Accepts the canonical names plus the legacy `gmail_operations` alias.
    /// Anything else is `Unknown`.
    pub fn from_native(label: &str) -> Self {
        label.trim().parse().unwrap_or(Self::Unknown)
    }

    pub fn is_mailbox(&self) -> bool {
        matches!(self, Self::MailboxOperations)
    }
}

impl fmt::Display for IntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "make_notes" => Ok(Self::MakeNotes),
            "convert_to_audio" => Ok(Self::ConvertToAudio),
            "stock_sentiment" => Ok(Self::StockSentiment),
            "general_chat" => Ok(Self::GeneralChat),
            "voice_summary" => Ok(Self::VoiceSummary),
            "mailbox_operations" | "gmail_operations" => Ok(Self::MailboxOperations),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown intent label: '{other}'")),
        }
    }
}

// ── Mailbox sub-intent ──────────────────────────────────────────────

/// Mailbox action, meaningful only alongside `IntentLabel::MailboxOperations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubIntentLabel {
    Read,
    Search,
    Summarize,
    Send,
    /// Sub-intent resolution failed or matched nothing.
    Unspecified,
}

impl SubIntentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Search => "search",
            Self::Summarize => "summarize",
            Self::Send => "send",
            Self::Unspecified => "unspecified",
        }
    }

    /// Read-only fallback used when no specific action was resolved.
    pub fn or_default_action(self) -> Self {
        match self {
            Self::Unspecified => Self::Read,
            other => other,
        }
    }

    /// Whether this action returns message records rather than a status.
    pub fn returns_records(&self) -> bool {
        !matches!(self, Self::Send)
    }
}

impl fmt::Display for SubIntentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubIntentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "read" | "read_email" => Ok(Self::Read),
            "search" | "search_email" => Ok(Self::Search),
            "summarize" | "summarize_email" => Ok(Self::Summarize),
            "send" | "send_email" => Ok(Self::Send),
            "unspecified" => Ok(Self::Unspecified),
            other => Err(format!("unknown mailbox sub-intent: '{other}'")),
        }
    }
}

// ── Backend selection ───────────────────────────────────────────────

/// Which intent backend the primary router delegates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackendKind {
    RuleBased,
    Statistical,
    Semantic,
}

impl ClassifierBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::Statistical => "statistical",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for ClassifierBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rule_based" | "rules" => Ok(Self::RuleBased),
            "statistical" | "ml" => Ok(Self::Statistical),
            "semantic" | "transformer" => Ok(Self::Semantic),
            other => Err(format!(
                "'{other}' is not one of rule_based, statistical, semantic"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_labels_round_trip_through_display() {
        for label in IntentLabel::ALL {
            assert_eq!(label.to_string().parse::<IntentLabel>().unwrap(), label);
        }
    }

    #[test]
    fn legacy_gmail_label_maps_to_mailbox() {
        assert_eq!(
            IntentLabel::from_native("gmail_operations"),
            IntentLabel::MailboxOperations
        );
    }

    #[test]
    fn unrecognized_native_label_is_unknown() {
        assert_eq!(IntentLabel::from_native("weather"), IntentLabel::Unknown);
        assert_eq!(IntentLabel::from_native(""), IntentLabel::Unknown);
    }

    #[test]
    fn intent_serializes_snake_case() {
        let json = serde_json::to_value(IntentLabel::ConvertToAudio).unwrap();
        assert_eq!(json, "convert_to_audio");
    }

    #[test]
    fn unspecified_sub_intent_defaults_to_read() {
        assert_eq!(
            SubIntentLabel::Unspecified.or_default_action(),
            SubIntentLabel::Read
        );
        assert_eq!(
            SubIntentLabel::Send.or_default_action(),
            SubIntentLabel::Send
        );
    }

    #[test]
    fn only_send_returns_status() {
        assert!(SubIntentLabel::Read.returns_records());
        assert!(SubIntentLabel::Search.returns_records());
        assert!(SubIntentLabel::Summarize.returns_records());
        assert!(!SubIntentLabel::Send.returns_records());
    }

    #[test]
    fn backend_kind_accepts_legacy_names() {
        assert_eq!(
            "ml".parse::<ClassifierBackendKind>().unwrap(),
            ClassifierBackendKind::Statistical
        );
        assert_eq!(
            "transformer".parse::<ClassifierBackendKind>().unwrap(),
            ClassifierBackendKind::Semantic
        );
        assert_eq!(
            " Rule_Based ".parse::<ClassifierBackendKind>().unwrap(),
            ClassifierBackendKind::RuleBased
        );
        assert!("neural".parse::<ClassifierBackendKind>().is_err());
    }

    #[test]
    fn utterances_get_distinct_ids() {
        let a = Utterance::new("hello");
        let b = Utterance::new("hello");
        assert_ne!(a.id, b.id);
        assert_eq!(a.text(), "hello");
    }
}
