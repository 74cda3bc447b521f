//! Keyword rules engine for deterministic classification.
//!
//! An ordered table of case-insensitive patterns. Rules are checked in
//! insertion order and the first match wins, so the table order is the
//! priority order. The same engine backs the rule-based intent backend and
//! the default mailbox sub-intent classifier.

use std::fmt;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::ClassifierError;
use crate::intent::labels::{ClassifierBackendKind, IntentLabel, SubIntentLabel};
use crate::intent::IntentBackend;

/// Built-in intent table, highest priority first.
const DEFAULT_INTENT_RULES: &[(&str, IntentLabel)] = &[
    (
        r"(?i)\b(make|take|create|write|extract|generate)\s+(some\s+|my\s+)?notes?\b",
        IntentLabel::MakeNotes,
    ),
    (
        r"(?i)\b(notes?\s+from|(image|photo|picture|screenshot|handwriting)\s+to\s+text|ocr)\b",
        IntentLabel::MakeNotes,
    ),
    (
        r"(?i)\b(text[\s-]to[\s-](speech|audio)|tts|read\s+(this|it)?\s*aloud|speak\s+this|say\s+this)\b",
        IntentLabel::ConvertToAudio,
    ),
    (
        r"(?i)\bconvert\b.*\b(audio|speech|mp3|voice)\b",
        IntentLabel::ConvertToAudio,
    ),
    (
        r"(?i)\b(stocks?|shares?|ticker|stock\s+market|market\s+sentiment|invest(ing|ment)?|news\s+(on|about|for))\b",
        IntentLabel::StockSentiment,
    ),
    (
        r"(?i)\b(summari[sz]e|transcribe)\s+(this\s+|the\s+|my\s+)?(audio|recording|voice(\s+(note|memo))?|podcast|call)\b",
        IntentLabel::VoiceSummary,
    ),
    (r"(?i)\bvoice\s+summary\b", IntentLabel::VoiceSummary),
    (
        r"(?i)\b(e-?mails?|gmail|inbox|mailbox|mail)\b",
        IntentLabel::MailboxOperations,
    ),
    (
        r"(?i)^\s*(hi|hello|hey|good\s+(morning|afternoon|evening)|thanks|thank\s+you)\b",
        IntentLabel::GeneralChat,
    ),
    (
        r"(?i)\b(what|who|why|how|when|where|tell\s+me|explain|can\s+you)\b",
        IntentLabel::GeneralChat,
    ),
];

/// Built-in mailbox action table, highest priority first.
const DEFAULT_MAILBOX_RULES: &[(&str, SubIntentLabel)] = &[
    (
        r"(?i)\b(summari[sz]e|summary|tl;?dr|digest|recap)\b",
        SubIntentLabel::Summarize,
    ),
    (
        r"(?i)\b(send|compose|write|draft|reply|forward)\b",
        SubIntentLabel::Send,
    ),
    (
        r"(?i)\b(search|find|look\s+(for|up)|from|about|containing|regarding)\b",
        SubIntentLabel::Search,
    ),
    (
        r"(?i)\b(read|show|open|check|list|latest|recent|unread|new)\b",
        SubIntentLabel::Read,
    ),
];

/// A single pattern with the label it produces.
#[derive(Debug, Clone)]
pub struct KeywordRule<L> {
    /// Source pattern, kept for logging.
    pub pattern: String,
    pub regex: Regex,
    pub label: L,
}

/// Ordered first-match-wins rule table.
#[derive(Debug, Clone)]
pub struct KeywordRules<L> {
    rules: Vec<KeywordRule<L>>,
}

impl<L: Copy + fmt::Display> KeywordRules<L> {
    /// Create an empty table (for testing and custom setups).
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    fn from_table(table: &[(&str, L)]) -> Self {
        let mut rules = Self::empty();
        for (pattern, label) in table {
            if let Err(e) = rules.add_rule(pattern, *label) {
                warn!(pattern = %pattern, error = %e, "Skipping built-in rule that failed to compile");
            }
        }
        rules
    }

    /// Append a regex rule at the lowest priority.
    pub fn add_rule(&mut self, pattern: &str, label: L) -> Result<(), regex::Error> {
        self.rules.push(KeywordRule {
            pattern: pattern.into(),
            regex: Regex::new(pattern)?,
            label,
        });
        Ok(())
    }

    /// Append a literal keyword, matched case-insensitively on word boundaries.
    pub fn add_keyword(&mut self, keyword: &str, label: L) -> Result<(), regex::Error> {
        self.add_rule(&format!(r"(?i)\b{}\b", regex::escape(keyword)), label)
    }

    /// Return the label of the first matching rule.
    pub fn evaluate(&self, text: &str) -> Option<L> {
        let rule = self.rules.iter().find(|r| r.regex.is_match(text))?;
        debug!(rule = %rule.pattern, label = %rule.label, "Keyword rule matched");
        Some(rule.label)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl KeywordRules<IntentLabel> {
    /// Built-in intent table.
    pub fn default_intent_rules() -> Self {
        Self::from_table(DEFAULT_INTENT_RULES)
    }
}

impl KeywordRules<SubIntentLabel> {
    /// Built-in mailbox action table.
    pub fn default_mailbox_rules() -> Self {
        Self::from_table(DEFAULT_MAILBOX_RULES)
    }
}

/// Rule-based intent backend. Pure: no I/O, no state beyond the table.
pub struct RuleBasedBackend {
    rules: KeywordRules<IntentLabel>,
}

impl RuleBasedBackend {
    pub fn new(rules: KeywordRules<IntentLabel>) -> Self {
        Self { rules }
    }

    pub fn with_default_rules() -> Self {
        Self::new(KeywordRules::default_intent_rules())
    }
}

impl IntentBackend for RuleBasedBackend {
    fn kind(&self) -> ClassifierBackendKind {
        ClassifierBackendKind::RuleBased
    }

    fn classify(&self, text: &str) -> Result<IntentLabel, ClassifierError> {
        Ok(self.rules.evaluate(text).unwrap_or(IntentLabel::Unknown))
    }
}
