//! Intent classification.
//!
//! Utterances flow through:
//! 1. `IntentRouter::resolve_intent()`: one configured backend
//!    (rule-based, statistical or semantic) picks the top-level intent
//! 2. `SubIntentRouter::resolve_sub_intent()`: mailbox action, only when the
//!    intent is `mailbox_operations`
//!
//! Both stages absorb backend failures: the caller always gets a label.

pub mod labels;
pub mod router;
pub mod rules;
pub mod semantic;
pub mod statistical;
pub mod sub_intent;
pub(crate) mod text;

pub use labels::{ClassifierBackendKind, IntentLabel, SubIntentLabel, Utterance};
pub use router::{IntentRouter, Resolution, Resolver};
pub use rules::{KeywordRules, RuleBasedBackend};
pub use semantic::{Prediction, PrototypeModel, SemanticBackend, SequenceClassifier};
pub use statistical::{InferencePipeline, LinearTextPipeline, StatisticalBackend};
pub use sub_intent::{RuleBasedSubIntent, SubIntentClassifier, SubIntentRouter};

use crate::error::ClassifierError;

/// An interchangeable intent classifier.
///
/// Implementations are loaded once at startup and shared read-only, so
/// `classify` takes `&self` and must not mutate.
pub trait IntentBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> ClassifierBackendKind;

    /// Classify one utterance.
    fn classify(&self, text: &str) -> Result<IntentLabel, ClassifierError>;
}
