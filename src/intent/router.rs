//! Primary intent router and the two-stage resolver.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ClassifierConfig;
use crate::error::ClassifierError;
use crate::intent::labels::{ClassifierBackendKind, IntentLabel, SubIntentLabel, Utterance};
use crate::intent::rules::RuleBasedBackend;
use crate::intent::semantic::SemanticBackend;
use crate::intent::statistical::StatisticalBackend;
use crate::intent::sub_intent::SubIntentRouter;
use crate::intent::IntentBackend;

/// Delegates to the one backend chosen at configuration time.
///
/// There is no fallback between backends: if the configured backend fails
/// the answer is `unknown`.
pub struct IntentRouter {
    backend: Box<dyn IntentBackend>,
}

impl IntentRouter {
    pub fn new(backend: Box<dyn IntentBackend>) -> Self {
        Self { backend }
    }

    /// Build the configured backend, loading its artifact.
    ///
    /// A load failure here is fatal for the selected backend.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let backend: Box<dyn IntentBackend> = match config.backend {
            ClassifierBackendKind::RuleBased => Box::new(RuleBasedBackend::with_default_rules()),
            ClassifierBackendKind::Statistical => {
                Box::new(StatisticalBackend::load(&config.statistical_model)?)
            }
            ClassifierBackendKind::Semantic => Box::new(SemanticBackend::load(
                &config.semantic_model,
                config.semantic_threshold,
            )?),
        };
        info!(backend = %config.backend, "Intent router ready");
        Ok(Self::new(backend))
    }

    pub fn kind(&self) -> ClassifierBackendKind {
        self.backend.kind()
    }

    /// Classify text into exactly one label. Never fails.
    pub fn resolve_intent(&self, text: &str) -> IntentLabel {
        match self.backend.classify(text) {
            Ok(label) => {
                debug!(backend = %self.kind(), intent = %label, "Intent resolved");
                label
            }
            Err(e) => {
                warn!(
                    backend = %self.kind(),
                    error = %e,
                    "Intent classification failed, treating as unknown"
                );
                IntentLabel::Unknown
            }
        }
    }
}

/// Outcome of both classification stages for one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub intent: IntentLabel,
    /// Present iff `intent` is `mailbox_operations`.
    pub sub_intent: Option<SubIntentLabel>,
}

/// Runs the primary router, then the sub-intent router for mailbox requests.
pub struct Resolver {
    intents: IntentRouter,
    sub_intents: SubIntentRouter,
}

impl Resolver {
    pub fn new(intents: IntentRouter, sub_intents: SubIntentRouter) -> Self {
        Self {
            intents,
            sub_intents,
        }
    }

    pub fn intent_router(&self) -> &IntentRouter {
        &self.intents
    }

    pub fn resolve(&self, utterance: &Utterance) -> Resolution {
        let intent = self.intents.resolve_intent(utterance.text());
        let sub_intent = intent
            .is_mailbox()
            .then(|| self.sub_intents.resolve_sub_intent(utterance.text()));

        info!(
            utterance_id = %utterance.id,
            intent = %intent,
            sub_intent = sub_intent.map(|s| s.as_str()).unwrap_or("-"),
            "Utterance classified"
        );
        Resolution { intent, sub_intent }
    }
}
