//! Mailbox sub-intent classification.
//!
//! Second-stage classifier, consulted only for `mailbox_operations`. It never
//! fails outward: errors and non-matches become `SubIntentLabel::Unspecified`.

use tracing::warn;

use crate::error::ClassifierError;
use crate::intent::labels::SubIntentLabel;
use crate::intent::rules::KeywordRules;

/// A mailbox action classifier.
pub trait SubIntentClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means nothing matched.
    fn classify(&self, text: &str) -> Result<Option<SubIntentLabel>, ClassifierError>;
}

/// Keyword-table sub-intent classifier.
pub struct RuleBasedSubIntent {
    rules: KeywordRules<SubIntentLabel>,
}

impl RuleBasedSubIntent {
    pub fn new(rules: KeywordRules<SubIntentLabel>) -> Self {
        Self { rules }
    }

    pub fn with_default_rules() -> Self {
        Self::new(KeywordRules::default_mailbox_rules())
    }
}

impl SubIntentClassifier for RuleBasedSubIntent {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn classify(&self, text: &str) -> Result<Option<SubIntentLabel>, ClassifierError> {
        Ok(self.rules.evaluate(text))
    }
}

pub struct SubIntentRouter {
    classifier: Box<dyn SubIntentClassifier>,
}

impl SubIntentRouter {
    pub fn new(classifier: Box<dyn SubIntentClassifier>) -> Self {
        Self { classifier }
    }

    pub fn with_default_rules() -> Self {
        Self::new(Box::new(RuleBasedSubIntent::with_default_rules()))
    }

    /// Resolve the mailbox action. Never fails.
    pub fn resolve_sub_intent(&self, text: &str) -> SubIntentLabel {
        match self.classifier.classify(text) {
            Ok(Some(label)) => label,
            Ok(None) => SubIntentLabel::Unspecified,
            Err(e) => {
                warn!(
                    classifier = self.classifier.name(),
                    error = %e,
                    "Sub-intent classification failed, using unspecified"
                );
                SubIntentLabel::Unspecified
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl SubIntentClassifier for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn classify(&self, _text: &str) -> Result<Option<SubIntentLabel>, ClassifierError> {
            Err(ClassifierError::inference("failing", "model crashed"))
        }
    }

    #[test]
    fn resolves_summarize() {
        let router = SubIntentRouter::with_default_rules();
        assert_eq!(
            router.resolve_sub_intent("summarize this email thread"),
            SubIntentLabel::Summarize
        );
    }

    #[test]
    fn no_match_is_unspecified() {
        let router = SubIntentRouter::with_default_rules();
        assert_eq!(
            router.resolve_sub_intent("gmail"),
            SubIntentLabel::Unspecified
        );
    }

    #[test]
    fn classifier_failure_is_unspecified() {
        let router = SubIntentRouter::new(Box::new(Failing));
        assert_eq!(
            router.resolve_sub_intent("send an email"),
            SubIntentLabel::Unspecified
        );
    }
}
