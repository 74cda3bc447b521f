//! Startup table of which collaborators are configured.

use std::sync::Arc;

use tracing::debug;

use crate::dispatch::Capability;
use crate::dispatch::collaborators::{
    ChatResponder, CompanyResolver, Mailbox, NotesExtractor, SentimentAnalyzer, SpeechSynthesizer,
};

/// Whether a capability can be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Ready,
    /// A required collaborator was not registered.
    Missing(&'static str),
    /// Recognized, but there is no implementation.
    NotImplemented,
}

/// Registered collaborators. Built once at startup, then read-only.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    notes: Option<Arc<dyn NotesExtractor>>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    companies: Option<Arc<dyn CompanyResolver>>,
    sentiment: Option<Arc<dyn SentimentAnalyzer>>,
    chat: Option<Arc<dyn ChatResponder>>,
    mailbox: Option<Arc<dyn Mailbox>>,
}

impl CapabilityRegistry {
    /// Create an empty registry: every capability unavailable.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes(mut self, notes: Arc<dyn NotesExtractor>) -> Self {
        debug!("Registered notes extractor: {}", notes.name());
        self.notes = Some(notes);
        self
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        debug!("Registered speech synthesizer: {}", speech.name());
        self.speech = Some(speech);
        self
    }

    pub fn with_company_resolver(mut self, companies: Arc<dyn CompanyResolver>) -> Self {
        debug!("Registered company resolver: {}", companies.name());
        self.companies = Some(companies);
        self
    }

    pub fn with_sentiment(mut self, sentiment: Arc<dyn SentimentAnalyzer>) -> Self {
        debug!("Registered sentiment analyzer: {}", sentiment.name());
        self.sentiment = Some(sentiment);
        self
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatResponder>) -> Self {
        debug!("Registered chat responder: {}", chat.name());
        self.chat = Some(chat);
        self
    }

    pub fn with_mailbox(mut self, mailbox: Arc<dyn Mailbox>) -> Self {
        debug!("Registered mailbox: {}", mailbox.name());
        self.mailbox = Some(mailbox);
        self
    }

    pub fn notes(&self) -> Option<&Arc<dyn NotesExtractor>> {
        self.notes.as_ref()
    }

    pub fn speech(&self) -> Option<&Arc<dyn SpeechSynthesizer>> {
        self.speech.as_ref()
    }

    pub fn company_resolver(&self) -> Option<&Arc<dyn CompanyResolver>> {
        self.companies.as_ref()
    }

    pub fn sentiment(&self) -> Option<&Arc<dyn SentimentAnalyzer>> {
        self.sentiment.as_ref()
    }

    pub fn chat(&self) -> Option<&Arc<dyn ChatResponder>> {
        self.chat.as_ref()
    }

    pub fn mailbox(&self) -> Option<&Arc<dyn Mailbox>> {
        self.mailbox.as_ref()
    }

    /// Availability of one capability.
    ///
    /// Note making needs only the extractor; speech is an optional second step.
    pub fn availability(&self, capability: Capability) -> Availability {
        let missing = match capability {
            Capability::VoiceSummary => return Availability::NotImplemented,
            Capability::Notes => self.notes.is_none().then_some("notes extractor"),
            Capability::TextToSpeech => self.speech.is_none().then_some("speech synthesizer"),
            Capability::StockSentiment => {
                if self.companies.is_none() {
                    Some("company resolver")
                } else if self.sentiment.is_none() {
                    Some("sentiment analyzer")
                } else {
                    None
                }
            }
            Capability::Chat => self.chat.is_none().then_some("chat responder"),
            Capability::Mailbox => self.mailbox.is_none().then_some("mailbox"),
        };
        missing.map_or(Availability::Ready, Availability::Missing)
    }

    /// Availability of every capability, in a stable order.
    pub fn report(&self) -> Vec<(Capability, Availability)> {
        Capability::ALL
            .iter()
            .map(|cap| (*cap, self.availability(*cap)))
            .collect()
    }

    /// Number of capabilities ready to dispatch.
    pub fn ready_count(&self) -> usize {
        self.report()
            .iter()
            .filter(|(_, a)| *a == Availability::Ready)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::dispatch::result::{CompanyRef, SentimentRow};
    use crate::error::CollaboratorError;

    struct StubChat;

    #[async_trait]
    impl ChatResponder for StubChat {
        fn name(&self) -> &str {
            "stub"
        }
        async fn reply(&self, text: &str) -> Result<String, CollaboratorError> {
            Ok(text.to_string())
        }
    }

    struct StubCompanies;

    #[async_trait]
    impl CompanyResolver for StubCompanies {
        fn name(&self) -> &str {
            "stub"
        }
        async fn resolve(&self, _text: &str) -> Result<Option<CompanyRef>, CollaboratorError> {
            Ok(None)
        }
    }

    struct StubSentiment;

    #[async_trait]
    impl SentimentAnalyzer for StubSentiment {
        fn name(&self) -> &str {
            "stub"
        }
        async fn analyze(&self, _locator: &str) -> Result<Vec<SentimentRow>, CollaboratorError> {
            Ok(vec![])
        }
    }

    #[test]
    fn empty_registry_has_nothing_ready() {
        let registry = CapabilityRegistry::new();
        assert_eq!(registry.ready_count(), 0);
        assert_eq!(
            registry.availability(Capability::Chat),
            Availability::Missing("chat responder")
        );
        assert_eq!(
            registry.availability(Capability::VoiceSummary),
            Availability::NotImplemented
        );
    }

    #[test]
    fn registered_collaborator_makes_capability_ready() {
        let registry = CapabilityRegistry::new().with_chat(Arc::new(StubChat));
        assert_eq!(registry.availability(Capability::Chat), Availability::Ready);
        assert_eq!(registry.ready_count(), 1);
        assert!(registry.chat().is_some());
    }

    #[test]
    fn stock_sentiment_needs_both_collaborators() {
        let registry = CapabilityRegistry::new().with_company_resolver(Arc::new(StubCompanies));
        assert_eq!(
            registry.availability(Capability::StockSentiment),
            Availability::Missing("sentiment analyzer")
        );

        let registry = registry.with_sentiment(Arc::new(StubSentiment));
        assert_eq!(
            registry.availability(Capability::StockSentiment),
            Availability::Ready
        );
    }

    #[test]
    fn report_covers_every_capability() {
        let report = CapabilityRegistry::new().report();
        assert_eq!(report.len(), Capability::ALL.len());
    }
}
