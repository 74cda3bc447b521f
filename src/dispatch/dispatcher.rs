//! Capability dispatcher: routes a resolved intent to its collaborators.
//!
//! **Core invariant: dispatch never fails outward.** Any collaborator failure,
//! timeouts and panics included, becomes a `CapabilityResult::Failure` tagged
//! with the capability it came from. At most one capability runs per call.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::dispatch::Capability;
use crate::dispatch::registry::{Availability, CapabilityRegistry};
use crate::dispatch::result::{
    Attachment, CapabilityPayload, CapabilityResult, MailboxReply,
};
use crate::error::{CapabilityError, CollaboratorError};
use crate::intent::{IntentLabel, SubIntentLabel, Utterance};

pub struct CapabilityDispatcher {
    registry: CapabilityRegistry,
    timeout: Option<Duration>,
}

impl CapabilityDispatcher {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Bound every collaborator call. Expiry is reported, never retried.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Dispatch one resolved utterance.
    pub async fn dispatch(
        &self,
        intent: IntentLabel,
        sub_intent: Option<SubIntentLabel>,
        utterance: &Utterance,
        attachment: Option<&Attachment>,
    ) -> CapabilityResult {
        let result = self.route(intent, sub_intent, utterance, attachment).await;

        match &result {
            CapabilityResult::Failure(e) => warn!(
                utterance_id = %utterance.id,
                intent = %intent,
                outcome = result.label(),
                error = %e,
                "Dispatch failed"
            ),
            _ => info!(
                utterance_id = %utterance.id,
                intent = %intent,
                outcome = result.label(),
                "Dispatch complete"
            ),
        }
        result
    }

    async fn route(
        &self,
        intent: IntentLabel,
        sub_intent: Option<SubIntentLabel>,
        utterance: &Utterance,
        attachment: Option<&Attachment>,
    ) -> CapabilityResult {
        let Some(capability) = Capability::for_intent(intent) else {
            return CapabilityError::UnrecognizedIntent.into();
        };

        match self.registry.availability(capability) {
            Availability::Ready => {}
            Availability::NotImplemented => {
                return CapabilityResult::NotImplemented { capability };
            }
            Availability::Missing(what) => {
                debug!(capability = %capability, missing = what, "Capability unavailable");
                return CapabilityError::Unavailable { capability }.into();
            }
        }

        let text = utterance.text();
        let outcome = match capability {
            Capability::Notes => self.make_notes(attachment).await,
            Capability::TextToSpeech => self.convert_to_audio(text).await,
            Capability::StockSentiment => self.stock_sentiment(text).await,
            Capability::Chat => self.chat(text).await,
            Capability::Mailbox => self.mailbox(text, sub_intent).await,
            Capability::VoiceSummary => Ok(CapabilityResult::NotImplemented { capability }),
        };
        outcome.unwrap_or_else(CapabilityResult::Failure)
    }

    // ── Capabilities ────────────────────────────────────────────────

    async fn make_notes(
        &self,
        attachment: Option<&Attachment>,
    ) -> Result<CapabilityResult, CapabilityError> {
        let capability = Capability::Notes;
        let image = match attachment {
            Some(a) if a.is_image() => a,
            Some(a) => {
                return Err(CapabilityError::Precondition {
                    capability,
                    reason: format!(
                        "Please upload a valid image file (got {}).",
                        a.media_type
                    ),
                });
            }
            None => {
                return Err(CapabilityError::Precondition {
                    capability,
                    reason: "Please upload a valid image file.".into(),
                });
            }
        };
        let Some(extractor) = self.registry.notes() else {
            return Err(CapabilityError::Unavailable { capability });
        };

        let text = self
            .call(extractor.name(), extractor.extract_notes(image))
            .await
            .map_err(|source| CapabilityError::Collaborator { capability, source })?;

        if text.trim().is_empty() {
            return Ok(CapabilityResult::Empty {
                capability,
                message: "No text was found in the image.".into(),
            });
        }

        // Speech is a second, independently failable step.
        let (audio, advisory) = match self.registry.speech() {
            None => (
                None,
                Some("Text to speech is not configured; notes returned without audio.".into()),
            ),
            Some(speech) => match self.call(speech.name(), speech.synthesize(&text)).await {
                Ok(clip) => (Some(clip), None),
                Err(e) => {
                    warn!(error = %e, "Audio generation failed, returning notes only");
                    (
                        None,
                        Some("Notes extracted, but audio generation failed.".into()),
                    )
                }
            },
        };

        Ok(CapabilityResult::Success(CapabilityPayload::Notes {
            text,
            audio,
            advisory,
        }))
    }

    async fn convert_to_audio(&self, text: &str) -> Result<CapabilityResult, CapabilityError> {
        let capability = Capability::TextToSpeech;
        let Some(speech) = self.registry.speech() else {
            return Err(CapabilityError::Unavailable { capability });
        };
        let clip = self
            .call(speech.name(), speech.synthesize(text))
            .await
            .map_err(|source| CapabilityError::Collaborator { capability, source })?;
        Ok(CapabilityResult::Success(CapabilityPayload::Audio(clip)))
    }

    async fn stock_sentiment(&self, text: &str) -> Result<CapabilityResult, CapabilityError> {
        let capability = Capability::StockSentiment;
        let (Some(companies), Some(sentiment)) =
            (self.registry.company_resolver(), self.registry.sentiment())
        else {
            return Err(CapabilityError::Unavailable { capability });
        };

        let company = self
            .call(companies.name(), companies.resolve(text))
            .await
            .map_err(|source| CapabilityError::Collaborator { capability, source })?
            .filter(|c| !c.name.trim().is_empty() && !c.locator.trim().is_empty())
            .ok_or_else(|| CapabilityError::Precondition {
                capability,
                reason: "Could not extract a valid company name. Try again.".into(),
            })?;

        debug!(company = %company.name, locator = %company.locator, "Company resolved");

        let rows = self
            .call(sentiment.name(), sentiment.analyze(&company.locator))
            .await
            .map_err(|source| CapabilityError::Collaborator { capability, source })?;

        if rows.is_empty() {
            return Ok(CapabilityResult::Empty {
                capability,
                message: format!("No news articles found for `{}`.", company.name),
            });
        }

        Ok(CapabilityResult::Success(CapabilityPayload::Sentiment {
            company: company.name,
            rows,
        }))
    }

    async fn chat(&self, text: &str) -> Result<CapabilityResult, CapabilityError> {
        let capability = Capability::Chat;
        let Some(chat) = self.registry.chat() else {
            return Err(CapabilityError::Unavailable { capability });
        };
        let reply = self
            .call(chat.name(), chat.reply(text))
            .await
            .map_err(|source| CapabilityError::Collaborator { capability, source })?;
        Ok(CapabilityResult::Success(CapabilityPayload::Chat { reply }))
    }

    async fn mailbox(
        &self,
        text: &str,
        sub_intent: Option<SubIntentLabel>,
    ) -> Result<CapabilityResult, CapabilityError> {
        let capability = Capability::Mailbox;
        let Some(mailbox) = self.registry.mailbox() else {
            return Err(CapabilityError::Unavailable { capability });
        };

        let action = sub_intent
            .unwrap_or(SubIntentLabel::Unspecified)
            .or_default_action();
        debug!(action = %action, "Running mailbox action");

        let reply = self
            .call(mailbox.name(), mailbox.execute(text, action))
            .await
            .map_err(|source| CapabilityError::Collaborator { capability, source })?;

        if action.returns_records() != matches!(reply, MailboxReply::Records { .. }) {
            warn!(action = %action, "Mailbox reply shape does not match the action");
        }
        let payload = match reply {
            MailboxReply::Records { records } => CapabilityPayload::Messages { action, records },
            MailboxReply::Status { status } => CapabilityPayload::MailStatus { action, status },
        };
        Ok(CapabilityResult::Success(payload))
    }

    // ── Collaborator calls ──────────────────────────────────────────

    /// Await a collaborator call under the configured timeout, converting a
    /// panic into an error.
    async fn call<T, F>(&self, service: &str, fut: F) -> Result<T, CollaboratorError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        let guarded = AssertUnwindSafe(fut).catch_unwind();
        let outcome = match self.timeout {
            Some(after) => match tokio::time::timeout(after, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(CollaboratorError::Timeout {
                        service: service.to_string(),
                        after,
                    });
                }
            },
            None => guarded.await,
        };
        outcome.unwrap_or_else(|_| {
            Err(CollaboratorError::request_failed(
                service,
                "collaborator panicked",
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::dispatch::collaborators::{
        ChatResponder, CompanyResolver, Mailbox, NotesExtractor, SentimentAnalyzer,
        SpeechSynthesizer,
    };
    use crate::dispatch::result::{AudioClip, CompanyRef, MessageRecord, SentimentRow};

    // ── Spies ───────────────────────────────────────────────────────

    #[derive(Default)]
    struct Calls(AtomicUsize);

    impl Calls {
        fn hit(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct SpyNotes {
        calls: Arc<Calls>,
        text: &'static str,
    }

    #[async_trait]
    impl NotesExtractor for SpyNotes {
        fn name(&self) -> &str {
            "spy-ocr"
        }
        async fn extract_notes(&self, _image: &Attachment) -> Result<String, CollaboratorError> {
            self.calls.hit();
            Ok(self.text.to_string())
        }
    }

    struct SpySpeech {
        calls: Arc<Calls>,
        fail: bool,
    }

    #[async_trait]
    impl SpeechSynthesizer for SpySpeech {
        fn name(&self) -> &str {
            "spy-tts"
        }
        async fn synthesize(&self, text: &str) -> Result<AudioClip, CollaboratorError> {
            self.calls.hit();
            if self.fail {
                return Err(CollaboratorError::request_failed("spy-tts", "engine offline"));
            }
            Ok(AudioClip {
                bytes: text.as_bytes().to_vec(),
                media_type: "audio/mpeg".into(),
            })
        }
    }

    struct StubCompanies(Option<CompanyRef>);

    #[async_trait]
    impl CompanyResolver for StubCompanies {
        fn name(&self) -> &str {
            "stub-names"
        }
        async fn resolve(&self, _text: &str) -> Result<Option<CompanyRef>, CollaboratorError> {
            Ok(self.0.clone())
        }
    }

    struct SpySentiment {
        calls: Arc<Calls>,
        rows: Vec<SentimentRow>,
    }

    #[async_trait]
    impl SentimentAnalyzer for SpySentiment {
        fn name(&self) -> &str {
            "spy-sentiment"
        }
        async fn analyze(&self, _locator: &str) -> Result<Vec<SentimentRow>, CollaboratorError> {
            self.calls.hit();
            Ok(self.rows.clone())
        }
    }

    struct EchoChat {
        calls: Arc<Calls>,
    }

    #[async_trait]
    impl ChatResponder for EchoChat {
        fn name(&self) -> &str {
            "echo"
        }
        async fn reply(&self, text: &str) -> Result<String, CollaboratorError> {
            self.calls.hit();
            Ok(format!("you said: {text}"))
        }
    }

    struct BrokenChat;

    #[async_trait]
    impl ChatResponder for BrokenChat {
        fn name(&self) -> &str {
            "broken"
        }
        async fn reply(&self, _text: &str) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::request_failed("broken", "connection refused"))
        }
    }

    struct PanickingChat;

    #[async_trait]
    impl ChatResponder for PanickingChat {
        fn name(&self) -> &str {
            "panicky"
        }
        async fn reply(&self, _text: &str) -> Result<String, CollaboratorError> {
            panic!("model exploded")
        }
    }

    struct SlowChat;

    #[async_trait]
    impl ChatResponder for SlowChat {
        fn name(&self) -> &str {
            "slow"
        }
        async fn reply(&self, _text: &str) -> Result<String, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".into())
        }
    }

    struct SpyMailbox {
        calls: Arc<Calls>,
        seen: std::sync::Mutex<Vec<SubIntentLabel>>,
    }

    #[async_trait]
    impl Mailbox for SpyMailbox {
        fn name(&self) -> &str {
            "spy-mail"
        }
        async fn execute(
            &self,
            _text: &str,
            action: SubIntentLabel,
        ) -> Result<MailboxReply, CollaboratorError> {
            self.calls.hit();
            self.seen.lock().unwrap().push(action);
            if action == SubIntentLabel::Send {
                return Ok(MailboxReply::Status {
                    status: "Email sent to bob@example.com".into(),
                });
            }
            Ok(MailboxReply::Records {
                records: vec![MessageRecord {
                    sender: Some("alice@example.com".into()),
                    subject: Some("Quarterly numbers".into()),
                    ..Default::default()
                }],
            })
        }
    }

    fn image() -> Attachment {
        Attachment::new(vec![0x89, 0x50, 0x4e, 0x47], "image/png")
    }

    fn tesla() -> Option<CompanyRef> {
        Some(CompanyRef {
            name: "Tesla".into(),
            locator: "https://news.example.com/rss?q=Tesla".into(),
        })
    }

    fn row() -> SentimentRow {
        SentimentRow {
            headline: "Tesla beats delivery estimates".into(),
            link: None,
            label: "positive".into(),
            score: 0.8,
        }
    }

    async fn run(
        dispatcher: &CapabilityDispatcher,
        intent: IntentLabel,
        text: &str,
        attachment: Option<&Attachment>,
    ) -> CapabilityResult {
        dispatcher
            .dispatch(intent, None, &Utterance::new(text), attachment)
            .await
    }

    // ── make_notes ──────────────────────────────────────────────────

    #[tokio::test]
    async fn make_notes_without_attachment_calls_nothing() {
        let calls = Arc::new(Calls::default());
        let registry = CapabilityRegistry::new()
            .with_notes(Arc::new(SpyNotes {
                calls: Arc::clone(&calls),
                text: "notes",
            }))
            .with_speech(Arc::new(SpySpeech {
                calls: Arc::clone(&calls),
                fail: false,
            }));
        let dispatcher = CapabilityDispatcher::new(registry);

        let result = run(&dispatcher, IntentLabel::MakeNotes, "make notes", None).await;
        assert!(matches!(
            result,
            CapabilityResult::Failure(CapabilityError::Precondition { .. })
        ));
        assert_eq!(calls.count(), 0);
    }

    #[tokio::test]
    async fn make_notes_rejects_non_image() {
        let calls = Arc::new(Calls::default());
        let registry = CapabilityRegistry::new().with_notes(Arc::new(SpyNotes {
            calls: Arc::clone(&calls),
            text: "notes",
        }));
        let dispatcher = CapabilityDispatcher::new(registry);
        let audio = Attachment::new(vec![1], "audio/wav");

        let result = run(&dispatcher, IntentLabel::MakeNotes, "make notes", Some(&audio)).await;
        match result {
            CapabilityResult::Failure(CapabilityError::Precondition { reason, .. }) => {
                assert!(reason.contains("audio/wav"));
            }
            other => panic!("Expected Precondition, got {:?}", other),
        }
        assert_eq!(calls.count(), 0);
    }

    #[tokio::test]
    async fn make_notes_with_audio() {
        let calls = Arc::new(Calls::default());
        let registry = CapabilityRegistry::new()
            .with_notes(Arc::new(SpyNotes {
                calls: Arc::clone(&calls),
                text: "Lecture 3: ownership",
            }))
            .with_speech(Arc::new(SpySpeech {
                calls: Arc::clone(&calls),
                fail: false,
            }));
        let dispatcher = CapabilityDispatcher::new(registry);

        let result = run(&dispatcher, IntentLabel::MakeNotes, "notes", Some(&image())).await;
        match result {
            CapabilityResult::Success(CapabilityPayload::Notes {
                text,
                audio,
                advisory,
            }) => {
                assert_eq!(text, "Lecture 3: ownership");
                assert!(audio.is_some());
                assert!(advisory.is_none());
            }
            other => panic!("Expected Notes, got {:?}", other),
        }
        assert_eq!(calls.count(), 2);
    }

    #[tokio::test]
    async fn speech_failure_keeps_extracted_notes() {
        let calls = Arc::new(Calls::default());
        let registry = CapabilityRegistry::new()
            .with_notes(Arc::new(SpyNotes {
                calls: Arc::clone(&calls),
                text: "Lecture 3: ownership",
            }))
            .with_speech(Arc::new(SpySpeech {
                calls: Arc::clone(&calls),
                fail: true,
            }));
        let dispatcher = CapabilityDispatcher::new(registry);

        let result = run(&dispatcher, IntentLabel::MakeNotes, "notes", Some(&image())).await;
        match result {
            CapabilityResult::Success(CapabilityPayload::Notes {
                text,
                audio,
                advisory,
            }) => {
                assert_eq!(text, "Lecture 3: ownership");
                assert!(audio.is_none());
                assert!(advisory.unwrap().contains("audio generation failed"));
            }
            other => panic!("Expected partial Notes, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_notes_are_empty_not_failure() {
        let calls = Arc::new(Calls::default());
        let registry = CapabilityRegistry::new()
            .with_notes(Arc::new(SpyNotes {
                calls: Arc::clone(&calls),
                text: "   ",
            }))
            .with_speech(Arc::new(SpySpeech {
                calls: Arc::clone(&calls),
                fail: false,
            }));
        let dispatcher = CapabilityDispatcher::new(registry);

        let result = run(&dispatcher, IntentLabel::MakeNotes, "notes", Some(&image())).await;
        assert_eq!(result.label(), "empty");
        // Speech is skipped when there is nothing to read.
        assert_eq!(calls.count(), 1);
    }

    // ── availability ────────────────────────────────────────────────

    #[tokio::test]
    async fn unavailable_capability_touches_nothing() {
        let calls = Arc::new(Calls::default());
        // Only speech registered: notes extractor missing.
        let registry = CapabilityRegistry::new().with_speech(Arc::new(SpySpeech {
            calls: Arc::clone(&calls),
            fail: false,
        }));
        let dispatcher = CapabilityDispatcher::new(registry);

        let result = run(&dispatcher, IntentLabel::MakeNotes, "notes", Some(&image())).await;
        assert!(matches!(
            result,
            CapabilityResult::Failure(CapabilityError::Unavailable {
                capability: Capability::Notes
            })
        ));

        let result = run(&dispatcher, IntentLabel::GeneralChat, "hi", None).await;
        assert!(matches!(
            result,
            CapabilityResult::Failure(CapabilityError::Unavailable {
                capability: Capability::Chat
            })
        ));
        assert_eq!(calls.count(), 0);
    }

    #[tokio::test]
    async fn voice_summary_is_not_implemented() {
        let dispatcher = CapabilityDispatcher::new(CapabilityRegistry::new());
        let result = run(&dispatcher, IntentLabel::VoiceSummary, "summarize audio", None).await;
        assert!(matches!(
            result,
            CapabilityResult::NotImplemented {
                capability: Capability::VoiceSummary
            }
        ));
        assert!(result.failure().is_none());
    }

    #[tokio::test]
    async fn unknown_intent_is_unrecognized() {
        let calls = Arc::new(Calls::default());
        let registry = CapabilityRegistry::new().with_chat(Arc::new(EchoChat {
            calls: Arc::clone(&calls),
        }));
        let dispatcher = CapabilityDispatcher::new(registry);

        let result = run(&dispatcher, IntentLabel::Unknown, "asdkjh", None).await;
        assert!(matches!(
            result,
            CapabilityResult::Failure(CapabilityError::UnrecognizedIntent)
        ));
        assert_eq!(calls.count(), 0);
    }

    // ── convert_to_audio ────────────────────────────────────────────

    #[tokio::test]
    async fn converts_utterance_to_audio() {
        let calls = Arc::new(Calls::default());
        let registry = CapabilityRegistry::new().with_speech(Arc::new(SpySpeech {
            calls: Arc::clone(&calls),
            fail: false,
        }));
        let dispatcher = CapabilityDispatcher::new(registry);

        let result = run(&dispatcher, IntentLabel::ConvertToAudio, "read this aloud", None).await;
        match result {
            CapabilityResult::Success(CapabilityPayload::Audio(clip)) => {
                assert_eq!(clip.bytes, b"read this aloud".to_vec());
            }
            other => panic!("Expected Audio, got {:?}", other),
        }
    }

    // ── stock_sentiment ─────────────────────────────────────────────

    fn stock_dispatcher(
        company: Option<CompanyRef>,
        rows: Vec<SentimentRow>,
    ) -> (CapabilityDispatcher, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let registry = CapabilityRegistry::new()
            .with_company_resolver(Arc::new(StubCompanies(company)))
            .with_sentiment(Arc::new(SpySentiment {
                calls: Arc::clone(&calls),
                rows,
            }));
        (CapabilityDispatcher::new(registry), calls)
    }

    #[tokio::test]
    async fn no_articles_is_empty_result() {
        let (dispatcher, calls) = stock_dispatcher(tesla(), vec![]);
        let result = run(
            &dispatcher,
            IntentLabel::StockSentiment,
            "read me the news on Tesla",
            None,
        )
        .await;
        match result {
            CapabilityResult::Empty {
                capability,
                message,
            } => {
                assert_eq!(capability, Capability::StockSentiment);
                assert!(message.contains("Tesla"));
            }
            other => panic!("Expected Empty, got {:?}", other),
        }
        assert_eq!(calls.count(), 1);
    }

    #[tokio::test]
    async fn sentiment_rows_are_returned() {
        let (dispatcher, _) = stock_dispatcher(tesla(), vec![row()]);
        let result = run(&dispatcher, IntentLabel::StockSentiment, "tesla stock", None).await;
        match result {
            CapabilityResult::Success(CapabilityPayload::Sentiment { company, rows }) => {
                assert_eq!(company, "Tesla");
                assert_eq!(rows, vec![row()]);
            }
            other => panic!("Expected Sentiment, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_company_is_precondition_failure() {
        let (dispatcher, calls) = stock_dispatcher(None, vec![row()]);
        let result = run(&dispatcher, IntentLabel::StockSentiment, "stock news", None).await;
        assert!(matches!(
            result,
            CapabilityResult::Failure(CapabilityError::Precondition { .. })
        ));
        assert_eq!(calls.count(), 0);

        let blank = Some(CompanyRef {
            name: "Tesla".into(),
            locator: " ".into(),
        });
        let (dispatcher, calls) = stock_dispatcher(blank, vec![row()]);
        let result = run(&dispatcher, IntentLabel::StockSentiment, "stock news", None).await;
        assert_eq!(result.label(), "precondition");
        assert_eq!(calls.count(), 0);
    }

    // ── general_chat ────────────────────────────────────────────────

    #[tokio::test]
    async fn chat_is_idempotent_with_deterministic_stub() {
        let calls = Arc::new(Calls::default());
        let registry = CapabilityRegistry::new().with_chat(Arc::new(EchoChat {
            calls: Arc::clone(&calls),
        }));
        let dispatcher = CapabilityDispatcher::new(registry);

        let first = run(&dispatcher, IntentLabel::GeneralChat, "hello", None).await;
        let second = run(&dispatcher, IntentLabel::GeneralChat, "hello", None).await;

        assert_eq!(first.payload(), second.payload());
        assert_eq!(
            first.payload(),
            Some(&CapabilityPayload::Chat {
                reply: "you said: hello".into()
            })
        );
        assert_eq!(calls.count(), 2);
    }

    #[tokio::test]
    async fn collaborator_error_is_tagged_with_capability() {
        let registry = CapabilityRegistry::new().with_chat(Arc::new(BrokenChat));
        let dispatcher = CapabilityDispatcher::new(registry);

        let result = run(&dispatcher, IntentLabel::GeneralChat, "hello", None).await;
        match result.failure() {
            Some(CapabilityError::Collaborator { capability, source }) => {
                assert_eq!(*capability, Capability::Chat);
                assert!(source.to_string().contains("connection refused"));
            }
            other => panic!("Expected Collaborator failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn collaborator_panic_is_contained() {
        let registry = CapabilityRegistry::new().with_chat(Arc::new(PanickingChat));
        let dispatcher = CapabilityDispatcher::new(registry);

        let result = run(&dispatcher, IntentLabel::GeneralChat, "hello", None).await;
        assert_eq!(result.label(), "collaborator");
    }

    #[tokio::test]
    async fn slow_collaborator_times_out() {
        let registry = CapabilityRegistry::new().with_chat(Arc::new(SlowChat));
        let dispatcher =
            CapabilityDispatcher::new(registry).with_timeout(Some(Duration::from_millis(50)));

        let result = run(&dispatcher, IntentLabel::GeneralChat, "hello", None).await;
        assert!(matches!(
            result.failure(),
            Some(CapabilityError::Collaborator {
                source: CollaboratorError::Timeout { .. },
                ..
            })
        ));
    }

    // ── mailbox ─────────────────────────────────────────────────────

    fn mail_dispatcher() -> (CapabilityDispatcher, Arc<SpyMailbox>) {
        let mailbox = Arc::new(SpyMailbox {
            calls: Arc::new(Calls::default()),
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let registry = CapabilityRegistry::new().with_mailbox(mailbox.clone());
        (CapabilityDispatcher::new(registry), mailbox)
    }

    #[tokio::test]
    async fn unspecified_mailbox_action_defaults_to_read() {
        let (dispatcher, mailbox) = mail_dispatcher();
        for sub_intent in [None, Some(SubIntentLabel::Unspecified)] {
            let result = dispatcher
                .dispatch(
                    IntentLabel::MailboxOperations,
                    sub_intent,
                    &Utterance::new("gmail"),
                    None,
                )
                .await;
            assert!(matches!(
                result,
                CapabilityResult::Success(CapabilityPayload::Messages {
                    action: SubIntentLabel::Read,
                    ..
                })
            ));
        }
        assert_eq!(
            *mailbox.seen.lock().unwrap(),
            vec![SubIntentLabel::Read, SubIntentLabel::Read]
        );
    }

    #[tokio::test]
    async fn send_returns_status() {
        let (dispatcher, mailbox) = mail_dispatcher();
        let result = dispatcher
            .dispatch(
                IntentLabel::MailboxOperations,
                Some(SubIntentLabel::Send),
                &Utterance::new("send an email to bob@example.com"),
                None,
            )
            .await;
        match result {
            CapabilityResult::Success(CapabilityPayload::MailStatus { action, status }) => {
                assert_eq!(action, SubIntentLabel::Send);
                assert!(status.contains("bob@example.com"));
            }
            other => panic!("Expected MailStatus, got {:?}", other),
        }
        assert_eq!(mailbox.calls.count(), 1);
    }

    #[tokio::test]
    async fn search_returns_records() {
        let (dispatcher, _) = mail_dispatcher();
        let result = dispatcher
            .dispatch(
                IntentLabel::MailboxOperations,
                Some(SubIntentLabel::Search),
                &Utterance::new("find emails from alice"),
                None,
            )
            .await;
        match result.payload() {
            Some(CapabilityPayload::Messages { records, .. }) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].subject.as_deref(), Some("Quarterly numbers"));
                assert!(records[0].body.is_none());
            }
            other => panic!("Expected Messages, got {:?}", other),
        }
    }
}
