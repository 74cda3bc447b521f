//! IMAP/SMTP mailbox collaborator.
//!
//! Read, search and summarize fetch from INBOX over IMAP (read-only, flags
//! untouched); send composes a message from the utterance and delivers it
//! over SMTP. All protocol work is blocking and runs on `spawn_blocking`.

pub mod config;
pub mod imap;
pub mod parse;
pub mod send;
pub mod summary;

pub use config::MailboxConfig;

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use secrecy::ExposeSecret;

use crate::dispatch::{ChatResponder, Mailbox, MailboxReply, MessageRecord};
use crate::error::{CollaboratorError, MailboxError};
use crate::intent::SubIntentLabel;

use imap::ImapSession;

const IO_TIMEOUT: Duration = Duration::from_secs(30);

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("valid regex"));

static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(for|about|from|regarding|containing|mentioning|with)\s+")
        .expect("valid regex")
});

/// What a search request asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTerms {
    pub from: Option<String>,
    pub text: Option<String>,
}

/// Which messages to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Selection {
    Recent,
    Matching(SearchTerms),
}

pub struct ImapMailbox {
    config: Arc<MailboxConfig>,
    summarizer: Option<Arc<dyn ChatResponder>>,
}

impl ImapMailbox {
    pub fn new(config: MailboxConfig) -> Self {
        Self {
            config: Arc::new(config),
            summarizer: None,
        }
    }

    /// Summarize with a chat model instead of each message's leading sentences.
    pub fn with_summarizer(mut self, chat: Arc<dyn ChatResponder>) -> Self {
        self.summarizer = Some(chat);
        self
    }

    async fn records(
        &self,
        selection: Selection,
        include_body: bool,
    ) -> Result<Vec<MessageRecord>, CollaboratorError> {
        let config = Arc::clone(&self.config);
        let records = tokio::task::spawn_blocking(move || {
            fetch_records(&config, &selection, include_body)
        })
        .await
        .map_err(|e| CollaboratorError::request_failed("imap", format!("task failed: {e}")))??;
        Ok(records)
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    fn name(&self) -> &str {
        "imap"
    }

    async fn execute(
        &self,
        text: &str,
        action: SubIntentLabel,
    ) -> Result<MailboxReply, CollaboratorError> {
        let records = match action {
            SubIntentLabel::Send => {
                let mail = send::compose(text)?;
                let config = Arc::clone(&self.config);
                let to = mail.to.clone();
                tokio::task::spawn_blocking(move || send::send(&config, &mail))
                    .await
                    .map_err(|e| {
                        CollaboratorError::request_failed("smtp", format!("task failed: {e}"))
                    })??;
                return Ok(MailboxReply::Status {
                    status: format!("Email sent to {to}."),
                });
            }
            SubIntentLabel::Search => {
                let terms = search_terms(text).ok_or_else(|| {
                    CollaboratorError::InvalidInput("Tell me what to search for.".into())
                })?;
                self.records(Selection::Matching(terms), false).await?
            }
            SubIntentLabel::Summarize => {
                let records = self.records(Selection::Recent, true).await?;
                summary::summarize(records, self.summarizer.as_deref()).await?
            }
            SubIntentLabel::Read | SubIntentLabel::Unspecified => {
                self.records(Selection::Recent, false).await?
            }
        };
        tracing::debug!(action = %action, count = records.len(), "Mailbox records fetched");
        Ok(MailboxReply::Records { records })
    }
}

/// Sender and free-text term of a search request.
///
/// A quoted phrase is the text term. Otherwise each keyword ("for", "about",
/// "regarding", ...) starts a term that runs to the next keyword; the one
/// after "from" is the sender.
pub fn search_terms(text: &str) -> Option<SearchTerms> {
    let quoted = QUOTED
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| clean_term(m.as_str()))
        .filter(|q| !q.is_empty());
    let rest = QUOTED.replace_all(text, " ");

    let marks: Vec<_> = KEYWORD.captures_iter(&rest).collect();
    let mut terms = SearchTerms::default();
    for (i, caps) in marks.iter().enumerate() {
        let (Some(whole), Some(keyword)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let stop = marks
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rest.len(), |m| m.start());
        let value = clean_term(&rest[whole.end()..stop]);
        if value.is_empty() || is_filler(&value) {
            continue;
        }
        let slot = if keyword.as_str().eq_ignore_ascii_case("from") {
            &mut terms.from
        } else {
            &mut terms.text
        };
        slot.get_or_insert(value);
    }
    if quoted.is_some() {
        terms.text = quoted;
    }

    (terms.from.is_some() || terms.text.is_some()).then_some(terms)
}

/// Terms that name the mailbox itself rather than what to look for.
fn is_filler(term: &str) -> bool {
    let term = term.to_ascii_lowercase();
    let term = term.strip_prefix("my ").unwrap_or(&term);
    matches!(
        term,
        "email" | "emails" | "mail" | "mails" | "message" | "messages" | "inbox"
    )
}

fn clean_term(raw: &str) -> String {
    raw.trim().trim_end_matches(['.', '?', '!', ',']).trim().to_string()
}

/// Newest `fetch_limit` messages from the selection, newest first.
fn fetch_records(
    config: &MailboxConfig,
    selection: &Selection,
    include_body: bool,
) -> Result<Vec<MessageRecord>, MailboxError> {
    let mut session = ImapSession::connect(&config.imap_host, config.imap_port, IO_TIMEOUT)?;
    session.login(&config.username, config.password.expose_secret())?;
    session.examine_inbox()?;

    let keys = match selection {
        Selection::Recent => imap::search_keys(None, None),
        Selection::Matching(terms) => {
            imap::search_keys(terms.from.as_deref(), terms.text.as_deref())
        }
    };
    let ids = session.search(&keys)?;

    let mut records = Vec::new();
    for seq in ids.iter().rev().take(config.fetch_limit) {
        match session.fetch_raw(*seq)? {
            Some(raw) => match parse::to_record(&raw, include_body) {
                Some(record) => records.push(record),
                None => tracing::warn!(seq, "Skipping unparseable message"),
            },
            None => tracing::warn!(seq, "FETCH returned no body"),
        }
    }

    session.logout();
    Ok(records)
}
