//! Per-message summaries for the summarize action.

use crate::dispatch::{ChatResponder, MessageRecord};
use crate::error::CollaboratorError;

const SUMMARY_PROMPT: &str = "Summarize this email in at most two sentences. \
Mention any request or deadline. Reply with the summary only.\n\n";

/// Sentences kept when no chat model is available.
const LEAD_SENTENCES: usize = 2;

/// Replace each record's body with a summary in `snippet`.
///
/// Uses `chat` when given, otherwise the message's leading sentences.
/// Records without a body keep their snippet.
pub async fn summarize(
    records: Vec<MessageRecord>,
    chat: Option<&dyn ChatResponder>,
) -> Result<Vec<MessageRecord>, CollaboratorError> {
    let mut out = Vec::with_capacity(records.len());
    for mut record in records {
        if let Some(body) = record.body.take() {
            let summary = match chat {
                Some(chat) => chat.reply(&prompt(&record, &body)).await?.trim().to_string(),
                None => lead_sentences(&body, LEAD_SENTENCES),
            };
            record.snippet = Some(summary).filter(|s| !s.is_empty());
        }
        out.push(record);
    }
    Ok(out)
}

fn prompt(record: &MessageRecord, body: &str) -> String {
    let mut prompt = SUMMARY_PROMPT.to_string();
    if let Some(sender) = &record.sender {
        prompt.push_str(&format!("From: {sender}\n"));
    }
    if let Some(subject) = &record.subject {
        prompt.push_str(&format!("Subject: {subject}\n"));
    }
    prompt.push('\n');
    prompt.push_str(body);
    prompt
}

/// First `n` sentences of `text`, whitespace collapsed.
pub fn lead_sentences(text: &str, n: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut end = flat.len();
    let mut seen = 0;
    for (i, ch) in flat.char_indices() {
        if matches!(ch, '.' | '!' | '?') && flat[i + 1..].starts_with(' ') {
            seen += 1;
            if seen == n {
                end = i + 1;
                break;
            }
        }
    }
    flat[..end].to_string()
}
