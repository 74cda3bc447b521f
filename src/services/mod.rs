//! Collaborator implementations backed by hosted services.
//!
//! - **Chat**: Anthropic or OpenAI through rig-core
//! - **Company names**: JSON extraction over the chat collaborator
//! - **News sentiment**: a news RSS feed, headlines labelled by the chat collaborator
//! - **Speech**: an OpenAI-compatible `/v1/audio/speech` endpoint

pub mod chat;
pub mod company;
pub mod sentiment;
pub mod speech;

pub use chat::{RigChat, create_chat};
pub use company::LlmCompanyResolver;
pub use sentiment::NewsSentiment;
pub use speech::HttpSpeech;

/// Extract a JSON value delimited by `open`/`close` from model output,
/// tolerating code fences and surrounding prose.
pub(crate) fn extract_json(text: &str, open: char, close: char) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with(open) {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```") {
        let after = trimmed[start + 3..].trim_start_matches("json");
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with(open) {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close))
        && start < end
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
