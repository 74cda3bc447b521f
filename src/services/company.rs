//! Company name extraction over the chat collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::dispatch::{ChatResponder, CompanyRef, CompanyResolver};
use crate::error::CollaboratorError;
use crate::services::extract_json;

const NEWS_SEARCH_URL: &str = "https://news.google.com/rss/search";

const EXTRACTION_PROMPT: &str = "Identify the publicly traded company the user is asking about. \
Respond with ONLY a JSON object: {\"company\": \"<name>\"}. \
If no company is named, respond with {\"company\": null}.\n\nUser message: ";

#[derive(Debug, Deserialize)]
struct Extraction {
    #[serde(default)]
    company: Option<String>,
}

/// Asks the chat model for a company name, then points at a news search feed.
pub struct LlmCompanyResolver {
    chat: Arc<dyn ChatResponder>,
}

impl LlmCompanyResolver {
    pub fn new(chat: Arc<dyn ChatResponder>) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl CompanyResolver for LlmCompanyResolver {
    fn name(&self) -> &str {
        "llm-company-resolver"
    }

    async fn resolve(&self, text: &str) -> Result<Option<CompanyRef>, CollaboratorError> {
        let raw = self
            .chat
            .reply(&format!("{EXTRACTION_PROMPT}{text}"))
            .await?;

        let extraction: Extraction = serde_json::from_str(&extract_json(&raw, '{', '}'))
            .map_err(|e| {
                CollaboratorError::invalid_response(self.name(), format!("JSON parse error: {e}"))
            })?;

        let Some(name) = extraction
            .company
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
        else {
            return Ok(None);
        };

        let locator = news_locator(&name)?;
        tracing::debug!(company = %name, "Extracted company name");
        Ok(Some(CompanyRef { name, locator }))
    }
}

/// News search feed URL for a company.
pub fn news_locator(company: &str) -> Result<String, CollaboratorError> {
    let url = reqwest::Url::parse_with_params(
        NEWS_SEARCH_URL,
        &[
            ("q", format!("{company} stock")),
            ("hl", "en-US".to_string()),
            ("gl", "US".to_string()),
            ("ceid", "US:en".to_string()),
        ],
    )
    .map_err(|e| CollaboratorError::InvalidInput(format!("bad news locator: {e}")))?;
    Ok(url.into())
}
