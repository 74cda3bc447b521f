//! News sentiment: fetch an RSS feed, label its headlines with the chat model.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::dispatch::{ChatResponder, SentimentAnalyzer, SentimentRow};
use crate::error::CollaboratorError;
use crate::services::extract_json;

const SERVICE: &str = "news";

/// Headlines sent to the model per request.
const MAX_ARTICLES: usize = 10;

const LABEL_PROMPT: &str = "Classify the market sentiment of each numbered news headline. \
Respond with ONLY a JSON array with one object per headline: \
[{\"index\": 1, \"label\": \"positive\" | \"neutral\" | \"negative\", \"score\": <confidence 0.0-1.0>}].\n\n";

static ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<item\b[^>]*>(.*?)</item>").expect("valid regex"));

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title\b[^>]*>(.*?)</title>").expect("valid regex"));

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<link\b[^>]*>(.*?)</link>").expect("valid regex"));

/// One feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    pub link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Label {
    index: usize,
    label: String,
    #[serde(default)]
    score: f32,
}

/// Sentiment over a news RSS feed, with labels from the chat collaborator.
pub struct NewsSentiment {
    client: reqwest::Client,
    chat: Arc<dyn ChatResponder>,
}

impl NewsSentiment {
    pub fn new(chat: Arc<dyn ChatResponder>) -> Self {
        Self::with_client(reqwest::Client::new(), chat)
    }

    pub fn with_client(client: reqwest::Client, chat: Arc<dyn ChatResponder>) -> Self {
        Self { client, chat }
    }

    async fn fetch_feed(&self, locator: &str) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .get(locator)
            .send()
            .await
            .map_err(|e| CollaboratorError::request_failed(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::request_failed(
                SERVICE,
                format!("HTTP {status}"),
            ));
        }
        response
            .text()
            .await
            .map_err(|e| CollaboratorError::request_failed(SERVICE, e))
    }

    async fn label(&self, headlines: &[Headline]) -> Result<Vec<SentimentRow>, CollaboratorError> {
        let mut prompt = LABEL_PROMPT.to_string();
        for (i, headline) in headlines.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, headline.title));
        }

        let raw = self.chat.reply(&prompt).await?;
        let labels: Vec<Label> = serde_json::from_str(&extract_json(&raw, '[', ']'))
            .map_err(|e| {
                CollaboratorError::invalid_response(self.name(), format!("JSON parse error: {e}"))
            })?;

        let rows: Vec<SentimentRow> = labels
            .into_iter()
            .filter_map(|l| {
                let headline = headlines.get(l.index.checked_sub(1)?)?;
                Some(SentimentRow {
                    headline: headline.title.clone(),
                    link: headline.link.clone(),
                    label: normalize_label(&l.label).to_string(),
                    score: l.score.clamp(0.0, 1.0),
                })
            })
            .collect();

        if rows.is_empty() {
            return Err(CollaboratorError::invalid_response(
                self.name(),
                "no headline was labelled",
            ));
        }
        Ok(rows)
    }
}

#[async_trait]
impl SentimentAnalyzer for NewsSentiment {
    fn name(&self) -> &str {
        "news-sentiment"
    }

    async fn analyze(&self, locator: &str) -> Result<Vec<SentimentRow>, CollaboratorError> {
        let feed = self.fetch_feed(locator).await?;
        let mut headlines = parse_feed(&feed);
        headlines.truncate(MAX_ARTICLES);
        tracing::debug!(articles = headlines.len(), "Fetched news feed");

        if headlines.is_empty() {
            return Ok(Vec::new());
        }
        self.label(&headlines).await
    }
}

/// Items of an RSS 2.0 feed that carry a non-empty title.
pub fn parse_feed(xml: &str) -> Vec<Headline> {
    ITEM.captures_iter(xml)
        .filter_map(|item| {
            let body = item.get(1)?.as_str();
            let title = field(&TITLE, body).filter(|t| !t.is_empty())?;
            let link = field(&LINK, body).filter(|l| !l.is_empty());
            Some(Headline { title, link })
        })
        .collect()
}

fn field(pattern: &Regex, body: &str) -> Option<String> {
    let raw = pattern.captures(body)?.get(1)?.as_str().trim();
    let raw = raw
        .strip_prefix("<![CDATA[")
        .and_then(|r| r.strip_suffix("]]>"))
        .unwrap_or(raw);
    Some(unescape(raw.trim()))
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn normalize_label(label: &str) -> &'static str {
    match label.trim().to_ascii_lowercase().as_str() {
        "positive" | "bullish" => "positive",
        "negative" | "bearish" => "negative",
        _ => "neutral",
    }
}
