//! Configuration types, built from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::intent::ClassifierBackendKind;
use crate::mailbox::MailboxConfig;

/// Intent classifier configuration.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Backend the primary router delegates to. Fixed for the process lifetime.
    pub backend: ClassifierBackendKind,
    /// JSON artifact for the statistical backend.
    pub statistical_model: PathBuf,
    /// JSON artifact for the semantic backend.
    pub semantic_model: PathBuf,
    /// Semantic predictions below this confidence are `unknown`.
    pub semantic_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackendKind::RuleBased,
            statistical_model: PathBuf::from("./model/intent_classifier_pipeline.json"),
            semantic_model: PathBuf::from("./model/intent_semantic.json"),
            semantic_threshold: 0.6,
        }
    }
}

/// Which hosted model serves general chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProvider {
    Anthropic,
    OpenAi,
}

/// Chat collaborator configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub provider: ChatProvider,
    pub api_key: SecretString,
    pub model: String,
}

/// Text-to-speech collaborator configuration.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Base URL of an OpenAI-compatible speech endpoint.
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub voice: String,
}

/// Agent configuration.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub classifier: ClassifierConfig,
    /// Optional upper bound on any single collaborator call.
    pub collaborator_timeout: Option<Duration>,
    /// Directory for a daily rolling log file, in addition to stderr.
    pub log_dir: Option<PathBuf>,
    /// `None` disables general chat (and LLM-backed name extraction).
    pub chat: Option<ChatConfig>,
    /// `None` disables text-to-speech.
    pub speech: Option<SpeechConfig>,
    /// `None` disables the mailbox.
    pub mailbox: Option<MailboxConfig>,
}

impl AgentConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build config from any variable lookup.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ClassifierConfig::default();
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let backend = match var("AGENT_CLASSIFIER") {
            Some(raw) => raw.parse().map_err(|message| ConfigError::InvalidValue {
                key: "AGENT_CLASSIFIER".into(),
                message,
            })?,
            None => defaults.backend,
        };

        let semantic_threshold = match var("AGENT_SEMANTIC_THRESHOLD") {
            Some(raw) => parse_threshold(&raw)?,
            None => defaults.semantic_threshold,
        };

        let classifier = ClassifierConfig {
            backend,
            statistical_model: var("AGENT_STATISTICAL_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.statistical_model),
            semantic_model: var("AGENT_SEMANTIC_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.semantic_model),
            semantic_threshold,
        };

        let collaborator_timeout = var("AGENT_COLLABORATOR_TIMEOUT_SECS")
            .map(|raw| parse_number::<u64>("AGENT_COLLABORATOR_TIMEOUT_SECS", &raw))
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let chat_model = var("AGENT_CHAT_MODEL");
        let chat = if let Some(key) = var("ANTHROPIC_API_KEY") {
            Some(ChatConfig {
                provider: ChatProvider::Anthropic,
                api_key: SecretString::from(key),
                model: chat_model.unwrap_or_else(|| "claude-sonnet-4-20250514".to_string()),
            })
        } else {
            var("OPENAI_API_KEY").map(|key| ChatConfig {
                provider: ChatProvider::OpenAi,
                api_key: SecretString::from(key),
                model: chat_model.unwrap_or_else(|| "gpt-4o".to_string()),
            })
        };

        let speech = var("AGENT_TTS_URL").map(|base_url| SpeechConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: var("AGENT_TTS_API_KEY").map(SecretString::from),
            model: var("AGENT_TTS_MODEL").unwrap_or_else(|| "tts-1".to_string()),
            voice: var("AGENT_TTS_VOICE").unwrap_or_else(|| "alloy".to_string()),
        });

        let mailbox = MailboxConfig::from_vars(&get)?;

        Ok(Self {
            classifier,
            collaborator_timeout,
            log_dir: var("AGENT_LOG_DIR").map(PathBuf::from),
            chat,
            speech,
            mailbox,
        })
    }
}

fn parse_threshold(raw: &str) -> Result<f32, ConfigError> {
    let value: f32 = parse_number("AGENT_SEMANTIC_THRESHOLD", raw)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidValue {
            key: "AGENT_SEMANTIC_THRESHOLD".into(),
            message: format!("{value} is outside [0, 1]"),
        });
    }
    Ok(value)
}

/// Parse a numeric variable, naming the key on failure.
pub(crate) fn parse_number<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.into(),
        message: format!("'{raw}': {e}"),
    })
}
