//! Text-to-speech over an OpenAI-compatible HTTP endpoint.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::config::SpeechConfig;
use crate::dispatch::{AudioClip, SpeechSynthesizer};
use crate::error::CollaboratorError;

const SERVICE: &str = "tts";

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
}

/// `POST {base_url}/v1/audio/speech`, returning the raw audio body.
pub struct HttpSpeech {
    client: reqwest::Client,
    config: SpeechConfig,
}

impl HttpSpeech {
    pub fn new(config: SpeechConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: SpeechConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/audio/speech", self.config.base_url)
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeech {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn synthesize(&self, text: &str) -> Result<AudioClip, CollaboratorError> {
        if text.trim().is_empty() {
            return Err(CollaboratorError::InvalidInput(
                "There is no text to convert to audio.".into(),
            ));
        }

        let body = SpeechRequest {
            model: &self.config.model,
            input: text,
            voice: &self.config.voice,
        };
        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| CollaboratorError::request_failed(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::request_failed(
                SERVICE,
                format!("HTTP {status}: {}", detail.trim()),
            ));
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CollaboratorError::request_failed(SERVICE, e))?;

        if bytes.is_empty() {
            return Err(CollaboratorError::invalid_response(SERVICE, "empty audio body"));
        }

        tracing::debug!(bytes = bytes.len(), media_type = %media_type, "Synthesized speech");
        Ok(AudioClip {
            bytes: bytes.to_vec(),
            media_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{http_ok, local_client, serve_once};

    fn speech(base_url: String) -> HttpSpeech {
        HttpSpeech::with_client(
            local_client(),
            SpeechConfig {
                base_url,
                api_key: Some(secrecy::SecretString::from("tts-key")),
                model: "tts-1".into(),
                voice: "alloy".into(),
            },
        )
    }

    #[tokio::test]
    async fn posts_text_and_returns_audio() {
        let (base, server) = serve_once(http_ok("audio/mpeg", b"ID3!")).await;
        let speech = speech(base);

        let clip = speech.synthesize("hello there").await.unwrap();
        assert_eq!(clip.bytes, b"ID3!".to_vec());
        assert_eq!(clip.media_type, "audio/mpeg");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/audio/speech"));
        assert!(request.to_lowercase().contains("authorization: bearer tts-key"));
        assert!(request.contains("\"input\":\"hello there\""));
        assert!(request.contains("\"voice\":\"alloy\""));
    }

    #[tokio::test]
    async fn http_error_is_request_failed() {
        let (base, _server) = serve_once(
            b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\nConnection: close\r\n\r\noops"
                .to_vec(),
        )
        .await;
        let speech = speech(base);

        let err = speech.synthesize("hello").await.unwrap_err();
        match err {
            CollaboratorError::RequestFailed { reason, .. } => {
                assert!(reason.contains("500"));
                assert!(reason.contains("oops"));
            }
            other => panic!("Expected RequestFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_text_is_rejected_before_any_request() {
        let speech = speech("http://127.0.0.1:9".into());
        let err = speech.synthesize("   ").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::InvalidInput(_)));
    }
}
