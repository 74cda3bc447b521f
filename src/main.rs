use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ai_agent::config::AgentConfig;
use ai_agent::dispatch::{
    Attachment, Availability, CapabilityDispatcher, CapabilityPayload, CapabilityRegistry,
    CapabilityResult,
};
use ai_agent::intent::{IntentRouter, Resolver, SubIntentRouter, Utterance};
use ai_agent::mailbox::ImapMailbox;
use ai_agent::services::{HttpSpeech, LlmCompanyResolver, NewsSentiment, create_chat};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let config = AgentConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let intents =
        IntentRouter::from_config(&config.classifier).context("Failed to load intent classifier")?;
    let resolver = Resolver::new(intents, SubIntentRouter::with_default_rules());
    let registry = build_registry(&config)?;

    eprintln!("🤖 AI Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Classifier: {}", resolver.intent_router().kind());
    for (capability, availability) in registry.report() {
        let state = match availability {
            Availability::Ready => "ready".to_string(),
            Availability::Missing(what) => format!("unavailable (no {what})"),
            Availability::NotImplemented => "not implemented".to_string(),
        };
        eprintln!("   {:<20} {}", capability.title(), state);
    }
    if let Some(timeout) = config.collaborator_timeout {
        eprintln!("   Collaborator timeout: {}s", timeout.as_secs());
    }
    eprintln!("   /attach <path> stages a file for the next message. /quit to exit.\n");

    let dispatcher = CapabilityDispatcher::new(registry).with_timeout(config.collaborator_timeout);
    run_repl(&resolver, &dispatcher).await;
    Ok(())
}

/// Stderr logging, plus a daily rolling file when a log directory is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "agent.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(file)
        .init();
    guard
}

/// Register every collaborator the configuration enables.
fn build_registry(config: &AgentConfig) -> anyhow::Result<CapabilityRegistry> {
    let mut registry = CapabilityRegistry::new();

    let chat = config
        .chat
        .as_ref()
        .map(create_chat)
        .transpose()
        .context("Failed to create chat client")?;
    if let Some(chat) = &chat {
        registry = registry
            .with_company_resolver(Arc::new(LlmCompanyResolver::new(Arc::clone(chat))))
            .with_sentiment(Arc::new(NewsSentiment::new(Arc::clone(chat))))
            .with_chat(Arc::clone(chat));
    }
    if let Some(speech) = &config.speech {
        registry = registry.with_speech(Arc::new(HttpSpeech::new(speech.clone())));
    }
    if let Some(mailbox) = &config.mailbox {
        let mut imap = ImapMailbox::new(mailbox.clone());
        if let Some(chat) = &chat {
            imap = imap.with_summarizer(Arc::clone(chat));
        }
        registry = registry.with_mailbox(Arc::new(imap));
    }

    Ok(registry)
}

async fn run_repl(resolver: &Resolver, dispatcher: &CapabilityDispatcher) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut staged: Option<Attachment> = None;

    eprint!("> ");
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                break;
            }
        };
        let line = line.trim();

        match line {
            "" => {}
            "/quit" => break,
            "/detach" => {
                staged = None;
                eprintln!("Attachment cleared");
            }
            _ if line.starts_with("/attach ") => {
                let path = PathBuf::from(line["/attach ".len()..].trim());
                match Attachment::from_path(&path).await {
                    Ok(attachment) => {
                        eprintln!("Attached {} ({})", path.display(), attachment.media_type);
                        staged = Some(attachment);
                    }
                    Err(e) => eprintln!("Could not read {}: {}", path.display(), e),
                }
            }
            _ => {
                let utterance = Utterance::new(line);
                let resolution = resolver.resolve(&utterance);
                let attachment = staged.take();
                let result = dispatcher
                    .dispatch(
                        resolution.intent,
                        resolution.sub_intent,
                        &utterance,
                        attachment.as_ref(),
                    )
                    .await;
                println!("\n{}\n", render(&utterance, &result).await);
            }
        }
        eprint!("> ");
    }
}

async fn render(utterance: &Utterance, result: &CapabilityResult) -> String {
    match result {
        CapabilityResult::Success(payload) => render_payload(utterance, payload).await,
        CapabilityResult::Empty { message, .. } => message.clone(),
        CapabilityResult::NotImplemented { capability } => {
            format!("{} is not implemented yet.", capability.title())
        }
        CapabilityResult::Failure(e) => e.user_message(),
    }
}

async fn render_payload(utterance: &Utterance, payload: &CapabilityPayload) -> String {
    match payload {
        CapabilityPayload::Notes {
            text,
            audio,
            advisory,
        } => {
            let mut out = format!("Extracted notes:\n{text}");
            if let Some(clip) = audio {
                let saved = save_audio(utterance, &clip.bytes, &clip.media_type).await;
                out.push_str(&format!("\n{saved}"));
            }
            if let Some(advisory) = advisory {
                out.push_str(&format!("\n({advisory})"));
            }
            out
        }
        CapabilityPayload::Audio(clip) => {
            save_audio(utterance, &clip.bytes, &clip.media_type).await
        }
        CapabilityPayload::Sentiment { company, rows } => {
            let mut out = format!("News sentiment for `{company}`:");
            for row in rows {
                out.push_str(&format!(
                    "\n  [{:<8} {:>5.2}] {}",
                    row.label, row.score, row.headline
                ));
            }
            out
        }
        CapabilityPayload::Chat { reply } => reply.clone(),
        CapabilityPayload::Messages { action, records } => {
            if records.is_empty() {
                return format!("No messages found ({action}).");
            }
            let mut out = String::new();
            for (i, record) in records.iter().enumerate() {
                out.push_str(&format!(
                    "{}. {} | {} | {}\n",
                    i + 1,
                    record.sender.as_deref().unwrap_or("(unknown sender)"),
                    record.subject.as_deref().unwrap_or("(no subject)"),
                    record.date.as_deref().unwrap_or("-"),
                ));
                if let Some(body) = &record.body {
                    out.push_str(&format!("   {}\n", body.replace('\n', "\n   ")));
                } else if let Some(snippet) = &record.snippet {
                    out.push_str(&format!("   {snippet}\n"));
                }
            }
            out.trim_end().to_string()
        }
        CapabilityPayload::MailStatus { status, .. } => status.clone(),
    }
}

/// Write audio to the temp directory and describe where it went.
async fn save_audio(utterance: &Utterance, bytes: &[u8], media_type: &str) -> String {
    let ext = mime_guess::get_mime_extensions_str(media_type)
        .and_then(|exts| exts.first())
        .copied()
        .unwrap_or("bin");
    let path = std::env::temp_dir().join(format!("agent-{}.{ext}", utterance.id));
    match tokio::fs::write(&path, bytes).await {
        Ok(()) => format!("Audio saved to {}", path.display()),
        Err(e) => format!("Audio generated ({} bytes) but could not be saved: {e}", bytes.len()),
    }
}
