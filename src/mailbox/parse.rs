//! Message decoding into `MessageRecord`s.

use mail_parser::{MessageParser, MimeHeaders};

use crate::dispatch::MessageRecord;

/// Snippet length, in characters.
pub const SNIPPET_CHARS: usize = 160;

/// Body length kept for summarize, in characters.
pub const BODY_CHARS: usize = 4000;

/// Decode one raw RFC 822 message. `None` if it cannot be parsed.
pub fn to_record(raw: &[u8], include_body: bool) -> Option<MessageRecord> {
    let parsed = MessageParser::default().parse(raw)?;
    let text = extract_text(&parsed);
    let text = strip_quoted_text(&text);

    let body = include_body
        .then(|| truncate(text.trim(), BODY_CHARS))
        .filter(|b| !b.is_empty());
    let snippet = Some(snippet(&text)).filter(|s| !s.is_empty());

    Some(MessageRecord {
        sender: extract_sender(&parsed),
        subject: parsed.subject().map(|s| s.trim().to_string()),
        date: parsed.date().map(|d| d.to_rfc3339()),
        snippet,
        body,
    })
}

/// `Name <address>` when a display name is present, otherwise the address.
fn extract_sender(parsed: &mail_parser::Message) -> Option<String> {
    let addr = parsed.from()?.first()?;
    match (addr.name(), addr.address()) {
        (Some(name), Some(address)) => Some(format!("{name} <{address}>")),
        (None, Some(address)) => Some(address.to_string()),
        (Some(name), None) => Some(name.to_string()),
        (None, None) => None,
    }
}

/// Readable text: plain part, else stripped HTML, else the first text attachment.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    for part in parsed.attachments() {
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return text.to_string();
        }
    }
    String::new()
}

/// Strip HTML tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop quoted reply history (`>` lines, "On ... wrote:" and everything after).
pub fn strip_quoted_text(body: &str) -> String {
    let mut kept = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('>') {
            continue;
        }
        if (trimmed.starts_with("On ") && trimmed.ends_with("wrote:"))
            || (trimmed.starts_with("---") && trimmed.contains("Original Message"))
        {
            break;
        }
        kept.push(line);
    }
    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }
    kept.join("\n")
}

/// First `SNIPPET_CHARS` characters, whitespace collapsed.
pub fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&flat, SNIPPET_CHARS)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", text[..idx].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = "From: Alice Example <alice@example.com>\r\n\
To: me@example.com\r\n\
Subject: Quarterly numbers\r\n\
Date: Mon, 6 Jan 2025 10:00:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Revenue is up 12%.\r\n\
\r\n\
On Sun, Jan 5, 2025 at 9:00 AM Bob <bob@example.com> wrote:\r\n\
> How did we do?\r\n";

    const HTML: &str = "From: news@example.com\r\n\
Subject: Digest\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><p>Top</p><p>stories</p></body></html>\r\n";

    #[test]
    fn record_from_plain_message() {
        let record = to_record(PLAIN.as_bytes(), false).unwrap();
        assert_eq!(
            record.sender.as_deref(),
            Some("Alice Example <alice@example.com>")
        );
        assert_eq!(record.subject.as_deref(), Some("Quarterly numbers"));
        assert!(record.date.unwrap().starts_with("2025-01-06T10:00:00"));
        assert_eq!(record.snippet.as_deref(), Some("Revenue is up 12%."));
        assert!(record.body.is_none());
    }

    #[test]
    fn record_with_body_drops_quoted_history() {
        let record = to_record(PLAIN.as_bytes(), true).unwrap();
        let body = record.body.unwrap();
        assert_eq!(body, "Revenue is up 12%.");
        assert!(!body.contains("How did we do"));
    }

    #[test]
    fn html_only_message_is_stripped() {
        let record = to_record(HTML.as_bytes(), true).unwrap();
        assert_eq!(record.sender.as_deref(), Some("news@example.com"));
        let body = record.body.unwrap();
        assert!(body.contains("Top") && body.contains("stories"));
        assert!(!body.contains('<'));
    }

    #[test]
    fn strip_html_collapses_whitespace() {
        assert_eq!(strip_html("<b>Hello</b>\n\n  <i>world</i>"), "Hello world");
    }

    #[test]
    fn strip_original_message_separator() {
        let body = "Thanks!\n\n--- Original Message ---\nFrom: someone";
        assert_eq!(strip_quoted_text(body), "Thanks!");
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        let long = "é".repeat(SNIPPET_CHARS + 10);
        let s = snippet(&long);
        assert!(s.ends_with("..."));
        assert_eq!(s.chars().count(), SNIPPET_CHARS + 3);
    }
}
