//! Minimal blocking IMAP client over rustls.
//!
//! Covers what the mailbox needs: LOGIN, EXAMINE, SEARCH, FETCH and LOGOUT.
//! Run it inside `spawn_blocking`.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls_pki_types::ServerName;

use crate::error::MailboxError;

pub type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Largest literal accepted from the server.
const MAX_LITERAL: usize = 64 * 1024 * 1024;

/// Untagged lines and literals returned by one command.
#[derive(Debug, Default)]
pub struct Response {
    pub lines: Vec<String>,
    pub literals: Vec<Vec<u8>>,
}

pub struct ImapSession<S: Read + Write> {
    stream: BufReader<S>,
    next_tag: u32,
}

impl ImapSession<TlsStream> {
    /// Open a TLS connection and consume the server greeting.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, MailboxError> {
        let connect_err = |reason: String| MailboxError::Connect {
            host: host.to_string(),
            reason,
        };

        let tcp = TcpStream::connect((host, port)).map_err(|e| connect_err(e.to_string()))?;
        tcp.set_read_timeout(Some(timeout))?;
        tcp.set_write_timeout(Some(timeout))?;

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        );
        let server_name =
            ServerName::try_from(host.to_string()).map_err(|e| connect_err(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| connect_err(e.to_string()))?;

        Self::greet(rustls::StreamOwned::new(conn, tcp))
    }
}

impl<S: Read + Write> ImapSession<S> {
    /// Wrap an established stream and read the greeting.
    pub fn greet(stream: S) -> Result<Self, MailboxError> {
        let mut session = Self {
            stream: BufReader::new(stream),
            next_tag: 1,
        };
        let greeting = session.read_line()?;
        if !greeting.starts_with("* OK") && !greeting.starts_with("* PREAUTH") {
            return Err(MailboxError::Imap {
                command: "greeting".into(),
                reason: greeting.trim().to_string(),
            });
        }
        Ok(session)
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), MailboxError> {
        self.command(
            "LOGIN",
            &[Arg::Atom("LOGIN"), Arg::Text(username), Arg::Text(password)],
        )
        .map(|_| ())
    }

    /// Select INBOX read-only so nothing is flagged as seen.
    pub fn examine_inbox(&mut self) -> Result<(), MailboxError> {
        self.command("EXAMINE", &[Arg::Atom("EXAMINE"), Arg::Text("INBOX")])
            .map(|_| ())
    }

    /// Sequence numbers matching the search keys, ascending.
    pub fn search(&mut self, keys: &[Arg<'_>]) -> Result<Vec<u32>, MailboxError> {
        let mut args = vec![Arg::Atom("SEARCH")];
        args.extend_from_slice(keys);
        let response = self.command("SEARCH", &args)?;
        Ok(parse_search(&response.lines))
    }

    /// Raw RFC 822 bytes of one message, without touching its flags.
    pub fn fetch_raw(&mut self, seq: u32) -> Result<Option<Vec<u8>>, MailboxError> {
        let item = format!("{seq} BODY.PEEK[]");
        let mut response = self.command("FETCH", &[Arg::Atom("FETCH"), Arg::Atom(&item)])?;
        Ok((!response.literals.is_empty()).then(|| response.literals.swap_remove(0)))
    }

    pub fn logout(mut self) {
        if let Err(e) = self.command("LOGOUT", &[Arg::Atom("LOGOUT")]) {
            tracing::debug!("IMAP logout failed: {e}");
        }
    }

    /// Send one tagged command and collect its response.
    fn command(&mut self, name: &str, args: &[Arg<'_>]) -> Result<Response, MailboxError> {
        let tag = format!("A{} ", self.next_tag);
        self.next_tag += 1;

        let mut pending = tag.clone().into_bytes();
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                pending.push(b' ');
            }
            match arg {
                Arg::Atom(atom) => pending.extend_from_slice(atom.as_bytes()),
                Arg::Text(text) if is_quotable(text) => {
                    pending.extend_from_slice(quote(text).as_bytes())
                }
                Arg::Text(text) => {
                    pending.extend_from_slice(format!("{{{}}}\r\n", text.len()).as_bytes());
                    self.write(&pending)?;
                    self.await_continuation(name, &tag)?;
                    pending = text.as_bytes().to_vec();
                }
            }
        }
        pending.extend_from_slice(b"\r\n");
        self.write(&pending)?;

        let mut response = Response::default();
        loop {
            let line = self.read_line()?;
            if let Some(status) = line.strip_prefix(&tag) {
                let status = status.trim();
                if status.starts_with("OK") {
                    return Ok(response);
                }
                return Err(MailboxError::Imap {
                    command: name.to_string(),
                    reason: status.to_string(),
                });
            }
            if let Some(len) = literal_len(&line) {
                if len > MAX_LITERAL {
                    return Err(MailboxError::Imap {
                        command: name.to_string(),
                        reason: format!("literal of {len} bytes exceeds {MAX_LITERAL}"),
                    });
                }
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal)?;
                response.literals.push(literal);
            }
            response.lines.push(line);
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), MailboxError> {
        let inner = self.stream.get_mut();
        inner.write_all(bytes)?;
        inner.flush()?;
        Ok(())
    }

    /// Wait for the `+` that lets a literal's bytes follow.
    fn await_continuation(&mut self, name: &str, tag: &str) -> Result<(), MailboxError> {
        let line = self.read_line()?;
        if line.starts_with('+') {
            return Ok(());
        }
        let reason = line.strip_prefix(tag).unwrap_or(&line).trim().to_string();
        Err(MailboxError::Imap {
            command: name.to_string(),
            reason,
        })
    }

    fn read_line(&mut self) -> Result<String, MailboxError> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Err(MailboxError::Imap {
                command: "read".into(),
                reason: "connection closed".into(),
            });
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Command argument: an atom sent as-is, or a string sent quoted when it
/// is 7-bit and as a literal otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg<'a> {
    Atom(&'a str),
    Text(&'a str),
}

/// IMAP quoted string.
pub fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn is_quotable(value: &str) -> bool {
    value.is_ascii() && !value.contains(['\r', '\n'])
}

/// SEARCH keys for a sender and a free-text term; `ALL` when both are absent.
pub fn search_keys<'a>(from: Option<&'a str>, text: Option<&'a str>) -> Vec<Arg<'a>> {
    let mut keys = Vec::new();
    if from.into_iter().chain(text).any(|t| !t.is_ascii()) {
        keys.extend([Arg::Atom("CHARSET"), Arg::Atom("UTF-8")]);
    }
    if let Some(from) = from {
        keys.extend([Arg::Atom("FROM"), Arg::Text(from)]);
    }
    if let Some(text) = text {
        keys.extend([Arg::Atom("TEXT"), Arg::Text(text)]);
    }
    if keys.is_empty() {
        keys.push(Arg::Atom("ALL"));
    }
    keys
}

/// Size of a `{N}` literal announced at the end of a line.
fn literal_len(line: &str) -> Option<usize> {
    let body = line.trim_end_matches(['\r', '\n']);
    let open = body.rfind('{')?;
    body.strip_suffix('}')?[open + 1..].parse().ok()
}

fn parse_search(lines: &[String]) -> Vec<u32> {
    let mut ids: Vec<u32> = lines
        .iter()
        .filter_map(|l| l.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace().filter_map(|s| s.parse().ok()))
        .collect();
    ids.sort_unstable();
    ids
}
