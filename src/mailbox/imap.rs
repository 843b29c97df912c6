//! Minimal IMAP4rev1 client over TLS.
//!
//! Speaks only what the tracker needs: LOGIN, EXAMINE, SEARCH, FETCH and
//! LOGOUT. The folder is opened read-only and messages are fetched with
//! `BODY.PEEK[]`, so a run never changes message flags.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use rustls_pki_types::ServerName;
use secrecy::ExposeSecret;
use tracing::{debug, info};

use super::{Mailbox, MessageId, SearchQuery};
use crate::config::MailboxConfig;
use crate::error::MailboxError;

/// TLS stream used for real connections.
pub type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// One piece of an outgoing command line.
#[derive(Debug, Clone)]
enum Arg {
    /// Written verbatim.
    Raw(String),
    /// Sent as a synchronizing literal (`{n}` + continuation).
    Literal(Vec<u8>),
}

/// Encode a string argument: quoted if ASCII, otherwise a literal.
fn string_arg(value: &str) -> Arg {
    if value.is_ascii() {
        Arg::Raw(quote(value))
    } else {
        Arg::Literal(value.as_bytes().to_vec())
    }
}

/// Quote an IMAP string, escaping `\` and `"`.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// A server response line with any literals it carried.
#[derive(Debug, Default)]
struct ResponseLine {
    text: String,
    literals: Vec<Vec<u8>>,
}

/// Everything the server sent for one tagged command.
#[derive(Debug)]
struct Response {
    untagged: Vec<ResponseLine>,
    ok: bool,
    status: String,
}

/// If `line` ends with a literal marker `{n}`, return `n`.
fn literal_len(line: &str) -> Option<usize> {
    let inner = line.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].parse().ok()
}

/// An authenticated session with one folder examined.
pub struct ImapSession<S = TlsStream> {
    stream: S,
    next_tag: u32,
    closed: bool,
}

impl ImapSession<TlsStream> {
    /// Connect over TLS, log in and open the configured folder read-only.
    ///
    /// Any failure here is fatal for the run.
    pub fn connect(config: &MailboxConfig) -> Result<Self, MailboxError> {
        let tcp = TcpStream::connect((&*config.host, config.port)).map_err(|e| {
            MailboxError::Connect {
                host: config.host.clone(),
                port: config.port,
                reason: e.to_string(),
            }
        })?;
        tcp.set_read_timeout(Some(config.timeout))?;
        tcp.set_write_timeout(Some(config.timeout))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = ServerName::try_from(config.host.clone())
            .map_err(|e| MailboxError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailboxError::Tls(e.to_string()))?;

        let mut session = Self::from_stream(rustls::StreamOwned::new(conn, tcp))?;
        session.login(&config.username, config.password.expose_secret())?;
        session.examine(&config.folder)?;

        info!(
            host = %config.host,
            folder = %config.folder,
            "Mailbox session opened"
        );
        Ok(session)
    }
}

impl<S: Read + Write> ImapSession<S> {
    /// Wrap an established stream and consume the server greeting.
    pub fn from_stream(stream: S) -> Result<Self, MailboxError> {
        let mut session = Self {
            stream,
            next_tag: 1,
            closed: false,
        };
        let greeting = session.read_response_line()?;
        if !(greeting.text.starts_with("* OK") || greeting.text.starts_with("* PREAUTH")) {
            return Err(MailboxError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.text
            )));
        }
        Ok(session)
    }

    /// Authenticate with LOGIN.
    pub fn login(&mut self, user: &str, password: &str) -> Result<(), MailboxError> {
        let resp = self.command(&[
            Arg::Raw("LOGIN ".into()),
            string_arg(user),
            Arg::Raw(" ".into()),
            string_arg(password),
        ])?;
        if !resp.ok {
            return Err(MailboxError::AuthFailed {
                user: user.to_string(),
            });
        }
        Ok(())
    }

    /// Open `folder` read-only.
    pub fn examine(&mut self, folder: &str) -> Result<(), MailboxError> {
        let resp = self.command(&[Arg::Raw("EXAMINE ".into()), string_arg(folder)])?;
        if !resp.ok {
            return Err(MailboxError::SelectFailed {
                folder: folder.to_string(),
                reason: resp.status,
            });
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), MailboxError> {
        if self.closed {
            Err(MailboxError::Closed)
        } else {
            Ok(())
        }
    }

    // ── Wire I/O ────────────────────────────────────────────────────

    /// Read one CRLF-terminated line, CRLF stripped.
    fn read_line(&mut self) -> Result<Vec<u8>, MailboxError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(MailboxError::Closed),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        buf.truncate(buf.len() - 2);
                        return Ok(buf);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read a logical response line, pulling in any `{n}` literals.
    fn read_response_line(&mut self) -> Result<ResponseLine, MailboxError> {
        let mut line = ResponseLine::default();
        loop {
            let chunk = self.read_line()?;
            line.text.push_str(&String::from_utf8_lossy(&chunk));
            let Some(len) = literal_len(&line.text) else {
                return Ok(line);
            };
            let mut literal = vec![0u8; len];
            self.stream.read_exact(&mut literal)?;
            line.literals.push(literal);
        }
    }

    /// Send a tagged command and collect its full response.
    ///
    /// A failure other than a tagged rejection leaves unread response lines
    /// in the stream, so the session is closed rather than reused.
    fn command(&mut self, args: &[Arg]) -> Result<Response, MailboxError> {
        let result = self.exchange(args);
        if let Err(e) = &result
            && !matches!(e, MailboxError::CommandFailed { .. })
        {
            self.closed = true;
        }
        result
    }

    fn exchange(&mut self, args: &[Arg]) -> Result<Response, MailboxError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        self.stream.write_all(tag.as_bytes())?;
        self.stream.write_all(b" ")?;
        for arg in args {
            match arg {
                Arg::Raw(text) => self.stream.write_all(text.as_bytes())?,
                Arg::Literal(bytes) => {
                    self.stream
                        .write_all(format!("{{{}}}\r\n", bytes.len()).as_bytes())?;
                    self.stream.flush()?;
                    self.await_continuation(&tag)?;
                    self.stream.write_all(bytes)?;
                }
            }
        }
        self.stream.write_all(b"\r\n")?;
        self.stream.flush()?;

        let prefix = format!("{tag} ");
        let mut untagged = Vec::new();
        loop {
            let line = self.read_response_line()?;
            if let Some(rest) = line.text.strip_prefix(&prefix) {
                let ok = rest.starts_with("OK");
                return Ok(Response {
                    untagged,
                    ok,
                    status: rest.to_string(),
                });
            }
            untagged.push(line);
        }
    }

    /// Wait for the server's `+` before sending literal bytes.
    fn await_continuation(&mut self, tag: &str) -> Result<(), MailboxError> {
        loop {
            let line = self.read_response_line()?;
            if line.text.starts_with('+') {
                return Ok(());
            }
            if line.text.starts_with(tag) {
                return Err(MailboxError::CommandFailed {
                    command: "literal".into(),
                    reason: line.text,
                });
            }
        }
    }
}

impl<S: Read + Write> Mailbox for ImapSession<S> {
    fn search(&mut self, query: &SearchQuery) -> Result<Vec<MessageId>, MailboxError> {
        self.ensure_open()?;

        let mut args = vec![Arg::Raw(if query.needs_utf8() {
            "SEARCH CHARSET UTF-8".to_string()
        } else {
            "SEARCH".to_string()
        })];
        for term in query.terms() {
            args.push(Arg::Raw(" TEXT ".into()));
            args.push(string_arg(term));
        }

        let resp = self.command(&args)?;
        if !resp.ok {
            return Err(MailboxError::CommandFailed {
                command: "SEARCH".into(),
                reason: resp.status,
            });
        }

        let ids = resp
            .untagged
            .iter()
            .filter_map(|line| line.text.strip_prefix("* SEARCH"))
            .flat_map(|rest| rest.split_whitespace())
            .filter_map(|id| id.parse::<MessageId>().ok())
            .collect();
        Ok(ids)
    }

    fn fetch(&mut self, id: MessageId) -> Result<Vec<u8>, MailboxError> {
        self.ensure_open()?;

        let resp = self.command(&[Arg::Raw(format!("FETCH {id} BODY.PEEK[]"))])?;
        if !resp.ok {
            return Err(MailboxError::CommandFailed {
                command: "FETCH".into(),
                reason: resp.status,
            });
        }

        let marker = format!("* {id} FETCH");
        resp.untagged
            .into_iter()
            .filter(|line| line.text.starts_with(&marker))
            .find_map(|line| line.literals.into_iter().next())
            .ok_or_else(|| MailboxError::Protocol(format!("no message body returned for {id}")))
    }

    fn logout(&mut self) -> Result<(), MailboxError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let resp = self.command(&[Arg::Raw("LOGOUT".into())])?;
        debug!(status = %resp.status, "Mailbox session closed");
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
