//! In-memory mailbox for tests and offline runs.

use std::collections::HashSet;

use super::{Mailbox, MessageId, SearchQuery};
use crate::error::MailboxError;

/// A mailbox backed by a list of raw messages.
///
/// Ids are 1-based positions, returned in ascending order like an IMAP
/// server does. Search is a case-insensitive substring match of every
/// term against the whole raw message.
#[derive(Debug, Default)]
pub struct MemoryMailbox {
    messages: Vec<Vec<u8>>,
    broken: HashSet<MessageId>,
    searches: usize,
    logged_out: bool,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw message and return its id.
    pub fn push(&mut self, raw: impl Into<Vec<u8>>) -> MessageId {
        self.messages.push(raw.into());
        self.messages.len() as MessageId
    }

    /// Make fetches of `id` fail.
    pub fn break_message(&mut self, id: MessageId) {
        self.broken.insert(id);
    }

    /// Number of searches run so far.
    pub fn search_count(&self) -> usize {
        self.searches
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out
    }
}

impl Mailbox for MemoryMailbox {
    fn search(&mut self, query: &SearchQuery) -> Result<Vec<MessageId>, MailboxError> {
        if self.logged_out {
            return Err(MailboxError::Closed);
        }
        self.searches += 1;

        let terms: Vec<String> = query.terms().iter().map(|t| t.to_lowercase()).collect();
        let ids = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, raw)| {
                let text = String::from_utf8_lossy(raw).to_lowercase();
                terms.iter().all(|t| text.contains(t.as_str()))
            })
            .map(|(i, _)| (i + 1) as MessageId)
            .collect();
        Ok(ids)
    }

    fn fetch(&mut self, id: MessageId) -> Result<Vec<u8>, MailboxError> {
        if self.logged_out {
            return Err(MailboxError::Closed);
        }
        if self.broken.contains(&id) {
            return Err(MailboxError::CommandFailed {
                command: "FETCH".into(),
                reason: format!("message {id} unavailable"),
            });
        }
        (id as usize)
            .checked_sub(1)
            .and_then(|i| self.messages.get(i))
            .cloned()
            .ok_or_else(|| MailboxError::Protocol(format!("no message with id {id}")))
    }

    fn logout(&mut self) -> Result<(), MailboxError> {
        self.logged_out = true;
        Ok(())
    }
}
