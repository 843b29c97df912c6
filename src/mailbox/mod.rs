//! Mailbox session abstraction.
//!
//! The pipeline only talks to a [`Mailbox`]; [`ImapSession`] is the real
//! implementation and [`MemoryMailbox`] serves tests.

pub mod imap;
pub mod memory;
pub mod query;

pub use imap::ImapSession;
pub use memory::MemoryMailbox;
pub use query::{SearchQuery, find_latest_match, latest_id};

use crate::error::MailboxError;

/// Server-assigned message id (IMAP sequence number).
pub type MessageId = u32;

/// A stateful connection to one selected folder of a mail store.
///
/// Calls are blocking and strictly sequential; an implementation is never
/// shared between threads.
pub trait Mailbox {
    /// Run a server-side search, returning ids in the order the server reports them.
    fn search(&mut self, query: &SearchQuery) -> Result<Vec<MessageId>, MailboxError>;

    /// Fetch the complete raw RFC 822 message for `id`.
    fn fetch(&mut self, id: MessageId) -> Result<Vec<u8>, MailboxError>;

    /// Release the connection.
    fn logout(&mut self) -> Result<(), MailboxError>;
}
