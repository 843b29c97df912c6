//! Per-order search construction and latest-match selection.

use tracing::{debug, warn};

use super::{Mailbox, MessageId};

/// A full-text search requiring every term to appear in the message
/// headers or body (logical AND).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    terms: Vec<String>,
}

impl SearchQuery {
    /// Search for an order number, narrowed by an optional site hint.
    ///
    /// A blank hint adds nothing; a hint never widens the match.
    pub fn for_order(order_number: &str, site_hint: Option<&str>) -> Self {
        let mut terms = Vec::with_capacity(2);
        if let Some(order) = sanitize_term(order_number) {
            terms.push(order);
        }
        if let Some(site) = site_hint.and_then(sanitize_term) {
            terms.push(site);
        }
        Self { terms }
    }

    /// The required substrings, in order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// True if any term needs a UTF-8 charset declaration.
    pub fn needs_utf8(&self) -> bool {
        self.terms.iter().any(|t| !t.is_ascii())
    }
}

/// Trim a search value and flatten line breaks, which would end the command.
fn sanitize_term(value: &str) -> Option<String> {
    let normalized = value.replace(['\r', '\n'], " ");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}

/// Pick the most recent id from a search result.
///
/// The mail store is trusted to return ids in ascending arrival order, so the
/// last element is taken as the most recent. No re-sorting is done.
pub fn latest_id(ids: &[MessageId]) -> Option<MessageId> {
    ids.last().copied()
}

/// Search for an order and return the id of its most recent message.
///
/// Zero matches and a rejected search both yield `None`; neither is fatal.
pub fn find_latest_match(
    mailbox: &mut dyn Mailbox,
    order_number: &str,
    site_hint: Option<&str>,
) -> Option<MessageId> {
    let query = SearchQuery::for_order(order_number, site_hint);
    if query.terms().is_empty() {
        return None;
    }

    let ids = match mailbox.search(&query) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(order = %order_number, "Mailbox search failed: {e}");
            return None;
        }
    };

    debug!(order = %order_number, matches = ids.len(), "Mailbox search complete");
    latest_id(&ids)
}
