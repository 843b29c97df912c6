//! Order processing pipeline.
//!
//! Every order with a non-empty number flows through:
//! 1. `find_latest_match()`: mailbox search, most recent id
//! 2. `Mailbox::fetch()`: raw message
//! 3. `decode_message()`: subject, date, body text
//! 4. `TrackingExtractor::extract()`: carrier + number
//! 5. `StatusClassifier::classify()`: lifecycle status
//!
//! Any failure after connecting is scoped to its order and degrades to an
//! unmatched `Pending` row. One order never stops the next.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, MailboxError, Result};
use crate::mailbox::{Mailbox, find_latest_match};
use crate::message::{MatchedMessage, decode_message};
use crate::status::{OrderStatus, StatusClassifier};
use crate::tracking::{Carrier, TrackingExtractor};

// ── Records ─────────────────────────────────────────────────────────

/// One input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub order_number: String,
    /// Optional merchant name; empty when not given.
    pub site: String,
}

impl OrderRecord {
    pub fn new(order_number: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            order_number: order_number.into().trim().to_string(),
            site: site.into().trim().to_string(),
        }
    }

    /// The site as a search hint, if present.
    pub fn site_hint(&self) -> Option<&str> {
        Some(self.site.as_str()).filter(|s| !s.is_empty())
    }

    pub fn has_order_number(&self) -> bool {
        !self.order_number.is_empty()
    }
}

/// One report row. Field order is the report's column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    pub order_number: String,
    pub site: String,
    pub status: OrderStatus,
    pub tracking: String,
    pub carrier: Option<Carrier>,
    pub email_date: String,
    pub subject: String,
}

impl OutputRecord {
    /// Row for an order with no usable message.
    pub fn unmatched(order: &OrderRecord) -> Self {
        Self {
            order_number: order.order_number.clone(),
            site: order.site.clone(),
            status: OrderStatus::Pending,
            tracking: String::new(),
            carrier: None,
            email_date: String::new(),
            subject: String::new(),
        }
    }
}

// ── Tracker ─────────────────────────────────────────────────────────

/// Stateless per-order evaluator. Holds only the compiled rule tables.
#[derive(Default)]
pub struct OrderTracker {
    tracking: TrackingExtractor,
    classifier: StatusClassifier,
}

impl OrderTracker {
    pub fn new(tracking: TrackingExtractor, classifier: StatusClassifier) -> Self {
        Self {
            tracking,
            classifier,
        }
    }

    /// Extract tracking and classify a decoded message.
    pub fn evaluate(&self, order: &OrderRecord, message: &MatchedMessage) -> OutputRecord {
        let tracking = self.tracking.extract(&message.body);
        let status = self
            .classifier
            .classify(&message.subject, &message.body, tracking.is_found());

        OutputRecord {
            order_number: order.order_number.clone(),
            site: order.site.clone(),
            status,
            tracking: tracking.number,
            carrier: tracking.carrier,
            email_date: message.date.clone(),
            subject: message.subject.clone(),
        }
    }

    /// Search, fetch, decode and classify one order.
    pub fn process_order(&self, mailbox: &mut dyn Mailbox, order: &OrderRecord) -> OutputRecord {
        let order_number = order.order_number.as_str();

        let Some(id) = find_latest_match(mailbox, order_number, order.site_hint()) else {
            debug!(order = %order_number, "No email found");
            return OutputRecord::unmatched(order);
        };

        let raw = match mailbox.fetch(id) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(order = %order_number, id, "Fetch failed: {e}");
                return OutputRecord::unmatched(order);
            }
        };

        let Some(message) = decode_message(&raw) else {
            warn!(order = %order_number, id, "Fetched message could not be parsed");
            return OutputRecord::unmatched(order);
        };

        let record = self.evaluate(order, &message);
        debug!(
            order = %order_number,
            status = %record.status,
            carrier = record.carrier.map(|c| c.as_str()).unwrap_or(""),
            "Order classified"
        );
        record
    }

    /// Process orders strictly in input order, skipping blank order numbers.
    pub fn run(&self, mailbox: &mut dyn Mailbox, orders: &[OrderRecord]) -> Vec<OutputRecord> {
        orders
            .iter()
            .filter(|order| order.has_order_number())
            .map(|order| self.process_order(mailbox, order))
            .collect()
    }
}

// ── Worker pool ─────────────────────────────────────────────────────

/// Split `len` items into at most `workers` contiguous chunk sizes.
fn chunk_size(len: usize, workers: usize) -> usize {
    len.div_ceil(workers.max(1)).max(1)
}

/// Run the pipeline over `workers` parallel mailbox sessions.
///
/// Each worker opens its own session with `connect`, processes one
/// contiguous slice of the input and logs out. Output is reassembled in
/// input order. A connect failure in any worker fails the whole run.
pub async fn run_with_workers<M, F>(
    tracker: Arc<OrderTracker>,
    orders: Vec<OrderRecord>,
    workers: usize,
    connect: F,
) -> Result<Vec<OutputRecord>>
where
    M: Mailbox + 'static,
    F: Fn() -> std::result::Result<M, MailboxError> + Send + Sync + 'static,
{
    let orders: Vec<OrderRecord> = orders
        .into_iter()
        .filter(OrderRecord::has_order_number)
        .collect();
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let connect = Arc::new(connect);
    let size = chunk_size(orders.len(), workers);
    let handles: Vec<_> = orders
        .chunks(size)
        .map(|chunk| {
            let chunk = chunk.to_vec();
            let tracker = Arc::clone(&tracker);
            let connect = Arc::clone(&connect);
            tokio::task::spawn_blocking(move || {
                let mut mailbox = (*connect)()?;
                let records = tracker.run(&mut mailbox, &chunk);
                if let Err(e) = mailbox.logout() {
                    warn!("Mailbox logout failed: {e}");
                }
                Ok::<_, MailboxError>(records)
            })
        })
        .collect();

    info!(
        orders = orders.len(),
        workers = handles.len(),
        "Processing orders"
    );

    let mut output = Vec::with_capacity(orders.len());
    for joined in futures::future::join_all(handles).await {
        let records = joined.map_err(|e| Error::Worker(e.to_string()))??;
        output.extend(records);
    }
    Ok(output)
}
