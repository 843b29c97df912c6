//! Order lifecycle classification.
//!
//! A strict-priority decision list over the subject and body:
//! 1. any delivered phrase → `Delivered`
//! 2. a tracking number, or any shipped phrase → `Shipped`
//! 3. any confirmation phrase → `Pending`
//! 4. otherwise → `Pending`
//!
//! Content is not mutually exclusive (a confirmation can mention "shipped"
//! in a footer), so the order of the rules decides the outcome.

use std::fmt;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// Inferred lifecycle stage of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    Shipped,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DELIVERED_PHRASES: &[&str] = &[
    "delivered",
    "has been delivered",
    "was delivered",
    "delivered on",
];

pub const SHIPPED_PHRASES: &[&str] = &["shipped", "on the way", "out for delivery", "has shipped"];

pub const PENDING_PHRASES: &[&str] = &[
    "order confirmed",
    "order confirmation",
    "thanks for your order",
    "placed",
];

/// One row of the decision list.
#[derive(Debug, Clone)]
pub struct StatusRule {
    pub status: OrderStatus,
    /// Case-insensitive whole-word phrase alternation.
    pub regex: Regex,
    /// Also fire when a tracking number was extracted.
    pub on_tracking: bool,
    pub reason: String,
}

impl StatusRule {
    /// Build a rule matching any of `phrases` as whole words.
    ///
    /// Spaces inside a phrase match any run of whitespace.
    pub fn from_phrases(
        status: OrderStatus,
        phrases: &[&str],
        on_tracking: bool,
        reason: &str,
    ) -> Result<Self, regex::Error> {
        let alternation = phrases
            .iter()
            .map(|p| {
                p.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");
        Ok(Self {
            status,
            regex: Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))?,
            on_tracking,
            reason: reason.into(),
        })
    }

    fn fires(&self, text: &str, has_tracking: bool) -> bool {
        (self.on_tracking && has_tracking) || self.regex.is_match(text)
    }
}

/// Ordered status decision list.
pub struct StatusClassifier {
    rules: Vec<StatusRule>,
}

impl StatusClassifier {
    /// Create a classifier with the standard phrase lists.
    pub fn default_rules() -> Self {
        let rules = vec![
            StatusRule::from_phrases(
                OrderStatus::Delivered,
                DELIVERED_PHRASES,
                false,
                "delivered phrase",
            )
            .unwrap(),
            StatusRule::from_phrases(
                OrderStatus::Shipped,
                SHIPPED_PHRASES,
                true,
                "tracking number or shipped phrase",
            )
            .unwrap(),
            StatusRule::from_phrases(
                OrderStatus::Pending,
                PENDING_PHRASES,
                false,
                "confirmation phrase",
            )
            .unwrap(),
        ];
        Self { rules }
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[StatusRule] {
        &self.rules
    }

    /// Classify a found message. Always returns exactly one status.
    pub fn classify(&self, subject: &str, body: &str, has_tracking: bool) -> OrderStatus {
        let text = format!("{subject}\n{body}");
        for rule in &self.rules {
            if rule.fires(&text, has_tracking) {
                debug!(status = %rule.status, reason = %rule.reason, "Status rule matched");
                return rule.status;
            }
        }
        OrderStatus::default()
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::default_rules()
    }
}
