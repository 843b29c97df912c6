//! Carrier tracking-number detection.
//!
//! Rules are evaluated in a fixed priority order and the first match wins:
//! UPS → USPS → FedEx → DHL → Amazon Logistics. The FedEx rule is a broad
//! 12–22 digit run, so it must stay behind the more specific UPS/USPS
//! shapes; DHL's 10-digit run only catches numbers too short for FedEx.

use std::fmt;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// Shipping company inferred from a tracking number's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Carrier {
    #[serde(rename = "UPS")]
    Ups,
    #[serde(rename = "USPS")]
    Usps,
    #[serde(rename = "FedEx")]
    FedEx,
    #[serde(rename = "DHL")]
    Dhl,
    #[serde(rename = "Amazon Logistics")]
    AmazonLogistics,
}

impl Carrier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ups => "UPS",
            Self::Usps => "USPS",
            Self::FedEx => "FedEx",
            Self::Dhl => "DHL",
            Self::AmazonLogistics => "Amazon Logistics",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of scanning a body for a tracking number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingResult {
    /// `None` when nothing matched (e.g. a plain order confirmation).
    pub carrier: Option<Carrier>,
    /// The matched text as it appears in the body, or empty.
    pub number: String,
}

impl TrackingResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_found(&self) -> bool {
        self.carrier.is_some()
    }
}

/// One carrier pattern.
#[derive(Debug, Clone)]
pub struct TrackingRule {
    pub carrier: Carrier,
    pub regex: Regex,
}

/// Ordered carrier rule table.
pub struct TrackingExtractor {
    rules: Vec<TrackingRule>,
}

impl TrackingExtractor {
    /// Create an extractor with the standard carrier patterns.
    pub fn default_rules() -> Self {
        let rules = vec![
            // 1Z + 16 alphanumerics
            TrackingRule {
                carrier: Carrier::Ups,
                regex: Regex::new(r"(?i)\b1Z[0-9A-Z]{16}\b").unwrap(),
            },
            // 22–23 digits starting with 9
            TrackingRule {
                carrier: Carrier::Usps,
                regex: Regex::new(r"\b9\d{21,22}\b").unwrap(),
            },
            TrackingRule {
                carrier: Carrier::FedEx,
                regex: Regex::new(r"\b\d{12,22}\b").unwrap(),
            },
            TrackingRule {
                carrier: Carrier::Dhl,
                regex: Regex::new(r"\b\d{10}\b").unwrap(),
            },
            TrackingRule {
                carrier: Carrier::AmazonLogistics,
                regex: Regex::new(r"(?i)\bTBA[0-9A-Z]+\b").unwrap(),
            },
        ];
        Self { rules }
    }

    /// Create an extractor with no rules (for testing).
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule at the lowest priority.
    pub fn add_rule(&mut self, carrier: Carrier, pattern: &str) -> Result<(), regex::Error> {
        self.rules.push(TrackingRule {
            carrier,
            regex: Regex::new(pattern)?,
        });
        Ok(())
    }

    /// The rules in evaluation order.
    pub fn rules(&self) -> &[TrackingRule] {
        &self.rules
    }

    /// Return the first carrier whose pattern matches `body`.
    pub fn extract(&self, body: &str) -> TrackingResult {
        for rule in &self.rules {
            if let Some(m) = rule.regex.find(body) {
                debug!(carrier = %rule.carrier, "Tracking number matched");
                return TrackingResult {
                    carrier: Some(rule.carrier),
                    number: m.as_str().to_string(),
                };
            }
        }
        TrackingResult::none()
    }
}

impl Default for TrackingExtractor {
    fn default() -> Self {
        Self::default_rules()
    }
}
