//! Order Tracker: cross-references order numbers against a mailbox and
//! reports each order's shipping status.

pub mod config;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod pipeline;
pub mod report;
pub mod sheet;
pub mod status;
pub mod tracking;
