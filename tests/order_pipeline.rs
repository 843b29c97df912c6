//! End-to-end tests for the order pipeline.
//!
//! Each test builds an in-memory mailbox from raw RFC 822 fixtures, runs the
//! real sheet parser → pipeline → report writer chain, and checks the rows.

use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use order_tracker::mailbox::{ImapSession, Mailbox, MemoryMailbox};
use order_tracker::pipeline::{OrderRecord, OrderTracker, OutputRecord, run_with_workers};
use order_tracker::report::render_report;
use order_tracker::sheet::parse_orders;
use order_tracker::status::OrderStatus;
use order_tracker::tracking::Carrier;

/// Single-part plain text message.
fn plain(subject: &str, date: &str, body: &str) -> String {
    format!(
        "From: orders@shop.example\r\n\
         Subject: {subject}\r\n\
         Date: {date}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         {body}\r\n"
    )
}

/// Multipart message with only an HTML part.
fn html_only(subject: &str, html: &str) -> String {
    format!(
        "From: orders@shop.example\r\n\
         Subject: {subject}\r\n\
         Date: Wed, 3 May 2023 12:00:00 +0000\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: multipart/alternative; boundary=\"zz\"\r\n\
         \r\n\
         --zz\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         \r\n\
         {html}\r\n\
         --zz--\r\n"
    )
}

fn fixture_mailbox() -> MemoryMailbox {
    let mut mb = MemoryMailbox::new();
    // UPS-1001: confirmation, then a shipping email with a UPS number.
    mb.push(plain(
        "Order UPS-1001 confirmed",
        "Mon, 1 May 2023 09:00:00 +0000",
        "Thanks for your order UPS-1001.",
    ));
    mb.push(plain(
        "Update for UPS-1001",
        "Tue, 2 May 2023 09:00:00 +0000",
        "Tracking: 1Z999AA10123456784",
    ));
    // USPS-2002
    mb.push(plain(
        "Order USPS-2002",
        "Tue, 2 May 2023 10:00:00 +0000",
        "USPS label 9400100000000000000000 created.",
    ));
    // DHL-3003: 10-digit waybill only.
    mb.push(plain(
        "Order DHL-3003",
        "Tue, 2 May 2023 11:00:00 +0000",
        "Waybill 4821930475.",
    ));
    // TBA-4004: delivered wins over out-for-delivery.
    mb.push(plain(
        "Your Amazon order TBA-4004",
        "Wed, 3 May 2023 08:00:00 +0000",
        "Out for delivery this morning. Delivered on 5/1. Ref TBA123456789012",
    ));
    // HTML-5005
    mb.push(html_only("Order HTML-5005", "<p><b>Your order has shipped</b></p>"));
    // SITE-6006 exists at two merchants.
    mb.push(plain(
        "Etsy order SITE-6006",
        "Thu, 4 May 2023 08:00:00 +0000",
        "Order confirmed",
    ));
    mb.push(plain(
        "eBay order SITE-6006",
        "Thu, 4 May 2023 09:00:00 +0000",
        "Your item has shipped",
    ));
    mb
}

const SHEET: &str = "Order Number,Site\n\
UPS-1001,\n\
USPS-2002,\n\
,Ghost Shop\n\
DHL-3003,\n\
TBA-4004,Amazon\n\
HTML-5005,\n\
SITE-6006,Etsy\n\
NONE-7007,Target\n";

fn run_sheet(mailbox: &mut MemoryMailbox) -> Vec<OutputRecord> {
    let orders = parse_orders(SHEET).unwrap();
    let tracker = OrderTracker::default();
    let records = tracker.run(mailbox, &orders);
    mailbox.logout().unwrap();
    records
}

fn row<'a>(rows: &'a [OutputRecord], order: &str) -> &'a OutputRecord {
    rows.iter()
        .find(|r| r.order_number == order)
        .unwrap_or_else(|| panic!("no row for {order}"))
}

#[test]
fn one_row_per_non_blank_order_in_input_order() {
    let rows = run_sheet(&mut fixture_mailbox());
    let numbers: Vec<&str> = rows.iter().map(|r| r.order_number.as_str()).collect();
    assert_eq!(
        numbers,
        [
            "UPS-1001",
            "USPS-2002",
            "DHL-3003",
            "TBA-4004",
            "HTML-5005",
            "SITE-6006",
            "NONE-7007"
        ]
    );
    assert_eq!(row(&rows, "TBA-4004").site, "Amazon");
}

#[test]
fn carriers_detected() {
    let rows = run_sheet(&mut fixture_mailbox());

    let ups = row(&rows, "UPS-1001");
    assert_eq!(ups.carrier, Some(Carrier::Ups));
    assert_eq!(ups.tracking, "1Z999AA10123456784");
    assert_eq!(ups.status, OrderStatus::Shipped);
    assert_eq!(ups.subject, "Update for UPS-1001");
    assert_eq!(ups.email_date, "Tue, 2 May 2023 09:00:00 +0000");

    assert_eq!(row(&rows, "USPS-2002").carrier, Some(Carrier::Usps));
    assert_eq!(row(&rows, "DHL-3003").carrier, Some(Carrier::Dhl));
    assert_eq!(row(&rows, "DHL-3003").status, OrderStatus::Shipped);
}

#[test]
fn delivered_phrase_takes_precedence() {
    let rows = run_sheet(&mut fixture_mailbox());
    let tba = row(&rows, "TBA-4004");
    assert_eq!(tba.status, OrderStatus::Delivered);
    assert_eq!(tba.carrier, Some(Carrier::AmazonLogistics));
}

#[test]
fn html_only_body_classified() {
    let rows = run_sheet(&mut fixture_mailbox());
    let html = row(&rows, "HTML-5005");
    assert_eq!(html.status, OrderStatus::Shipped);
    assert_eq!(html.carrier, None);
}

#[test]
fn site_hint_narrows_search() {
    let rows = run_sheet(&mut fixture_mailbox());
    let site = row(&rows, "SITE-6006");
    assert_eq!(site.status, OrderStatus::Pending);
    assert_eq!(site.subject, "Etsy order SITE-6006");
}

#[test]
fn unmatched_order_is_blank_pending_row() {
    let rows = run_sheet(&mut fixture_mailbox());
    assert_eq!(
        row(&rows, "NONE-7007"),
        &OutputRecord::unmatched(&OrderRecord::new("NONE-7007", "Target"))
    );
}

#[test]
fn report_is_byte_identical_across_runs() {
    let first = render_report(&run_sheet(&mut fixture_mailbox())).unwrap();
    let second = render_report(&run_sheet(&mut fixture_mailbox())).unwrap();
    assert_eq!(first, second);
    assert!(first.contains("NONE-7007,Target,Pending,,,,\r\n"));
    assert!(first.contains("TBA-4004,Amazon,Delivered,TBA123456789012,Amazon Logistics,"));
}

#[test]
fn unreadable_message_does_not_stop_later_orders() {
    let mut mb = fixture_mailbox();
    mb.break_message(2);
    let rows = run_sheet(&mut mb);
    assert_eq!(
        row(&rows, "UPS-1001"),
        &OutputRecord::unmatched(&OrderRecord::new("UPS-1001", ""))
    );
    assert_eq!(row(&rows, "USPS-2002").carrier, Some(Carrier::Usps));
}

#[tokio::test]
async fn worker_pool_output_matches_sequential() {
    let sequential = run_sheet(&mut fixture_mailbox());
    let pooled = run_with_workers(
        Arc::new(OrderTracker::default()),
        parse_orders(SHEET).unwrap(),
        3,
        || Ok(fixture_mailbox()),
    )
    .await
    .unwrap();
    assert_eq!(pooled, sequential);
}

/// Server stream that times out once at a fixed input offset.
struct StallingServer {
    input: Cursor<Vec<u8>>,
    stall_at: Option<u64>,
}

impl Read for StallingServer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.stall_at == Some(self.input.position()) {
            self.stall_at = None;
            return Err(io::ErrorKind::TimedOut.into());
        }
        self.input.read(buf)
    }
}

impl Write for StallingServer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn timed_out_search_leaves_later_orders_unmatched() {
    let greeting = "* OK ready\r\n";
    // Late reply to the first search, then the second order's empty result.
    let script = format!("{greeting}* SEARCH 1\r\nA1 OK\r\n* SEARCH\r\nA2 OK\r\n");
    let mut session = ImapSession::from_stream(StallingServer {
        input: Cursor::new(script.into_bytes()),
        stall_at: Some(greeting.len() as u64),
    })
    .unwrap();

    let orders = [OrderRecord::new("SLOW-1", ""), OrderRecord::new("NEXT-2", "")];
    let rows = OrderTracker::default().run(&mut session, &orders);

    assert_eq!(
        rows,
        vec![
            OutputRecord::unmatched(&orders[0]),
            OutputRecord::unmatched(&orders[1]),
        ]
    );
}
