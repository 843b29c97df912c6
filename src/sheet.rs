//! Order list source: a CSV export fetched over HTTP or read from disk.

use std::time::Duration;

use tracing::{debug, info};

use crate::error::SheetError;
use crate::pipeline::OrderRecord;

/// Accepted spellings of the order number column, in lookup order.
const ORDER_COLUMNS: [&str; 2] = ["order number", "order_number"];
const SITE_COLUMN: &str = "site";

/// Load orders from a URL or a local file path.
pub async fn load_orders(source: &str) -> Result<Vec<OrderRecord>, SheetError> {
    let text = if is_url(source) {
        fetch_sheet(source).await?
    } else {
        let bytes = tokio::fs::read(source).await?;
        String::from_utf8_lossy(&bytes).into_owned()
    };

    let orders = parse_orders(&text)?;
    info!(rows = orders.len(), "Loaded order sheet");
    Ok(orders)
}

fn is_url(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

async fn fetch_sheet(url: &str) -> Result<String, SheetError> {
    let client = reqwest::Client::builder()
        .user_agent("Mozilla/5.0")
        .timeout(Duration::from_secs(30))
        .build()?;

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SheetError::Http {
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await?;
    debug!(bytes = bytes.len(), "Fetched sheet CSV");
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse CSV text into order records.
///
/// The first row is the header. Names are matched trimmed and
/// case-insensitively. Rows with a blank order number are kept; the
/// pipeline skips them.
pub fn parse_orders(text: &str) -> Result<Vec<OrderRecord>, SheetError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut rows = reader.records();

    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let order_cols: Vec<usize> = ORDER_COLUMNS
        .iter()
        .filter_map(|name| header.iter().position(|h| h == name))
        .collect();
    if order_cols.is_empty() {
        return Err(SheetError::MissingColumn {
            found: header.join(", "),
        });
    }
    let site_col = header.iter().position(|h| h == SITE_COLUMN);

    let mut orders = Vec::new();
    for row in rows {
        let row = row?;
        let cell = |i: usize| row.get(i).map(str::trim).unwrap_or("");
        let order_number = order_cols
            .iter()
            .map(|&i| cell(i))
            .find(|v| !v.is_empty())
            .unwrap_or("");
        let site = site_col.map(cell).unwrap_or("");
        orders.push(OrderRecord::new(order_number, site));
    }
    Ok(orders)
}
