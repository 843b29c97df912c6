//! Status report writer.

use std::path::Path;

use tracing::info;

use crate::error::ReportError;
use crate::pipeline::OutputRecord;

/// Report column names, in order.
pub const REPORT_HEADER: [&str; 7] = [
    "order_number",
    "site",
    "status",
    "tracking",
    "carrier",
    "email_date",
    "subject",
];

/// Render records as CSV text, header first.
pub fn render_report(records: &[OutputRecord]) -> Result<String, ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(REPORT_HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write the report to `path`, creating parent directories.
pub fn write_report(path: &Path, records: &[OutputRecord]) -> Result<(), ReportError> {
    let text = render_report(records)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    info!(path = %path.display(), rows = records.len(), "Wrote status report");
    Ok(())
}
