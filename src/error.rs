//! Error types for the order tracker.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mailbox session errors.
///
/// `Connect`, `Tls` and `AuthFailed` abort the run. Everything raised while
/// searching or fetching for a single order is recovered by the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("Authentication rejected for {user}")]
    AuthFailed { user: String },

    #[error("Failed to select folder {folder}: {reason}")]
    SelectFailed { folder: String, reason: String },

    #[error("Command {command} failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed by server")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Spreadsheet source errors.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Failed to fetch sheet: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Sheet request returned HTTP {status}")]
    Http { status: u16 },

    #[error("Failed to read sheet file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed sheet CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Sheet has no order number column (found: {found})")]
    MissingColumn { found: String },
}

/// Report writer errors.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode report CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for the tracker.
pub type Result<T> = std::result::Result<T, Error>;
