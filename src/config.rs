//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default IMAP host.
pub const DEFAULT_IMAP_HOST: &str = "imap.gmail.com";
/// Default folder searched for order emails.
pub const DEFAULT_MAILBOX: &str = "INBOX";
/// Default report destination.
pub const DEFAULT_REPORT_PATH: &str = "data/status.csv";
/// Upper bound on parallel mailbox sessions.
pub const MAX_WORKERS: usize = 8;

/// Connection settings for the mail store.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Account secret (app password). Redacted in `Debug` output.
    pub password: SecretString,
    pub folder: String,
    /// Socket read timeout for the whole connection.
    pub timeout: Duration,
}

/// Full run configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub mailbox: MailboxConfig,
    /// Sheet CSV location: an `http(s)://` URL or a local path.
    pub sheet_source: String,
    pub report_path: PathBuf,
    /// Number of parallel mailbox sessions (1 = sequential).
    pub workers: usize,
}

impl TrackerConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let sheet_source = required("SHEET_CSV_URL")?;
        let username = required("IMAP_EMAIL")?;
        let password = SecretString::from(required("IMAP_APP_PASSWORD")?);

        let host = get("IMAP_SERVER").unwrap_or_else(|| DEFAULT_IMAP_HOST.to_string());

        let port: u16 = get("IMAP_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(993);

        let folder = get("MAILBOX").unwrap_or_else(|| DEFAULT_MAILBOX.to_string());

        let timeout_secs: u64 = get("IMAP_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let report_path = get("STATUS_CSV_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH));

        let workers = match get("TRACKER_WORKERS") {
            Some(raw) => raw.parse::<usize>().map_err(|e| ConfigError::InvalidValue {
                key: "TRACKER_WORKERS".into(),
                message: e.to_string(),
            })?,
            None => 1,
        }
        .clamp(1, MAX_WORKERS);

        Ok(Self {
            mailbox: MailboxConfig {
                host,
                port,
                username,
                password,
                folder,
                timeout: Duration::from_secs(timeout_secs),
            },
            sheet_source,
            report_path,
            workers,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("SHEET_CSV_URL", "https://example.com/sheet.csv"),
        ("IMAP_EMAIL", "me@example.com"),
        ("IMAP_APP_PASSWORD", "app-pass"),
    ];

    #[test]
    fn defaults_applied() {
        let config = TrackerConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.mailbox.host, "imap.gmail.com");
        assert_eq!(config.mailbox.port, 993);
        assert_eq!(config.mailbox.folder, "INBOX");
        assert_eq!(config.mailbox.timeout, Duration::from_secs(30));
        assert_eq!(config.report_path, PathBuf::from("data/status.csv"));
        assert_eq!(config.workers, 1);
        assert_eq!(config.mailbox.password.expose_secret(), "app-pass");
    }

    #[test]
    fn overrides_applied() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("IMAP_SERVER", "imap.fastmail.com"),
            ("IMAP_PORT", "1993"),
            ("MAILBOX", "Orders"),
            ("STATUS_CSV_PATH", "out/report.csv"),
            ("TRACKER_WORKERS", "3"),
        ]);
        let config = TrackerConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.mailbox.host, "imap.fastmail.com");
        assert_eq!(config.mailbox.port, 1993);
        assert_eq!(config.mailbox.folder, "Orders");
        assert_eq!(config.report_path, PathBuf::from("out/report.csv"));
        assert_eq!(config.workers, 3);
    }

    #[test]
    fn missing_password_is_error() {
        let err = TrackerConfig::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "IMAP_APP_PASSWORD"));
    }

    #[test]
    fn missing_sheet_source_is_error() {
        let err = TrackerConfig::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "SHEET_CSV_URL"));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[1] = ("IMAP_EMAIL", "   ");
        let err = TrackerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "IMAP_EMAIL"));
    }

    #[test]
    fn bad_port_falls_back_to_default() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("IMAP_PORT", "not-a-port"));
        let config = TrackerConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.mailbox.port, 993);
    }

    #[test]
    fn workers_clamped() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TRACKER_WORKERS", "0"));
        assert_eq!(TrackerConfig::from_lookup(lookup(&pairs)).unwrap().workers, 1);

        pairs.pop();
        pairs.push(("TRACKER_WORKERS", "64"));
        assert_eq!(
            TrackerConfig::from_lookup(lookup(&pairs)).unwrap().workers,
            MAX_WORKERS
        );
    }

    #[test]
    fn invalid_workers_is_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("TRACKER_WORKERS", "many"));
        let err = TrackerConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn debug_redacts_password() {
        let config = TrackerConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("app-pass"));
    }
}
