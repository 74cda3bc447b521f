//! Mailbox configuration from `MAIL_*` variables.

use secrecy::SecretString;

use crate::config::parse_number;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    /// Messages returned per read/search/summarize.
    pub fetch_limit: usize,
}

impl MailboxConfig {
    /// `Ok(None)` when `MAIL_IMAP_HOST` is unset (mailbox disabled).
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, ConfigError> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let Some(imap_host) = var("MAIL_IMAP_HOST") else {
            return Ok(None);
        };
        let number = |key: &str, default: u64| -> Result<u64, ConfigError> {
            var(key).map_or(Ok(default), |raw| parse_number(key, &raw))
        };

        let imap_port = port("MAIL_IMAP_PORT", number("MAIL_IMAP_PORT", 993)?)?;
        let smtp_port = port("MAIL_SMTP_PORT", number("MAIL_SMTP_PORT", 587)?)?;
        let fetch_limit = number("MAIL_FETCH_LIMIT", 5)?.max(1) as usize;

        let smtp_host = var("MAIL_SMTP_HOST").unwrap_or_else(|| imap_host.replace("imap", "smtp"));
        let username = var("MAIL_USERNAME").ok_or_else(|| {
            ConfigError::MissingEnvVar("MAIL_USERNAME".into())
        })?;
        let password = var("MAIL_PASSWORD")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("MAIL_PASSWORD".into()))?;
        let from_address = var("MAIL_FROM_ADDRESS").unwrap_or_else(|| username.clone());

        Ok(Some(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password,
            from_address,
            fetch_limit,
        }))
    }
}

fn port(key: &str, value: u64) -> Result<u16, ConfigError> {
    u16::try_from(value)
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.into(),
            message: format!("{value} is not a valid port"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Option<MailboxConfig>, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MailboxConfig::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn disabled_without_imap_host() {
        assert!(from_pairs(&[("MAIL_USERNAME", "me")]).unwrap().is_none());
    }

    #[test]
    fn defaults_derive_from_imap_host() {
        let config = from_pairs(&[
            ("MAIL_IMAP_HOST", "imap.example.com"),
            ("MAIL_USERNAME", "me@example.com"),
            ("MAIL_PASSWORD", "hunter2"),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(config.imap_port, 993);
        assert_eq!(config.smtp_host, "smtp.example.com");
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.from_address, "me@example.com");
        assert_eq!(config.fetch_limit, 5);
        assert_eq!(config.password.expose_secret(), "hunter2");
    }

    #[test]
    fn missing_credentials_are_errors() {
        let err = from_pairs(&[
            ("MAIL_IMAP_HOST", "imap.example.com"),
            ("MAIL_USERNAME", "me@example.com"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "MAIL_PASSWORD"));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = from_pairs(&[
            ("MAIL_IMAP_HOST", "imap.example.com"),
            ("MAIL_IMAP_PORT", "70000"),
            ("MAIL_USERNAME", "me"),
            ("MAIL_PASSWORD", "pw"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MAIL_IMAP_PORT"));

        let err = from_pairs(&[
            ("MAIL_IMAP_HOST", "imap.example.com"),
            ("MAIL_SMTP_PORT", "smtp"),
            ("MAIL_USERNAME", "me"),
            ("MAIL_PASSWORD", "pw"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
