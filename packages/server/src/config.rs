use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::kernel::DEFAULT_SWEEP_SCHEDULE;

/// Upper bound on `OTP_TTL_SECONDS` (one day)
pub const MAX_OTP_TTL_SECONDS: i64 = 86_400;

/// Twilio credentials for the SMS notifier
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub store_uri: String,
    pub store_max_connections: u32,
    /// `host:port` to bind; `:8000` style values mean all interfaces
    pub listen_addr: String,
    pub otp_ttl_seconds: i64,
    pub otp_max_attempts: u32,
    /// Requests per minute per client IP; 0 disables rate limiting
    pub rate_limit_per_minute: u32,
    pub request_timeout_seconds: u64,
    pub shutdown_grace_seconds: u64,
    pub sweep_schedule: String,
    /// Key rate limiting on X-Forwarded-For / X-Real-IP instead of the
    /// socket address. Only safe behind a proxy that overwrites them.
    pub trust_proxy_headers: bool,
    /// `None` means codes go to the log notifier
    pub twilio: Option<TwilioConfig>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let store_uri = get("STORE_URI").context("STORE_URI must be set")?;

        let otp_ttl_seconds: i64 = parse_or(&get, "OTP_TTL_SECONDS", 300)?;
        if otp_ttl_seconds <= 0 {
            bail!("OTP_TTL_SECONDS must be greater than zero");
        }
        if otp_ttl_seconds > MAX_OTP_TTL_SECONDS {
            bail!(
                "OTP_TTL_SECONDS must be at most {} (got {})",
                MAX_OTP_TTL_SECONDS,
                otp_ttl_seconds
            );
        }

        let otp_max_attempts: u32 = parse_or(&get, "OTP_MAX_ATTEMPTS", 5)?;
        if otp_max_attempts == 0 {
            bail!("OTP_MAX_ATTEMPTS must be greater than zero");
        }

        let twilio = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_FROM_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from_number,
            }),
            (None, None, None) => None,
            _ => bail!(
                "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_FROM_NUMBER must be set together"
            ),
        };

        Ok(Self {
            store_uri,
            store_max_connections: parse_or(&get, "STORE_MAX_CONNECTIONS", 10)?,
            listen_addr: normalize_listen_addr(
                &get("LISTEN_ADDR").unwrap_or_else(|| ":8000".to_string()),
            ),
            otp_ttl_seconds,
            otp_max_attempts,
            rate_limit_per_minute: parse_or(&get, "RATE_LIMIT_PER_MINUTE", 30)?,
            request_timeout_seconds: parse_or(&get, "REQUEST_TIMEOUT_SECONDS", 10)?,
            shutdown_grace_seconds: parse_or(&get, "SHUTDOWN_GRACE_SECONDS", 10)?,
            sweep_schedule: get("SWEEP_SCHEDULE")
                .unwrap_or_else(|| DEFAULT_SWEEP_SCHEDULE.to_string()),
            trust_proxy_headers: parse_bool_or(&get, "TRUST_PROXY_HEADERS", false)?,
            twilio,
        })
    }

    pub fn otp_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.otp_ttl_seconds)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(_) => bail!("{} must be true or false", key),
        None => Ok(default),
    }
}

/// `:8000` binds every interface, like Go's net/http
fn normalize_listen_addr(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with(':') {
        format!("0.0.0.0{}", raw)
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("STORE_URI", "memory://")]).unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.otp_ttl_seconds, 300);
        assert_eq!(config.otp_ttl(), chrono::Duration::minutes(5));
        assert_eq!(config.otp_max_attempts, 5);
        assert_eq!(config.rate_limit_per_minute, 30);
        assert_eq!(config.sweep_schedule, DEFAULT_SWEEP_SCHEDULE);
        assert!(config.twilio.is_none());
        assert!(!config.trust_proxy_headers);
    }

    #[test]
    fn test_store_uri_is_required() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("STORE_URI"));
    }

    #[test]
    fn test_explicit_listen_addr_is_kept() {
        let config =
            config_from(&[("STORE_URI", "memory://"), ("LISTEN_ADDR", "127.0.0.1:9000")]).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
    }

    #[test]
    fn test_ttl_override_and_validation() {
        let config =
            config_from(&[("STORE_URI", "memory://"), ("OTP_TTL_SECONDS", "120")]).unwrap();
        assert_eq!(config.otp_ttl(), chrono::Duration::minutes(2));

        assert!(config_from(&[("STORE_URI", "memory://"), ("OTP_TTL_SECONDS", "0")]).is_err());
        assert!(config_from(&[("STORE_URI", "memory://"), ("OTP_TTL_SECONDS", "five")]).is_err());
    }

    #[test]
    fn test_ttl_upper_bound() {
        let config = config_from(&[("STORE_URI", "memory://"), ("OTP_TTL_SECONDS", "86400")]).unwrap();
        assert_eq!(config.otp_ttl(), chrono::Duration::days(1));

        for too_long in ["86401", "10000000000000", "9223372036854775807"] {
            let err =
                config_from(&[("STORE_URI", "memory://"), ("OTP_TTL_SECONDS", too_long)]).unwrap_err();
            assert!(err.to_string().contains("OTP_TTL_SECONDS"));
        }
    }

    #[test]
    fn test_trust_proxy_headers_flag() {
        let config =
            config_from(&[("STORE_URI", "memory://"), ("TRUST_PROXY_HEADERS", "true")]).unwrap();
        assert!(config.trust_proxy_headers);

        assert!(config_from(&[("STORE_URI", "memory://"), ("TRUST_PROXY_HEADERS", "maybe")]).is_err());
    }

    #[test]
    fn test_twilio_requires_all_three() {
        let config = config_from(&[
            ("STORE_URI", "memory://"),
            ("TWILIO_ACCOUNT_SID", "AC1"),
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("TWILIO_FROM_NUMBER", "+15005550006"),
        ])
        .unwrap();
        assert_eq!(config.twilio.unwrap().account_sid, "AC1");

        assert!(config_from(&[("STORE_URI", "memory://"), ("TWILIO_ACCOUNT_SID", "AC1")]).is_err());
    }

    #[test]
    fn test_blank_values_count_as_unset() {
        let config = config_from(&[("STORE_URI", "memory://"), ("LISTEN_ADDR", "  ")]).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
    }
}
