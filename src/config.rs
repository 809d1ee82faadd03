//! Configuration management
//!
//! Everything is read from the environment once at startup. Numeric
//! values outside their documented range are clamped with a warning,
//! never rejected; only a missing or malformed bot token is fatal.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static TOKEN_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+:[A-Za-z0-9_-]+$").expect("token regex"));

/// Tool surface shape exposed over MCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    /// One tool per Bot API method.
    Flat,
    /// Two tools: `find_method` + `call_method`.
    Meta,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token, format `<digits>:<secret>`. Never logged.
    pub bot_token: String,

    /// Bot API origin (override for local test servers).
    pub api_url: String,

    /// Log level name as configured (debug..critical).
    pub log_level: String,

    /// Per-call HTTP timeout in milliseconds, clamped 5000..120000.
    pub request_timeout_ms: u64,

    /// Retry budget per invocation, clamped 0..10.
    pub max_retries: u32,

    /// Global outbound budget per trailing minute, clamped 1..60.
    pub rate_limit_per_minute: u32,

    /// Outward webhook registration URL, if any.
    pub webhook_url: Option<String>,

    /// Shared secret expected in `X-Telegram-Bot-Api-Secret-Token`.
    pub webhook_secret: Option<String>,

    /// Port for the inbound webhook receiver; `None` disables it.
    pub webhook_port: Option<u16>,

    /// Port for the health/metrics surface; `None` disables it.
    pub health_port: Option<u16>,

    /// Port for MCP-over-HTTP framing; `None` leaves stdio only.
    pub mcp_http_port: Option<u16>,

    /// Bearer token required on the MCP HTTP endpoint, if set.
    pub mcp_http_token: Option<String>,

    /// Tool surface shape.
    pub tool_mode: ToolMode,

    pub debug: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let bot_token = match std::env::var("TELEGRAM_BOT_TOKEN") {
            Ok(t) if TOKEN_FORMAT.is_match(&t) => t,
            Ok(_) => bail!("TELEGRAM_BOT_TOKEN does not match <bot_id>:<secret> format"),
            Err(_) => bail!("TELEGRAM_BOT_TOKEN must be set"),
        };

        let api_url = std::env::var("TELEGRAM_API_URL")
            .unwrap_or_else(|_| "https://api.telegram.org".to_string());

        let log_level = std::env::var("LOG_LEVEL")
            .map(|v| v.to_lowercase())
            .ok()
            .filter(|v| {
                matches!(
                    v.as_str(),
                    "debug" | "info" | "notice" | "warning" | "error" | "critical"
                )
            })
            .unwrap_or_else(|| "info".to_string());

        let request_timeout_ms = clamped_env("REQUEST_TIMEOUT", 30_000, 5_000, 120_000);
        let max_retries = clamped_env("MAX_RETRIES", 3, 0, 10) as u32;
        let rate_limit_per_minute = clamped_env("RATE_LIMIT_PER_MINUTE", 30, 1, 60) as u32;

        let webhook_url = std::env::var("WEBHOOK_URL").ok().filter(|s| !s.is_empty());
        let webhook_secret = std::env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());
        let webhook_port = port_env("WEBHOOK_PORT");
        let health_port = port_env("HEALTH_PORT");
        let mcp_http_port = port_env("MCP_HTTP_PORT");
        let mcp_http_token = std::env::var("MCP_HTTP_TOKEN").ok().filter(|s| !s.is_empty());

        let tool_mode = match std::env::var("MCP_TOOL_MODE").as_deref() {
            Ok("meta") => ToolMode::Meta,
            _ => ToolMode::Flat,
        };

        let debug = std::env::var("DEBUG")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            bot_token,
            api_url,
            log_level,
            request_timeout_ms,
            max_retries,
            rate_limit_per_minute,
            webhook_url,
            webhook_secret,
            webhook_port,
            health_port,
            mcp_http_port,
            mcp_http_token,
            tool_mode,
            debug,
        })
    }

    /// Log-safe view: token shown as `first4…last4`, secrets redacted,
    /// URLs reduced to scheme+host.
    pub fn masked(&self) -> MaskedConfig {
        MaskedConfig {
            bot_token: mask_token(&self.bot_token),
            api_url: mask_url(&self.api_url),
            log_level: self.log_level.clone(),
            request_timeout_ms: self.request_timeout_ms,
            max_retries: self.max_retries,
            rate_limit_per_minute: self.rate_limit_per_minute,
            webhook_url: self.webhook_url.as_deref().map(mask_url),
            webhook_secret: self.webhook_secret.as_ref().map(|_| "[REDACTED]".to_string()),
            webhook_port: self.webhook_port,
            health_port: self.health_port,
            mcp_http_token: self.mcp_http_token.as_ref().map(|_| "[REDACTED]".to_string()),
            debug: self.debug,
        }
    }
}

/// Redacted configuration snapshot, safe to log or expose.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MaskedConfig {
    pub bot_token: String,
    pub api_url: String,
    pub log_level: String,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub rate_limit_per_minute: u32,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_port: Option<u16>,
    pub health_port: Option<u16>,
    pub mcp_http_token: Option<String>,
    pub debug: bool,
}

fn clamped_env(name: &str, default: u64, min: u64, max: u64) -> u64 {
    let raw = match std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok()) {
        Some(v) => v,
        None => return default,
    };

    if raw < min || raw > max {
        warn!("{} = {} outside {}..{}, clamping", name, raw, min, max);
    }
    raw.clamp(min, max)
}

fn port_env(name: &str) -> Option<u16> {
    std::env::var(name).ok().and_then(|v| v.parse::<u16>().ok())
}

fn mask_token(token: &str) -> String {
    if token.len() <= 8 {
        return "[REDACTED]".to_string();
    }
    format!("{}…{}", &token[..4], &token[token.len() - 4..])
}

fn mask_url(url: &str) -> String {
    // scheme://host/*** without pulling in a URL parser
    match url.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.split('/').next().unwrap_or(rest);
            format!("{}://{}/***", scheme, host)
        }
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_format_accepts_real_shape() {
        assert!(TOKEN_FORMAT.is_match("123456789:AAHfBj3Xw9_k-abcDEF123ghiJKLmno45pq"));
        assert!(!TOKEN_FORMAT.is_match("no-colon-here"));
        assert!(!TOKEN_FORMAT.is_match("abc:def"));
        assert!(!TOKEN_FORMAT.is_match("123:with spaces"));
    }

    #[test]
    fn mask_token_keeps_edges() {
        let masked = mask_token("123456789:AAHfBj3Xw9abcdef");
        assert!(masked.starts_with("1234"));
        assert!(masked.ends_with("cdef"));
        assert!(!masked.contains("AAHfBj3Xw9"));
    }

    #[test]
    fn mask_token_short_values() {
        assert_eq!(mask_token("12:ab"), "[REDACTED]");
    }

    #[test]
    fn mask_url_strips_path() {
        assert_eq!(
            mask_url("https://api.telegram.org/bot123:secret/sendMessage"),
            "https://api.telegram.org/***"
        );
        assert_eq!(mask_url("not a url"), "***");
    }

    #[test]
    fn clamp_bounds() {
        // clamped_env reads the environment; exercise the clamp directly
        assert_eq!(4_000u64.clamp(5_000, 120_000), 5_000);
        assert_eq!(500_000u64.clamp(5_000, 120_000), 120_000);
        assert_eq!(30_000u64.clamp(5_000, 120_000), 30_000);
    }
}
