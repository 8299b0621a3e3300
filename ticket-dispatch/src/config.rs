//! Dispatch configuration
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | PAPER_WIDTH | 48 | characters per ticket line |
//! | TICKET_TIMEZONE | UTC | IANA timezone printed on tickets |
//! | EPOS_ENVELOPE | direct | `direct` or `print-xml-string` |
//! | EPOS_DEVICE_ID | local_printer | devid for `print-xml-string` |
//! | CONNECT_TIMEOUT_MS | 5000 | TCP / HTTPS connect timeout |
//! | WRITE_TIMEOUT_MS | 5000 | raw TCP write deadline |
//! | LINGER_MS | 1000 | wait after a raw write before closing |
//! | EPOS_TIMEOUT_MS | 10000 | overall ePOS request deadline |
//! | INTER_DISPATCH_DELAY_MS | 150 | pause between tickets on one printer |
//! | RETRY_ATTEMPTS | 1 | attempts per ticket (1 = no retry) |
//! | RETRY_BACKOFF_MS | 500 | pause between attempts |
//! | LOG_LEVEL | info | tracing level |
//! | LOG_DIR | - | write daily log files here when set |

use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use pos_printer::{EnvelopeStyle, PrintResult, Scheme};
use thiserror::Error;

use crate::coordinator::{CoordinatorConfig, OrderPrintCoordinator, RetryPolicy};
use crate::dispatcher::{DispatchConfig, PrinterDispatcher};
use crate::renderer::TicketRenderer;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Unknown ePOS envelope style: {0} (expected direct or print-xml-string)")]
    UnknownEnvelope(String),
}

/// Settings for rendering and dispatching tickets
#[derive(Debug, Clone)]
pub struct Config {
    pub paper_width: usize,
    pub timezone: Tz,
    pub envelope: EnvelopeStyle,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub linger: Duration,
    pub epos_timeout: Duration,
    pub epos_scheme: Scheme,
    pub inter_dispatch_delay: Duration,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paper_width: 48,
            timezone: chrono_tz::UTC,
            envelope: EnvelopeStyle::Direct,
            connect_timeout: Duration::from_millis(5000),
            write_timeout: Duration::from_millis(5000),
            linger: Duration::from_millis(1000),
            epos_timeout: Duration::from_millis(10000),
            epos_scheme: Scheme::Https,
            inter_dispatch_delay: Duration::from_millis(150),
            retry_attempts: 1,
            retry_backoff: Duration::from_millis(500),
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load from environment variables, using defaults for unset ones
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timezone = match get("TICKET_TIMEZONE") {
            Some(name) => Tz::from_str(&name).map_err(|_| ConfigError::UnknownTimezone(name))?,
            None => defaults.timezone,
        };

        let envelope = match get("EPOS_ENVELOPE").as_deref() {
            None | Some("direct") => EnvelopeStyle::Direct,
            Some("print-xml-string") => EnvelopeStyle::PrintXmlString {
                device_id: get("EPOS_DEVICE_ID").unwrap_or_else(|| "local_printer".to_string()),
                timeout_ms: parse(&get, "EPOS_TIMEOUT_MS", 10000)?,
            },
            Some(other) => return Err(ConfigError::UnknownEnvelope(other.to_string())),
        };

        Ok(Self {
            paper_width: parse(&get, "PAPER_WIDTH", defaults.paper_width)?,
            timezone,
            envelope,
            connect_timeout: millis(&get, "CONNECT_TIMEOUT_MS", defaults.connect_timeout)?,
            write_timeout: millis(&get, "WRITE_TIMEOUT_MS", defaults.write_timeout)?,
            linger: millis(&get, "LINGER_MS", defaults.linger)?,
            epos_timeout: millis(&get, "EPOS_TIMEOUT_MS", defaults.epos_timeout)?,
            epos_scheme: defaults.epos_scheme,
            inter_dispatch_delay: millis(
                &get,
                "INTER_DISPATCH_DELAY_MS",
                defaults.inter_dispatch_delay,
            )?,
            retry_attempts: parse(&get, "RETRY_ATTEMPTS", defaults.retry_attempts)?.max(1),
            retry_backoff: millis(&get, "RETRY_BACKOFF_MS", defaults.retry_backoff)?,
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: get("LOG_DIR"),
        })
    }

    pub fn renderer(&self) -> TicketRenderer {
        TicketRenderer::new(self.paper_width, self.timezone).with_envelope(self.envelope.clone())
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            connect_timeout: self.connect_timeout,
            write_timeout: self.write_timeout,
            linger: self.linger,
            epos_timeout: self.epos_timeout,
            epos_scheme: self.epos_scheme,
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            inter_dispatch_delay: self.inter_dispatch_delay,
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                backoff: self.retry_backoff,
            },
        }
    }

    /// Assemble a coordinator from these settings
    pub fn build_coordinator(&self) -> PrintResult<OrderPrintCoordinator> {
        Ok(OrderPrintCoordinator::new(
            self.renderer(),
            PrinterDispatcher::new(self.dispatch_config())?,
            self.coordinator_config(),
        ))
    }
}

fn parse<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

fn millis<G>(get: &G, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let ms = parse(get, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}
