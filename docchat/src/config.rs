//! Client configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use url::Url;

use crate::channel::{
    ChannelConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY,
};
use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "http://localhost:4000";
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:4000/ws";

/// Endpoints and channel tuning.
#[derive(Debug, Clone)]
pub struct Config {
    /// REST base URL (`http` or `https`).
    pub api_url: Url,
    /// Channel URL (`ws` or `wss`).
    pub socket_url: Url,
    /// Bound on each connection attempt.
    pub connect_timeout: Duration,
    /// Connection attempts before the channel gives up.
    pub reconnect_attempts: u32,
    /// Fixed delay between attempts.
    pub reconnect_delay: Duration,
}

impl Config {
    /// Load configuration from `DOCCHAT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = parse_api_url(
            &lookup("DOCCHAT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )?;
        let socket_url = parse_socket_url(
            &lookup("DOCCHAT_SOCKET_URL").unwrap_or_else(|| DEFAULT_SOCKET_URL.to_string()),
        )?;
        let connect_timeout = parse_number(&lookup, "DOCCHAT_CONNECT_TIMEOUT_SECS")?
            .map_or(DEFAULT_CONNECT_TIMEOUT, Duration::from_secs);
        let reconnect_attempts = match parse_number(&lookup, "DOCCHAT_RECONNECT_ATTEMPTS")? {
            Some(n) => u32::try_from(n).map_err(|_| {
                Error::Config(format!("DOCCHAT_RECONNECT_ATTEMPTS out of range: {n}"))
            })?,
            None => DEFAULT_RECONNECT_ATTEMPTS,
        };
        let reconnect_delay = parse_number(&lookup, "DOCCHAT_RECONNECT_DELAY_MS")?
            .map_or(DEFAULT_RECONNECT_DELAY, Duration::from_millis);

        Ok(Self {
            api_url,
            socket_url,
            connect_timeout,
            reconnect_attempts,
            reconnect_delay,
        })
    }

    /// Override the REST base URL.
    pub fn with_api_url(mut self, raw: &str) -> Result<Self> {
        self.api_url = parse_api_url(raw)?;
        Ok(self)
    }

    /// Override the channel URL.
    pub fn with_socket_url(mut self, raw: &str) -> Result<Self> {
        self.socket_url = parse_socket_url(raw)?;
        Ok(self)
    }

    /// Settings for `Channel::open`.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            url: self.socket_url.clone(),
            connect_timeout: self.connect_timeout,
            reconnect_attempts: self.reconnect_attempts,
            reconnect_delay: self.reconnect_delay,
        }
    }
}

fn parse_api_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::InvalidUrl(format!(
            "API URL must use http:// or https:// scheme, got: {}",
            url.scheme()
        )));
    }
    Ok(url)
}

fn parse_socket_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    if url.scheme() != "ws" && url.scheme() != "wss" {
        return Err(Error::InvalidUrl(format!(
            "URL must use ws:// or wss:// scheme, got: {}",
            url.scheme()
        )));
    }
    Ok(url)
}

fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("{key}: {e}")))
        })
        .transpose()
}
