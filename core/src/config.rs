//! configuration for the benchmark binary.
//!
//! `volley <host> <port>`; everything else comes from the environment with
//! defaults matching the reference benchmark.

use std::time::Duration;
use thiserror::Error;
use volley_quic::{BenchConfig, Config as QuicConfig};

pub const ENV_REQUESTS: &str = "VOLLEY_REQUESTS";
pub const ENV_INTERVAL_MS: &str = "VOLLEY_INTERVAL_MS";
pub const ENV_GRACE_MS: &str = "VOLLEY_GRACE_MS";
pub const ENV_PATH: &str = "VOLLEY_PATH";
pub const ENV_IDLE_TIMEOUT_MS: &str = "VOLLEY_IDLE_TIMEOUT_MS";
pub const ENV_VERIFY_PEER: &str = "VOLLEY_VERIFY_PEER";

/// argument and environment errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("usage: {0} <host> <port>")]
    Usage(String),

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// benchmark configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// peer host name, also used for SNI.
    pub host: String,
    pub port: u16,
    /// request schedule.
    pub bench: BenchConfig,
    /// transport parameters.
    pub quic: QuicConfig,
}

impl Config {
    /// build from argv and an environment lookup.
    pub fn from_args<F>(args: &[String], env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let program = args.first().map(String::as_str).unwrap_or("volley");
        let (host, port) = match args {
            [_, host, port] => (host.clone(), port),
            _ => return Err(ConfigError::Usage(program.to_string())),
        };
        let port = port
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(port.clone()))?;

        let mut bench = BenchConfig::default();
        if let Some(requests) = env_parse::<usize, _>(&env, ENV_REQUESTS)? {
            bench = bench.with_requests(requests);
        }
        if let Some(ms) = env_parse::<u64, _>(&env, ENV_INTERVAL_MS)? {
            bench = bench.with_request_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = env_parse::<u64, _>(&env, ENV_GRACE_MS)? {
            bench = bench.with_shutdown_grace(Duration::from_millis(ms));
        }
        if let Some(path) = env(ENV_PATH) {
            bench = bench.with_path(&path);
        }

        let mut quic = QuicConfig::default();
        if let Some(ms) = env_parse::<u64, _>(&env, ENV_IDLE_TIMEOUT_MS)? {
            quic = quic.with_idle_timeout(Duration::from_millis(ms));
        }
        if let Some(value) = env(ENV_VERIFY_PEER) {
            quic = quic.with_verify_peer(parse_bool(ENV_VERIFY_PEER, &value)?);
        }

        Ok(Self {
            host,
            port,
            bench,
            quic,
        })
    }

    /// build from the process arguments and environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args, |name| std::env::var(name).ok())
    }
}

fn env_parse<T, F>(env: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match env(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_positional_args() {
        let config = Config::from_args(&args(&["volley", "example.org", "4433"]), no_env).unwrap();

        assert_eq!(config.host, "example.org");
        assert_eq!(config.port, 4433);
        assert_eq!(config.bench.requests, 100);
        assert_eq!(config.bench.request_interval, Duration::from_millis(100));
        assert_eq!(config.bench.shutdown_grace, Duration::from_secs(1));
        assert_eq!(config.quic.idle_timeout_ms, 30_000);
        assert!(!config.quic.verify_peer);
    }

    #[test]
    fn test_usage() {
        let err = Config::from_args(&args(&["volley", "example.org"]), no_env).unwrap_err();
        assert_eq!(err, ConfigError::Usage("volley".into()));

        let err = Config::from_args(&args(&["volley", "a", "1", "extra"]), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Usage(_)));
    }

    #[test]
    fn test_invalid_port() {
        let err = Config::from_args(&args(&["volley", "host", "70000"]), no_env).unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort("70000".into()));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_REQUESTS, "3"),
            (ENV_INTERVAL_MS, "50"),
            (ENV_GRACE_MS, "250"),
            (ENV_PATH, "/1kb"),
            (ENV_IDLE_TIMEOUT_MS, "5000"),
            (ENV_VERIFY_PEER, "true"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_args(&args(&["volley", "::1", "443"]), |name| {
            env.get(name).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.bench.requests, 3);
        assert_eq!(config.bench.request_interval, Duration::from_millis(50));
        assert_eq!(config.bench.shutdown_grace, Duration::from_millis(250));
        assert_eq!(config.bench.request, b"GET /1kb\r\n");
        assert_eq!(config.quic.idle_timeout_ms, 5000);
        assert!(config.quic.verify_peer);
    }

    #[test]
    fn test_invalid_env() {
        let err = Config::from_args(&args(&["volley", "host", "443"]), |name| {
            (name == ENV_REQUESTS).then(|| "lots".to_string())
        })
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                name: ENV_REQUESTS,
                value: "lots".into()
            }
        );
    }
}
