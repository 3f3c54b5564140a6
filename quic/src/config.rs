//! configuration for the benchmark connection

use std::time::Duration;

/// largest datagram handed to the socket
pub const MAX_DATAGRAM_SIZE: usize = 1350;

/// largest datagram read from the socket
pub const MAX_RECV_SIZE: usize = 65535;

/// QUIC transport configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// ALPN identifiers, most preferred first
    pub application_protos: Vec<Vec<u8>>,
    pub idle_timeout_ms: u64,
    /// max UDP payload for both directions
    pub max_datagram_size: usize,
    pub initial_max_data: u64,
    pub initial_max_stream_data_bidi_local: u64,
    pub initial_max_stream_data_bidi_remote: u64,
    pub initial_max_stream_data_uni: u64,
    pub initial_max_streams_bidi: u64,
    pub initial_max_streams_uni: u64,
    pub disable_active_migration: bool,
    /// verify the server certificate chain
    pub verify_peer: bool,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            application_protos: vec![b"hq-interop".to_vec(), b"http/0.9".to_vec()],
            idle_timeout_ms: 30_000,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            initial_max_data: 10_000_000,
            initial_max_stream_data_bidi_local: 1_000_000,
            initial_max_stream_data_bidi_remote: 1_000_000,
            initial_max_stream_data_uni: 1_000_000,
            initial_max_streams_bidi: 100,
            initial_max_streams_uni: 100,
            disable_active_migration: true,
            verify_peer: false,
        }
    }
}

impl Config {
    /// set idle timeout
    #[inline]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// enable or disable certificate verification
    #[inline]
    pub fn with_verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }
}

/// request schedule for one benchmark run
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// total requests to issue
    pub requests: usize,
    /// cadence of the request timer
    pub request_interval: Duration,
    /// wait after the last request before closing
    pub shutdown_grace: Duration,
    /// payload written on every request stream
    pub request: Vec<u8>,
}

impl Default for BenchConfig {
    #[inline]
    fn default() -> Self {
        Self {
            requests: 100,
            request_interval: Duration::from_millis(100),
            shutdown_grace: Duration::from_secs(1),
            request: Self::request_for("/index.html"),
        }
    }
}

impl BenchConfig {
    /// HTTP/0.9 request line for `path`
    pub fn request_for(path: &str) -> Vec<u8> {
        format!("GET {}\r\n", path).into_bytes()
    }

    #[inline]
    pub fn with_requests(mut self, requests: usize) -> Self {
        self.requests = requests;
        self
    }

    #[inline]
    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    #[inline]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// set the request path
    #[inline]
    pub fn with_path(mut self, path: &str) -> Self {
        self.request = Self::request_for(path);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.idle_timeout_ms, 30_000);
        assert_eq!(config.max_datagram_size, 1350);
        assert!(config.disable_active_migration);

        let bench = BenchConfig::default();
        assert_eq!(bench.requests, 100);
        assert_eq!(bench.request, b"GET /index.html\r\n");
    }

    #[test]
    fn test_builders() {
        let bench = BenchConfig::default()
            .with_requests(3)
            .with_path("/big.bin")
            .with_shutdown_grace(Duration::from_millis(250));

        assert_eq!(bench.requests, 3);
        assert_eq!(bench.request, b"GET /big.bin\r\n");
        assert_eq!(bench.shutdown_grace, Duration::from_millis(250));

        let config = Config::default().with_idle_timeout(Duration::from_secs(5));
        assert_eq!(config.idle_timeout_ms, 5000);
    }
}
