//! volley: QUIC request/response latency benchmark.
//!
//! thin wiring around `volley_quic`:
//! - resolve the peer and connect a non-blocking UDP socket
//! - create the quiche connection with a random 16-byte scid
//! - run the client loop until the grace period ends or the engine closes
//!
//! ```text
//! ┌──────────────┐  readable   ┌───────────────┐  send/recv  ┌──────────────┐
//! │  mio::Poll   │────────────▶│    Client     │────────────▶│ QuicheEngine │
//! │ (socket+tmr) │◀────────────│ ledger/timers │◀────────────│  (quiche)    │
//! └──────────────┘  deadline   └───────────────┘   timeout   └──────────────┘
//! ```

pub mod config;

pub use config::{Config, ConfigError};

use std::io::Write;
use volley_quic::{socket, Client, Outcome, QuicheEngine};

/// process exit status for a finished run.
pub fn exit_code(outcome: &Outcome) -> i32 {
    if outcome.is_success() {
        0
    } else {
        1
    }
}

/// connect to the configured peer and run the benchmark, writing responses
/// and the latency report to `out`.
pub fn run<W: Write>(config: &Config, out: W) -> volley_quic::Result<Outcome> {
    let peer = socket::resolve(&config.host, config.port)?;
    let sock = socket::connect(peer)?;
    let local = sock.local_addr()?;

    let scid = volley_quic::generate_scid()?;
    let engine = QuicheEngine::connect(&config.host, &scid, local, peer, &config.quic)?;

    log::info!(
        "run: {} requests every {:?} to {}:{} ({})",
        config.bench.requests,
        config.bench.request_interval,
        config.host,
        config.port,
        peer
    );

    let mut client = Client::new(engine, sock, out, config.bench.clone());
    client.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use volley_quic::TransportStats;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Outcome::Finished), 0);
        assert_eq!(exit_code(&Outcome::Closed(TransportStats::default())), 0);
        assert_eq!(exit_code(&Outcome::CloseRejected), 1);
    }
}
