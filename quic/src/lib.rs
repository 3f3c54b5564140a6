//! single-connection QUIC benchmark client
//!
//! drives one quiche connection over a connected non-blocking mio UDP socket:
//! issues HTTP/0.9 requests on a fixed cadence, copies the responses out,
//! and records per-request latency.
//!
//! # example
//!
//! ```no_run
//! use volley_quic::{socket, BenchConfig, Client, Config, QuicheEngine};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let peer = socket::resolve("localhost", 4433)?;
//!     let sock = socket::connect(peer)?;
//!     let scid = volley_quic::generate_scid()?;
//!     let engine = QuicheEngine::connect("localhost", &scid, sock.local_addr()?, peer, &Config::default())?;
//!
//!     let mut client = Client::new(engine, sock, std::io::stdout(), BenchConfig::default());
//!     let outcome = client.run()?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod socket;
pub mod timer;

pub use client::{request_index, stream_id_for, Client, Flow, Outcome, Phase};
pub use config::{BenchConfig, Config, MAX_DATAGRAM_SIZE, MAX_RECV_SIZE};
pub use engine::{generate_scid, Engine, QuicheEngine, TransportStats, LOCAL_CONN_ID_LEN};
pub use error::{Error, Result};
pub use socket::DatagramSocket;
pub use timer::{TimerKind, Timers};

/// prelude for convenient imports
pub mod prelude {
    pub use crate::client::{Client, Outcome};
    pub use crate::config::{BenchConfig, Config};
    pub use crate::engine::{Engine, QuicheEngine};
    pub use crate::error::{Error, Result};
}
