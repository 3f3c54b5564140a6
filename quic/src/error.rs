//! error types for the QUIC client driver

use thiserror::Error;

/// client driver errors
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("QUIC error: {0}")]
    Quic(#[from] quiche::Error),

    /// the socket accepted fewer bytes than the datagram holds
    #[error("Short write: sent {sent} of {len} bytes")]
    ShortWrite { sent: usize, len: usize },

    /// a send to the connected socket would have blocked
    #[error("Socket send would block")]
    SendWouldBlock,

    #[error("Entropy source failure")]
    Entropy,
}

/// result type alias
pub type Result<T> = std::result::Result<T, Error>;
