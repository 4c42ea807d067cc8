//! Error taxonomy for the protocol layer.
//!
//! A small `thiserror` enum for the errors the protocol itself can produce
//! (so callers can match on them — e.g. the operator CLI reports
//! `InsufficientFunds` as FAILED); everything below the protocol boundary
//! still propagates through `anyhow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Raised only by the originator during its own commit. Surfaces to the
    /// CLI as FAILED; no block is created, no BLOCK_UPDATE is sent, and the
    /// mutex is still released.
    #[error("insufficient funds: {sender} has {have}, needs {need}")]
    InsufficientFunds {
        sender: String,
        have: u64,
        need: u64,
    },

    /// `ApplyRemote` observed a block whose index or previous_hash doesn't
    /// match the local chain. Must not occur under correct operation; this is
    /// a fatal invariant violation, so the caller halts the peer rather than
    /// continuing with divergent state.
    #[error("chain mismatch at index {index}: {reason}")]
    ChainMismatch { index: u64, reason: String },

    /// A `submit` call arrived while this peer already had an outstanding
    /// request — not expected under correct CLI usage, but must not be
    /// allowed to corrupt engine state.
    #[error("peer is already processing a transfer")]
    Busy,

    /// Logged and dropped at the transport boundary; never surfaces past it.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Inability to send a message. Logged; protocol state unchanged.
    #[error("transport failure sending to {dest}: {source}")]
    TransportFailure {
        dest: String,
        #[source]
        source: anyhow::Error,
    },
}
