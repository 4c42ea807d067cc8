//! Blocks and their canonical hash.
//!
//! The hash must be a deterministic digest over a canonical, key-sorted,
//! whitespace-free encoding of the block's other four fields. We get that by
//! declaring every struct's fields in sorted order up front and serializing
//! with `serde_json` (which preserves declaration order), rather than
//! sorting a `serde_json::Value` at hash time.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::AccountId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: u64,
    pub receiver: AccountId,
    pub sender: AccountId,
}

impl Transaction {
    pub fn new(sender: impl Into<AccountId>, receiver: impl Into<AccountId>, amount: u64) -> Self {
        Self {
            amount,
            receiver: receiver.into(),
            sender: sender.into(),
        }
    }

    fn genesis() -> Self {
        Self::new("None", "None", 0)
    }
}

/// Fields in sorted-key order, `hash` excluded — the exact bytes that get
/// hashed. Kept as a distinct type (rather than re-serializing `Block` minus
/// one field) so the hashed shape can never silently drift from `Block`'s.
#[derive(Serialize)]
struct Canonical<'a> {
    index: u64,
    previous_hash: &'a str,
    timestamp: u64,
    transaction: &'a Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: String,
    pub index: u64,
    pub previous_hash: String,
    pub timestamp: u64,
    pub transaction: Transaction,
}

impl Block {
    pub fn new(index: u64, previous_hash: String, transaction: Transaction, timestamp: u64) -> Self {
        let hash = Self::compute_hash(index, &previous_hash, timestamp, &transaction);
        Self {
            hash,
            index,
            previous_hash,
            timestamp,
            transaction,
        }
    }

    /// index 0, previous_hash "0", sentinel transaction. Timestamp is fixed
    /// at 0 rather than wall-clock time so every peer constructs byte-for-byte
    /// identical genesis state at startup.
    pub fn genesis() -> Self {
        Self::new(0, "0".to_string(), Transaction::genesis(), 0)
    }

    pub fn compute_hash(
        index: u64,
        previous_hash: &str,
        timestamp: u64,
        transaction: &Transaction,
    ) -> String {
        let canonical = Canonical {
            index,
            previous_hash,
            timestamp,
            transaction,
        };
        let bytes = serde_json::to_vec(&canonical).expect("canonical encoding never fails");
        let digest = Sha256::digest(&bytes);
        hex::encode(digest)
    }

    /// Re-derives this block's hash and compares against the stored one —
    /// used by `Chain::apply_remote` to reject a tampered or corrupted
    /// `BLOCK_UPDATE` before it ever reaches the balance table.
    pub fn recompute_hash(&self) -> String {
        Self::compute_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.transaction,
        )
    }
}
