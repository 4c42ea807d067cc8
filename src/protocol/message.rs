//! Wire messages.
//!
//! `Envelope` is the `type`-tagged object every peer sends/receives;
//! `Command` is the `command`-tagged object the operator CLI wraps in an
//! `Envelope::Command`.

use serde::{Deserialize, Serialize};

use crate::{config::PeerId, ledger::Block, ledger::Transaction};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    #[serde(rename = "REQUEST")]
    Request { sender: PeerId, timestamp: u64 },
    #[serde(rename = "REPLY")]
    Reply { sender: PeerId, timestamp: u64 },
    #[serde(rename = "RELEASE")]
    Release { sender: PeerId, timestamp: u64 },
    #[serde(rename = "BLOCK_UPDATE")]
    BlockUpdate {
        sender: PeerId,
        timestamp: u64,
        block: Block,
    },
    #[serde(rename = "ACK")]
    Ack { sender: PeerId, timestamp: u64 },
    #[serde(rename = "COMMAND")]
    Command(Command),
}

impl Envelope {
    /// The embedded Lamport timestamp, for protocol messages. `Command` has
    /// none: it originates outside the causal-ordering domain.
    pub fn timestamp(&self) -> Option<u64> {
        match self {
            Envelope::Request { timestamp, .. }
            | Envelope::Reply { timestamp, .. }
            | Envelope::Release { timestamp, .. }
            | Envelope::BlockUpdate { timestamp, .. }
            | Envelope::Ack { timestamp, .. } => Some(*timestamp),
            Envelope::Command(_) => None,
        }
    }

    pub fn sender(&self) -> Option<&PeerId> {
        match self {
            Envelope::Request { sender, .. }
            | Envelope::Reply { sender, .. }
            | Envelope::Release { sender, .. }
            | Envelope::BlockUpdate { sender, .. }
            | Envelope::Ack { sender, .. } => Some(sender),
            Envelope::Command(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Transfer { transaction: Transaction },
    Balance,
    BalanceTable,
    Blockchain,
}

/// What a query command (`balance`/`balance_table`/`blockchain`) answers
/// with, written back on the same short-lived connection the CLI opened.
///
/// `Balance` and `BalanceTable` both carry a `BTreeMap<PeerId, u64>`, so this
/// can't be `#[serde(untagged)]` — untagged picks the first variant whose
/// shape matches, which would make every `BalanceTable` answer deserialize
/// back as `Balance`. Adjacently tagged instead (`Blockchain`'s payload is a
/// JSON array, which an internal tag can't sit alongside).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum QueryResponse {
    Balance(std::collections::BTreeMap<PeerId, u64>),
    BalanceTable(std::collections::BTreeMap<PeerId, u64>),
    Blockchain(Vec<Block>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let envelope = Envelope::Request {
            sender: "A".to_string(),
            timestamp: 7,
        };
        let text = serde_json::to_string(&envelope).unwrap();
        assert!(text.contains("\"type\":\"REQUEST\""));
        let back: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back.timestamp(), Some(7));
        assert_eq!(back.sender().map(String::as_str), Some("A"));
    }

    #[test]
    fn command_transfer_round_trips() {
        let envelope = Envelope::Command(Command::Transfer {
            transaction: Transaction::new("A", "B", 3),
        });
        let text = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&text).unwrap();
        assert!(matches!(
            back,
            Envelope::Command(Command::Transfer { transaction }) if transaction.amount == 3
        ));
    }

    #[test]
    fn block_update_round_trips_with_embedded_block() {
        let block = crate::ledger::Block::genesis();
        let envelope = Envelope::BlockUpdate {
            sender: "A".to_string(),
            timestamp: 4,
            block: block.clone(),
        };
        let text = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&text).unwrap();
        match back {
            Envelope::BlockUpdate { block: got, .. } => assert_eq!(got, block),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
