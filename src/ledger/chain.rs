//! The hash-linked block log.

use super::block::{Block, Transaction};
use crate::error::ProtocolError;

#[derive(Debug, Clone, Default)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    /// Starts with exactly the genesis block, same at every peer.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last(&self) -> &Block {
        self.blocks.last().expect("chain always has a genesis block")
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    /// Constructs and appends a new block for `transaction`; does NOT touch
    /// balances — this is a pure ledger-log operation, the caller decides
    /// separately whether to apply the balance change.
    pub fn append(&mut self, transaction: Transaction, timestamp: u64) -> Block {
        let last = self.last();
        let block = Block::new(last.index + 1, last.hash.clone(), transaction, timestamp);
        self.blocks.push(block.clone());
        block
    }

    /// Validates `block.index`/`block.previous_hash` against the local
    /// chain and appends. Remote commits are authoritative for ordering —
    /// this deliberately does not re-check the balance table: the mutex
    /// already guaranteed a single writer balance-checked it.
    pub fn apply_remote(&mut self, block: Block) -> Result<(), ProtocolError> {
        let expected_index = self.last().index + 1;
        if block.index != expected_index {
            return Err(ProtocolError::ChainMismatch {
                index: block.index,
                reason: format!("expected index {expected_index}"),
            });
        }
        if block.previous_hash != self.last().hash {
            return Err(ProtocolError::ChainMismatch {
                index: block.index,
                reason: "previous_hash does not match local chain tip".to_string(),
            });
        }
        if block.hash != block.recompute_hash() {
            return Err(ProtocolError::ChainMismatch {
                index: block.index,
                reason: "hash does not match block contents".to_string(),
            });
        }
        self.blocks.push(block);
        Ok(())
    }
}
