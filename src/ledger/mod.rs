pub mod balance;
pub mod block;
pub mod chain;

pub use balance::BalanceTable;
pub use block::{Block, Transaction};
pub use chain::Chain;

use std::collections::BTreeMap;

use crate::{config::AccountId, error::ProtocolError};

/// Holds the chain and the balance table the protocol engine replicates. A
/// thin facade: every method here just delegates to `Chain`/`BalanceTable`,
/// kept together because the engine always needs both in lockstep.
#[derive(Debug, Clone)]
pub struct Ledger {
    chain: Chain,
    balances: BalanceTable,
}

impl Ledger {
    pub fn new(initial_balances: BTreeMap<AccountId, u64>) -> Self {
        Self {
            chain: Chain::new(),
            balances: BalanceTable::new(initial_balances),
        }
    }

    pub fn append(&mut self, transaction: Transaction, timestamp: u64) -> Block {
        self.chain.append(transaction, timestamp)
    }

    pub fn apply_remote(&mut self, block: Block) -> Result<(), ProtocolError> {
        self.chain.apply_remote(block)
    }

    pub fn can_debit(&self, account: &AccountId, amount: u64) -> bool {
        self.balances.can_debit(account, amount)
    }

    pub fn debit(&mut self, account: &AccountId, amount: u64) {
        self.balances.debit(account, amount)
    }

    pub fn credit(&mut self, account: &AccountId, amount: u64) {
        self.balances.credit(account, amount)
    }

    pub fn balance_of(&self, account: &AccountId) -> u64 {
        self.balances.get(account)
    }

    pub fn snapshot_balances(&self) -> BTreeMap<AccountId, u64> {
        self.balances.snapshot()
    }

    pub fn snapshot_chain(&self) -> Vec<Block> {
        self.chain.snapshot()
    }

    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// Replays the chain from genesis against the initial balances and
    /// should always reproduce the live table. Used by tests and available to
    /// operators as an offline consistency check.
    pub fn replay(chain: &[Block], initial_balances: BTreeMap<AccountId, u64>) -> BalanceTable {
        let mut balances = BalanceTable::new(initial_balances);
        for block in chain.iter().skip(1) {
            balances.debit(&block.transaction.sender, block.transaction.amount);
            balances.credit(&block.transaction.receiver, block.transaction.amount);
        }
        balances
    }
}
