//! The replicated balance table.

use std::collections::BTreeMap;

use crate::config::AccountId;

#[derive(Debug, Clone, Default)]
pub struct BalanceTable {
    balances: BTreeMap<AccountId, u64>,
}

impl BalanceTable {
    pub fn new(initial: BTreeMap<AccountId, u64>) -> Self {
        Self { balances: initial }
    }

    pub fn get(&self, account: &AccountId) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn can_debit(&self, account: &AccountId, amount: u64) -> bool {
        self.get(account) >= amount
    }

    pub fn debit(&mut self, account: &AccountId, amount: u64) {
        *self.balances.entry(account.clone()).or_insert(0) -= amount;
    }

    pub fn credit(&mut self, account: &AccountId, amount: u64) {
        *self.balances.entry(account.clone()).or_insert(0) += amount;
    }

    pub fn snapshot(&self) -> BTreeMap<AccountId, u64> {
        self.balances.clone()
    }

    pub fn total(&self) -> u64 {
        self.balances.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> BalanceTable {
        BalanceTable::new(BTreeMap::from([
            ("A".to_string(), 10),
            ("B".to_string(), 10),
            ("C".to_string(), 10),
        ]))
    }

    #[test]
    fn can_debit_checks_sufficiency() {
        let t = table();
        assert!(t.can_debit(&"A".to_string(), 10));
        assert!(!t.can_debit(&"A".to_string(), 11));
    }

    #[test]
    fn debit_credit_conserves_total() {
        let mut t = table();
        let before = t.total();
        t.debit(&"A".to_string(), 3);
        t.credit(&"B".to_string(), 3);
        assert_eq!(t.total(), before);
        assert_eq!(t.get(&"A".to_string()), 7);
        assert_eq!(t.get(&"B".to_string()), 13);
    }
}
