//! Static cluster configuration, set once at startup.
//!
//! Out of the protocol's core, same as the operator CLI and transport
//! plumbing, but still needs a concrete realization for the crate to run.
//! `ClusterConfig::reference()` is the built-in deployment (peers `A`/`B`/`C`
//! on `127.0.0.1:6000..6002`, each seeded at 10 units); `ClusterConfig::load`
//! reads the same shape from a JSON file for anything else.

use std::{collections::BTreeMap, net::SocketAddr, path::Path};

use serde::{Deserialize, Serialize};

/// A peer identifier. In the reference deployment a peer's id also names the
/// account it "owns" in the balance table, but nothing in this crate
/// requires that.
pub type PeerId = String;

/// An account identifier in the balance table.
pub type AccountId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Every peer's listening address, including this process's own.
    pub peers: BTreeMap<PeerId, SocketAddr>,
    pub initial_balances: BTreeMap<AccountId, u64>,
}

impl ClusterConfig {
    /// The 3-peer, A/B/C@10 deployment used as this crate's built-in
    /// default when no config file is given.
    pub fn reference() -> Self {
        let peers = [
            ("A", "127.0.0.1:6000"),
            ("B", "127.0.0.1:6001"),
            ("C", "127.0.0.1:6002"),
        ]
        .into_iter()
        .map(|(id, addr)| (id.to_string(), addr.parse().expect("valid reference addr")))
        .collect();
        let initial_balances = ["A", "B", "C"]
            .into_iter()
            .map(|id| (id.to_string(), 10))
            .collect();
        Self {
            peers,
            initial_balances,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn other_peers(&self, self_id: &PeerId) -> Vec<PeerId> {
        self.peers
            .keys()
            .filter(|id| *id != self_id)
            .cloned()
            .collect()
    }

    pub fn addr_of(&self, peer: &PeerId) -> Option<SocketAddr> {
        self.peers.get(peer).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_has_three_peers_seeded_at_ten() {
        let config = ClusterConfig::reference();
        assert_eq!(config.peers.len(), 3);
        assert!(config.initial_balances.values().all(|&b| b == 10));
    }

    #[test]
    fn other_peers_excludes_self() {
        let config = ClusterConfig::reference();
        let others = config.other_peers(&"A".to_string());
        assert_eq!(others.len(), 2);
        assert!(!others.contains(&"A".to_string()));
    }
}
