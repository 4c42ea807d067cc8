//! Lamport logical clock.
//!
//! Two operations only: `tick` for a locally originated event, `observe` for
//! a message arriving with a remote timestamp. The new value in `observe`
//! must exceed both the local clock and the remote timestamp, so the event
//! that caused it is always ordered strictly after the one it observed,
//! never merely caught up to it.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Clock(u64);

impl Clock {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    /// `L ← L + 1`; returns the new value.
    pub fn tick(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }

    /// `L ← max(L, t) + 1`.
    pub fn observe(&mut self, remote: u64) -> u64 {
        self.0 = self.0.max(remote) + 1;
        self.0
    }
}
