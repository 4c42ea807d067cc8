pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod protocol;
pub mod queue;
pub mod transport;

pub use clock::Clock;
pub use config::{AccountId, ClusterConfig, PeerId};
pub use error::ProtocolError;
