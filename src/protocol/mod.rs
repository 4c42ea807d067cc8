pub mod engine;
pub mod message;

pub use engine::{Engine, Event, EventSender, Net, QueryKind};
pub use message::{Command, Envelope, QueryResponse};
