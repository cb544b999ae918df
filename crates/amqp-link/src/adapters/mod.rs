//! Adapters Layer
//!
//! Transport implementations of the outbound ports:
//! - `LapinConnector`: AMQP 0-9-1 over `lapin`
//! - `InMemoryBroker`: process-local broker for tests and local runs

pub mod lapin;
pub mod memory;

pub use self::lapin::{LapinChannel, LapinConnection, LapinConnector};
pub use self::memory::{InMemoryBroker, MemoryChannel, MemoryConnection, PublishedMessage};
