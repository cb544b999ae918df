//! # Link Services
//!
//! The connection manager and the two driving-port implementations built
//! on it. Publisher and health probe hold the same `Arc<ConnectionManager>`
//! and never touch the transport except through its lock.

mod health;
mod manager;
mod publisher;

pub use health::BrokerHealthProbe;
pub use manager::ConnectionManager;
pub use publisher::AmqpPublisher;
