//! Interview core: session lifecycle and feedback scoring.
//!
//! Everything here talks to the outside world only through the traits in
//! [`ports`]; adapters live in `interview-platform`.

pub mod analytics;
pub mod assistant;
pub mod event_bus;
pub mod extract;
pub mod feedback;
pub mod lifecycle;
pub mod ports;
pub mod questions;

#[cfg(test)]
mod tests;

pub use lifecycle::{CompletedSession, CreatedSession, ServicePorts, SessionManager, StartedSession};
