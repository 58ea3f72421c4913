//! Event and audit fan-out for the browser gateway.

pub mod bus;

pub use bus::{BusFrame, EventBus};
