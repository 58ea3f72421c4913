//! Lifecycle Driver implementations.
//!
//! The trait itself lives in `gateway_types::ports::driver`, since
//! `gateway-pool` needs it without depending on whatever actually launches
//! a browser. This crate provides the two implementations: a deterministic
//! in-memory `MockDriver` for tests, and an optional `ChromeDriver` behind
//! the `chrome` feature for real use.

pub mod mock;

#[cfg(feature = "chrome")]
pub mod chrome;

pub use mock::MockDriver;

#[cfg(feature = "chrome")]
pub use chrome::ChromeDriver;
