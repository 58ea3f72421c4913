//! Configuration loading for the browser gateway.

pub mod env;

pub use env::{load_from_env, EnvError};
