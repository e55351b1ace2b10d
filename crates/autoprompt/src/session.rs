//! Session controller and reader worker.
//!
//! A [`Session`] owns one channel for its running lifetime. Starting it picks
//! a backend, spawns the child and launches a reader worker task that
//! publishes [`SessionEvent`]s. Writes, resizes and `stop` are called on the
//! session directly.

mod config;
mod controller;
mod event;
mod state;
mod worker;

pub use config::{DEFAULT_EXIT_WAIT, DEFAULT_POLL_INTERVAL, SessionConfig};
pub use controller::{Session, Spawned};
pub use event::SessionEvent;
pub use state::SessionState;
