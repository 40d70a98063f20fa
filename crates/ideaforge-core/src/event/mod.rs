//! Build event distribution.
//!
//! Provides an `EventBus` that distributes `BuildEvent` messages to all
//! subscribers (CLI progress bar, HTTP handlers, tests) via a
//! `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
