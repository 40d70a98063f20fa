//! HTTP request handlers for the REST API.

pub mod builds;
pub mod health;
