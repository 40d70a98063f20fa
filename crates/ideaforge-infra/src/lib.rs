//! Infrastructure layer for IdeaForge.
//!
//! Contains implementations of the traits defined in `ideaforge-core`: the
//! Anthropic Messages API provider, the in-memory build-state store with
//! TTL eviction, and the `config.toml` loader.

pub mod config;
pub mod llm;
pub mod store;
