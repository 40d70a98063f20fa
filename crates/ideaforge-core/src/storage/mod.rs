//! Storage abstractions for IdeaForge.
//!
//! Defines the build-state store trait. Implementations live in
//! ideaforge-infra.

pub mod build_store;

pub use build_store::BuildStore;
