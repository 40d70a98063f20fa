//! Shared domain types for IdeaForge.
//!
//! This crate contains the domain types of the build pipeline: the build
//! request and its lifecycle, per-phase output records, provenance tagging,
//! extraction results, configuration, events, and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod artifacts;
pub mod build;
pub mod config;
pub mod error;
pub mod event;
pub mod extraction;
pub mod llm;
pub mod provenance;
pub mod quality;
pub mod research;
pub mod score;
pub mod strategy;
