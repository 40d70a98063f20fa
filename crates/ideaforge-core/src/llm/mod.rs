//! LLM provider abstractions for IdeaForge.
//!
//! This module defines the seam between the build pipeline and the remote
//! text-generation service:
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch

pub mod box_provider;
pub mod provider;
