//! Build orchestration core for IdeaForge.
//!
//! This crate defines the pipeline that turns a product idea into research,
//! strategy, generated code, and a quality audit, plus the "ports" the
//! infrastructure layer implements (`LlmProvider`, `BuildStore`). It depends
//! only on `ideaforge-types` -- never on `ideaforge-infra` or any network/IO
//! crate.
//!
//! Layers, leaves first:
//! - `extraction`: raw model text to a JSON record
//! - `invoker`: bounded retry, timeout, and fallback around one model call
//! - `agents`: prompt, invoke, and shape for each specialized agent
//! - `build`: the phase sequencer and the build service

pub mod agents;
pub mod build;
pub mod event;
pub mod extraction;
pub mod invoker;
pub mod llm;
pub mod storage;
