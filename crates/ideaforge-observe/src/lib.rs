//! Observability setup for IdeaForge.
//!
//! Installs the global tracing subscriber (structured `fmt` output, optional
//! OpenTelemetry span export) and flushes exported spans on shutdown.

pub mod tracing_setup;
