//! Build orchestration.
//!
//! - `state`: the per-build `PhaseState` accumulator
//! - `planning`: deterministic competitive-advantage derivation
//! - `progress`: the `ProgressSink` seam between sequencer and status store
//! - `sequencer`: the four-phase pipeline
//! - `service`: build lifecycle (start, status, cancel) over a `BuildStore`

pub mod planning;
pub mod progress;
pub mod sequencer;
pub mod service;
pub mod state;

pub use progress::ProgressSink;
pub use sequencer::{BuildOutcome, PhaseSequencer};
pub use service::BuildService;
pub use state::PhaseState;
