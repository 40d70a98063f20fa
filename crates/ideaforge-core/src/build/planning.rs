//! Deterministic competitive-advantage derivation.
//!
//! No model call: the top market gaps and the most frequent user complaints
//! from research become the ranked advantage list.

use ideaforge_types::research::ResearchOutput;
use ideaforge_types::strategy::{AdvantageSource, CompetitiveAdvantage};

/// Market gaps taken into the advantage list.
pub const TOP_GAPS: usize = 3;
/// User complaints taken into the advantage list.
pub const TOP_COMPLAINTS: usize = 3;

/// Top gaps first, then top complaints, ranked from 1.
///
/// Relies on research shaping: gaps are already ordered by opportunity and
/// complaints by frequency.
pub fn derive_advantages(research: &ResearchOutput) -> Vec<CompetitiveAdvantage> {
    let gaps = research
        .market
        .market_gaps
        .iter()
        .take(TOP_GAPS)
        .map(|gap| (AdvantageSource::MarketGap, gap.description.trim().to_string()));

    let complaints = research
        .complaint_list()
        .iter()
        .take(TOP_COMPLAINTS)
        .map(|c| {
            let description = match &c.competitor {
                Some(competitor) => format!("Solves \"{}\" (common complaint about {competitor})", c.issue.trim()),
                None => format!("Solves \"{}\" (common user complaint)", c.issue.trim()),
            };
            (AdvantageSource::UserComplaint, description)
        });

    gaps.chain(complaints)
        .zip(1u8..)
        .map(|((source, description), rank)| CompetitiveAdvantage {
            rank,
            source,
            description,
        })
        .collect()
}
