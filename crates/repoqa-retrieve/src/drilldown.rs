//! Which hierarchy levels to search, and in which order.

use repoqa_core::{Direction, Intent, Level};

/// The level most appropriate to start answering `intent` from.
pub fn start_level(intent: Intent) -> Level {
    match intent {
        Intent::CodeExplanation => Level::File,
        Intent::Architecture => Level::Module,
        Intent::ImpactAnalysis => Level::Module,
        Intent::SpecificLookup => Level::Symbol,
        Intent::DocumentationLookup => Level::Document,
        Intent::CapabilityCheck => Level::Repository,
        Intent::ProposalDraft => Level::Repository,
        Intent::ExperienceSummary => Level::Repository,
    }
}

/// Candidate levels for a direction, widest-first for broad, narrowest-first for specific.
pub fn direction_levels(direction: Direction) -> &'static [Level] {
    match direction {
        Direction::Broad => &[Level::Repository, Level::Module, Level::File],
        Direction::Narrow => &[Level::File, Level::Symbol, Level::Module],
        Direction::Specific => &[Level::Symbol, Level::File],
    }
}

/// The direction's levels with the intent's start level moved to the front.
pub fn drilldown_path(intent: Intent, direction: Direction) -> Vec<Level> {
    let start = start_level(intent);
    std::iter::once(start)
        .chain(direction_levels(direction).iter().copied().filter(|l| *l != start))
        .collect()
}
