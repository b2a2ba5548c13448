//! One research turn: fan out to the sources, analyze each, synthesize.

pub mod analyzer;
pub mod coordinator;
pub mod state;
pub mod synthesizer;
#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{Coordinator, TurnSettings};
pub use state::ResearchState;

use crate::llm::LlmError;
use crate::sources::SourceKind;

/// Turn-level failures. Per-source failures never reach this type; they are
/// recorded as unavailable analyses instead.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("all sources unavailable; no answer could be synthesized")]
    AllSourcesUnavailable { state: Box<ResearchState> },

    #[error("synthesis failed: {source}")]
    SynthesisFailure {
        #[source]
        source: LlmError,
        state: Box<ResearchState>,
    },
}

impl ResearchError {
    /// Partial state gathered before the failure, if any stage ran.
    pub fn state(&self) -> Option<&ResearchState> {
        match self {
            ResearchError::EmptyQuery => None,
            ResearchError::AllSourcesUnavailable { state }
            | ResearchError::SynthesisFailure { state, .. } => Some(state),
        }
    }
}

/// Pipeline milestones, reported as they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Searching(SourceKind),
    Fetched { source: SourceKind, count: usize },
    Analyzed { source: SourceKind, available: bool },
    Skipped { source: SourceKind, reason: String },
    Synthesizing { sources: usize },
    Done,
}

pub trait Progress {
    fn report(&self, stage: Stage);
}

/// Discards all progress.
pub struct Silent;

impl Progress for Silent {
    fn report(&self, _stage: Stage) {}
}
