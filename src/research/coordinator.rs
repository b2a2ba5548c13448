use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use super::analyzer::analyze;
use super::state::{ResearchState, SourceAnalysis};
use super::synthesizer::synthesize;
use super::{Progress, ResearchError, Stage};
use crate::llm::CompletionClient;
use crate::prompts::PromptItem;
use crate::sources::{DiscussionThread, SearchResult, SourceAdapter, SourceKind};

#[derive(Debug, Clone, Copy)]
pub struct TurnSettings {
    pub results_per_source: usize,
    /// Deadline shared by the three sub-pipelines of one turn.
    pub turn_timeout: Duration,
}

/// What one sub-pipeline hands back: its results (if the fetch finished) and its analysis.
struct SlotOutcome<T> {
    results: Option<Vec<T>>,
    analysis: SourceAnalysis,
}

/// Runs the Google, Bing and Reddit sub-pipelines side by side, then synthesizes.
///
/// A `None` adapter is a disabled source; its slot is unavailable without any
/// network call.
pub struct Coordinator<W, D, L> {
    google: Option<W>,
    bing: Option<W>,
    reddit: Option<D>,
    llm: L,
    settings: TurnSettings,
}

impl<W, D, L> Coordinator<W, D, L>
where
    W: SourceAdapter<Item = SearchResult>,
    D: SourceAdapter<Item = DiscussionThread>,
    L: CompletionClient,
{
    pub fn new(
        google: Option<W>,
        bing: Option<W>,
        reddit: Option<D>,
        llm: L,
        settings: TurnSettings,
    ) -> Self {
        Self {
            google,
            bing,
            reddit,
            llm,
            settings,
        }
    }

    #[cfg(test)]
    pub(crate) fn llm(&self) -> &L {
        &self.llm
    }

    /// Fans out and collects one analysis per source. Never fails: every slot
    /// ends either analyzed or marked unavailable.
    pub async fn gather(&self, query: &str, progress: &dyn Progress) -> ResearchState {
        let deadline = Instant::now() + self.settings.turn_timeout;

        let (google, bing, reddit) = tokio::join!(
            self.slot(SourceKind::Google, self.google.as_ref(), query, deadline, progress),
            self.slot(SourceKind::Bing, self.bing.as_ref(), query, deadline, progress),
            self.slot(SourceKind::Reddit, self.reddit.as_ref(), query, deadline, progress),
        );

        let mut state = ResearchState::new(query);
        if let Some(results) = google.results {
            state.set_google_results(results);
        }
        if let Some(results) = bing.results {
            state.set_bing_results(results);
        }
        if let Some(results) = reddit.results {
            state.set_reddit_results(results);
        }
        state.record_analysis(google.analysis);
        state.record_analysis(bing.analysis);
        state.record_analysis(reddit.analysis);
        debug!(fields = ?state.populated_fields(), "fan-out finished");
        state
    }

    /// One full turn: gather, then synthesize if at least one source contributed.
    pub async fn run_turn(
        &self,
        query: &str,
        progress: &dyn Progress,
    ) -> Result<ResearchState, ResearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::EmptyQuery);
        }
        info!(query, "research turn started");

        let mut state = self.gather(query, progress).await;
        debug_assert!(state.all_analyses_present());

        let analyses = state.available_analyses();
        let unavailable = state.unavailable_sources();
        if analyses.is_empty() {
            warn!("every source is unavailable");
            return Err(ResearchError::AllSourcesUnavailable {
                state: Box::new(state),
            });
        }

        progress.report(Stage::Synthesizing {
            sources: analyses.len(),
        });
        match synthesize(&self.llm, query, &analyses, &unavailable).await {
            Ok(answer) => {
                state.set_final_answer(answer);
                progress.report(Stage::Done);
                info!(
                    available = analyses.len(),
                    unavailable = unavailable.len(),
                    "research turn complete"
                );
                Ok(state)
            }
            Err(source) => {
                warn!(error = %source, "synthesis failed");
                Err(ResearchError::SynthesisFailure {
                    source,
                    state: Box::new(state),
                })
            }
        }
    }

    async fn slot<A>(
        &self,
        kind: SourceKind,
        adapter: Option<&A>,
        query: &str,
        deadline: Instant,
        progress: &dyn Progress,
    ) -> SlotOutcome<A::Item>
    where
        A: SourceAdapter,
        A::Item: PromptItem,
    {
        let Some(adapter) = adapter else {
            let reason = "disabled (no credentials configured)";
            progress.report(Stage::Skipped {
                source: kind,
                reason: reason.into(),
            });
            return SlotOutcome {
                results: None,
                analysis: SourceAnalysis::unavailable(kind, reason),
            };
        };

        let pipeline = async {
            progress.report(Stage::Searching(kind));
            let fetched = adapter.fetch(query, self.settings.results_per_source).await;
            let items = fetched.items;
            progress.report(Stage::Fetched {
                source: kind,
                count: items.len(),
            });
            let analysis = match fetched.failure {
                Some(e) => SourceAnalysis::unavailable(kind, format!("search failed ({e})")),
                None => analyze(&self.llm, query, &items, kind).await,
            };
            progress.report(Stage::Analyzed {
                source: kind,
                available: analysis.is_available(),
            });
            SlotOutcome {
                results: Some(items),
                analysis,
            }
        };

        match timeout_at(deadline, pipeline).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let reason = format!(
                    "timed out after {}s",
                    self.settings.turn_timeout.as_secs_f32()
                );
                warn!(source = %kind, "source did not finish before the turn deadline");
                progress.report(Stage::Skipped {
                    source: kind,
                    reason: reason.clone(),
                });
                SlotOutcome {
                    results: None,
                    analysis: SourceAnalysis::unavailable(kind, reason),
                }
            }
        }
    }
}
