use tracing::{debug, warn};

use super::state::SourceAnalysis;
use crate::llm::CompletionClient;
use crate::prompts::{PromptItem, analysis_messages};
use crate::sources::SourceKind;

/// Summarizes one source's results with the model.
///
/// An empty result list short-circuits to an unavailable analysis without a
/// model call. A model failure or blank reply also degrades to unavailable;
/// this function never fails.
pub async fn analyze<T: PromptItem>(
    llm: &impl CompletionClient,
    query: &str,
    items: &[T],
    source: SourceKind,
) -> SourceAnalysis {
    if items.is_empty() {
        debug!(source = %source, "no results to analyze");
        return SourceAnalysis::unavailable(source, "no results found");
    }

    let messages = analysis_messages(source, query, items);
    match llm.complete(&messages).await {
        Ok(text) if !text.trim().is_empty() => SourceAnalysis::available(source, text.trim()),
        Ok(_) => {
            warn!(source = %source, "model returned a blank analysis");
            SourceAnalysis::unavailable(source, "analysis came back empty")
        }
        Err(e) => {
            warn!(source = %source, error = %e, "analysis failed");
            SourceAnalysis::unavailable(source, format!("analysis failed ({e})"))
        }
    }
}
