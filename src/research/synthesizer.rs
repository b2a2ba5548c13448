use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::llm::{CompletionClient, LlmError};
use crate::prompts::synthesis_messages;
use crate::sources::SourceKind;

/// Produces the final answer from the per-source analyses.
///
/// Sources in `unavailable` are named in the prompt but their text is left out.
/// There is no fallback: any model error, or a blank answer, is returned.
pub async fn synthesize(
    llm: &impl CompletionClient,
    query: &str,
    analyses: &BTreeMap<SourceKind, String>,
    unavailable: &BTreeSet<SourceKind>,
) -> Result<String, LlmError> {
    let messages = synthesis_messages(query, analyses, unavailable);
    let answer = llm.complete(&messages).await?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    debug!(chars = answer.len(), gaps = unavailable.len(), "synthesis complete");
    Ok(answer.to_string())
}
