//! Prompt templates for per-source analysis and final synthesis.
//!
//! Every builder is deterministic: the same inputs always yield the same
//! messages, so mocked runs are reproducible.

use std::collections::{BTreeMap, BTreeSet};

use crate::llm::ChatMessage;
use crate::sources::{DiscussionThread, SearchResult, SourceKind};

/// A record that can be listed in an analysis prompt.
pub trait PromptItem {
    fn render(&self, index: usize) -> String;
}

impl PromptItem for SearchResult {
    fn render(&self, index: usize) -> String {
        let mut out = format!("[{index}] {}", single_line(&self.title));
        // Knowledge panels may come without a link.
        if !self.link.is_empty() {
            out.push_str(&format!("\n    {}", self.link));
        }
        if !self.snippet.is_empty() {
            out.push_str(&format!("\n    {}", single_line(&self.snippet)));
        }
        out
    }
}

impl PromptItem for DiscussionThread {
    fn render(&self, index: usize) -> String {
        let mut out = format!(
            "[{index}] r/{}: {} ({} points, {} comments)\n    {}",
            self.subreddit,
            single_line(&self.title),
            self.score,
            self.comment_count,
            self.permalink
        );
        if !self.body.is_empty() {
            out.push_str(&format!("\n    Post: {}", single_line(&self.body)));
        }
        if !self.top_comments.is_empty() {
            out.push_str("\n    Top comments:");
            for c in &self.top_comments {
                out.push_str(&format!("\n    - \"{}\"", single_line(c)));
            }
        }
        out
    }
}

fn analyst_system(source: SourceKind) -> String {
    let focus = match source {
        SourceKind::Google => {
            "- Verified facts from authoritative sources (official documentation, research, reputable outlets)\n\
             - Concrete statistics, dates, and figures\n\
             - Points where sources disagree"
        }
        SourceKind::Bing => {
            "- Perspectives that complement a mainstream web search\n\
             - Recent news, announcements, and industry or enterprise viewpoints\n\
             - Technical articles and alternative takes"
        }
        SourceKind::Reddit => {
            "- First-hand experiences and practical advice from community members\n\
             - Recurring sentiment, consensus, and notable disagreements\n\
             - Short direct quotes in quotation marks, naming the subreddit"
        }
    };
    format!(
        "You are a research analyst reviewing {label} results for a user's question.\n\
         Use ONLY the numbered {label} results provided; do not add outside knowledge.\n\
         Attribute findings to {label} and cite result numbers like [2].\n\n\
         Focus on:\n{focus}\n\n\
         Reply with a concise summary of the insights that help answer the question.",
        label = source.label(),
    )
}

/// Messages asking the model to summarize one source's results.
pub fn analysis_messages<T: PromptItem>(
    source: SourceKind,
    query: &str,
    items: &[T],
) -> Vec<ChatMessage> {
    let listing = items
        .iter()
        .enumerate()
        .map(|(i, item)| item.render(i + 1))
        .collect::<Vec<_>>()
        .join("\n\n");
    let user = format!(
        "Question: {}\n\n{} results:\n{listing}\n\n\
         Summarize what these {} results contribute to answering the question.",
        single_line(query),
        source.label(),
        source.label(),
    );
    vec![ChatMessage::system(analyst_system(source)), ChatMessage::user(user)]
}

const SYNTHESIS_SYSTEM: &str = "You are a research synthesizer. Combine per-source analyses into one \
well-structured answer to the user's question.\n\n\
Your answer should:\n\
- Integrate the available analyses and note where they agree or conflict\n\
- Attribute key claims to their source (Google, Bing, Reddit)\n\
- Highlight uncertainty and differing perspectives\n\
- Never attribute anything to a source listed as unavailable; mention the missing coverage briefly instead";

/// Messages asking the model for the final answer.
///
/// Only analyses for sources outside `unavailable` are included; the unavailable
/// sources are named explicitly so the answer can caveat the gap.
pub fn synthesis_messages(
    query: &str,
    analyses: &BTreeMap<SourceKind, String>,
    unavailable: &BTreeSet<SourceKind>,
) -> Vec<ChatMessage> {
    let mut user = format!("Question: {}\n\n", single_line(query));
    for (source, text) in analyses
        .iter()
        .filter(|(source, _)| !unavailable.contains(source))
    {
        user.push_str(&format!("{} analysis:\n{}\n\n", source.label(), text.trim()));
    }
    if unavailable.is_empty() {
        user.push_str("Unavailable sources: none\n\n");
    } else {
        let names: Vec<_> = unavailable.iter().map(|s| s.label()).collect();
        user.push_str(&format!(
            "Unavailable sources: {} (no data was retrieved; do not attribute claims to them)\n\n",
            names.join(", ")
        ));
    }
    user.push_str("Combine the analyses above into a single, balanced answer to the question.");
    vec![ChatMessage::system(SYNTHESIS_SYSTEM), ChatMessage::user(user)]
}

/// Collapses newlines so user text cannot break the prompt's layout.
pub(crate) fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
