use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::warn;

use crate::sources::{DiscussionThread, SearchResult, SourceKind};

/// One source's contribution to the synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceAnalysis {
    pub source: SourceKind,
    pub text: String,
    /// Why the source could not contribute; `None` when `text` is a real analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,
}

impl SourceAnalysis {
    pub fn available(source: SourceKind, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
            unavailable: None,
        }
    }

    pub fn unavailable(source: SourceKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            source,
            text: format!("{} data unavailable: {reason}.", source.label()),
            unavailable: Some(reason),
        }
    }

    pub fn is_available(&self) -> bool {
        self.unavailable.is_none()
    }
}

/// Everything gathered during one turn.
///
/// Fields start empty and are written at most once; a repeated write is
/// ignored so earlier stages stay inspectable after a later failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResearchState {
    query: String,
    google_results: Option<Vec<SearchResult>>,
    bing_results: Option<Vec<SearchResult>>,
    reddit_results: Option<Vec<DiscussionThread>>,
    google_analysis: Option<SourceAnalysis>,
    bing_analysis: Option<SourceAnalysis>,
    reddit_analysis: Option<SourceAnalysis>,
    final_answer: Option<String>,
}

fn fill<T>(slot: &mut Option<T>, value: T, field: &'static str) {
    if slot.is_some() {
        warn!(field, "research state field already set, ignoring new value");
        return;
    }
    *slot = Some(value);
}

impl ResearchState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_google_results(&mut self, results: Vec<SearchResult>) {
        fill(&mut self.google_results, results, "google_results");
    }

    pub fn set_bing_results(&mut self, results: Vec<SearchResult>) {
        fill(&mut self.bing_results, results, "bing_results");
    }

    pub fn set_reddit_results(&mut self, results: Vec<DiscussionThread>) {
        fill(&mut self.reddit_results, results, "reddit_results");
    }

    pub fn record_analysis(&mut self, analysis: SourceAnalysis) {
        match analysis.source {
            SourceKind::Google => fill(&mut self.google_analysis, analysis, "google_analysis"),
            SourceKind::Bing => fill(&mut self.bing_analysis, analysis, "bing_analysis"),
            SourceKind::Reddit => fill(&mut self.reddit_analysis, analysis, "reddit_analysis"),
        }
    }

    pub fn set_final_answer(&mut self, answer: String) {
        fill(&mut self.final_answer, answer, "final_answer");
    }

    pub fn google_results(&self) -> Option<&[SearchResult]> {
        self.google_results.as_deref()
    }

    pub fn bing_results(&self) -> Option<&[SearchResult]> {
        self.bing_results.as_deref()
    }

    pub fn reddit_results(&self) -> Option<&[DiscussionThread]> {
        self.reddit_results.as_deref()
    }

    pub fn analysis(&self, source: SourceKind) -> Option<&SourceAnalysis> {
        match source {
            SourceKind::Google => self.google_analysis.as_ref(),
            SourceKind::Bing => self.bing_analysis.as_ref(),
            SourceKind::Reddit => self.reddit_analysis.as_ref(),
        }
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    /// True once every source has an analysis, available or not.
    pub fn all_analyses_present(&self) -> bool {
        SourceKind::ALL.iter().all(|s| self.analysis(*s).is_some())
    }

    pub fn available_analyses(&self) -> BTreeMap<SourceKind, String> {
        SourceKind::ALL
            .iter()
            .filter_map(|s| self.analysis(*s))
            .filter(|a| a.is_available())
            .map(|a| (a.source, a.text.clone()))
            .collect()
    }

    /// Sources without a usable analysis, including ones never recorded.
    pub fn unavailable_sources(&self) -> BTreeSet<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|s| !self.analysis(*s).is_some_and(SourceAnalysis::is_available))
            .collect()
    }

    /// Names of the fields that hold a value.
    pub fn populated_fields(&self) -> Vec<&'static str> {
        [
            ("google_results", self.google_results.is_some()),
            ("bing_results", self.bing_results.is_some()),
            ("reddit_results", self.reddit_results.is_some()),
            ("google_analysis", self.google_analysis.is_some()),
            ("bing_analysis", self.bing_analysis.is_some()),
            ("reddit_analysis", self.reddit_analysis.is_some()),
            ("final_answer", self.final_answer.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}
