//! Deterministic stand-ins for the sources and the model.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::llm::{ChatMessage, CompletionClient, LlmError};
use crate::sources::{DiscussionThread, SearchResult, SourceAdapter, SourceError, SourceKind};

pub(crate) fn web_results(prefix: &str, n: usize) -> Vec<SearchResult> {
    (1..=n)
        .map(|i| SearchResult {
            title: format!("{prefix} result {i}"),
            link: format!("https://{prefix}.example/{i}"),
            snippet: format!("{prefix} snippet {i}"),
        })
        .collect()
}

pub(crate) fn threads(n: usize) -> Vec<DiscussionThread> {
    (1..=n)
        .map(|i| DiscussionThread {
            title: format!("reddit thread {i}"),
            permalink: format!("https://www.reddit.com/r/test/comments/{i}/"),
            subreddit: "test".into(),
            score: 10 * i as i64,
            comment_count: i as u64,
            body: String::new(),
            top_comments: vec![format!("comment on thread {i}")],
        })
        .collect()
}

pub(crate) struct MockSource<T> {
    pub kind: SourceKind,
    pub items: Vec<T>,
    pub fail: bool,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl<T> MockSource<T> {
    pub fn new(kind: SourceKind, items: Vec<T>) -> Self {
        Self {
            kind,
            items,
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: SourceKind) -> Self {
        Self {
            fail: true,
            ..Self::new(kind, Vec::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T: Clone> SourceAdapter for MockSource<T> {
    type Item = T;

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<T>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(SourceError::Api {
                code: 503,
                message: "mock outage".into(),
            });
        }
        Ok(self.items.iter().take(limit).cloned().collect())
    }
}

/// Echoing model: analyses list the titles they were given, syntheses quote
/// their whole prompt. Every call is recorded.
#[derive(Default)]
pub(crate) struct MockLlm {
    pub fail_analysis_for: Option<SourceKind>,
    pub fail_synthesis: bool,
    pub blank_replies: bool,
    pub delay: Duration,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockLlm {
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// User messages of every synthesis call, in call order.
    pub fn synthesis_prompts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|m| is_synthesis(m))
            .map(|m| m[1].content.clone())
            .collect()
    }
}

fn is_synthesis(messages: &[ChatMessage]) -> bool {
    messages[0].content.contains("research synthesizer")
}

fn analyzed_source(messages: &[ChatMessage]) -> Option<SourceKind> {
    SourceKind::ALL
        .into_iter()
        .find(|s| messages[0].content.contains(&format!("reviewing {} results", s.label())))
}

impl CompletionClient for MockLlm {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.blank_replies {
            return Ok("   ".into());
        }

        let user = &messages[1].content;
        if is_synthesis(messages) {
            if self.fail_synthesis {
                return Err(LlmError::Api {
                    code: 500,
                    message: "mock synthesis failure".into(),
                });
            }
            return Ok(format!("Synthesized answer based on:\n{user}"));
        }

        let source = analyzed_source(messages).expect("unknown prompt");
        if self.fail_analysis_for == Some(source) {
            return Err(LlmError::RateLimited);
        }
        let titles: Vec<&str> = user
            .lines()
            .filter(|l| l.starts_with('['))
            .collect();
        Ok(format!("{} insight: {}", source.label(), titles.join(" | ")))
    }
}
