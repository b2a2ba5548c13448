use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SearchResult, SourceAdapter, SourceError, SourceKind, read_json};
use crate::config::SerpConfig;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerpEngine {
    Google,
    Bing,
}

impl SerpEngine {
    fn search_base(self) -> &'static str {
        match self {
            SerpEngine::Google => "https://www.google.com/search",
            SerpEngine::Bing => "https://www.bing.com/search",
        }
    }

    /// Engine URL the proxy fetches; `brd_json=1` asks for parsed JSON instead of HTML.
    pub fn search_url(self, query: &str, limit: usize) -> String {
        let count = limit.to_string();
        let count_param = match self {
            SerpEngine::Google => "num",
            SerpEngine::Bing => "count",
        };
        url::Url::parse_with_params(
            self.search_base(),
            [("q", query), (count_param, count.as_str()), ("brd_json", "1")],
        )
        .map(String::from)
        .unwrap_or_else(|_| self.search_base().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ProxyRequest<'a> {
    zone: &'a str,
    url: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    /// Kept loose: a panel we cannot read is dropped, the organic hits still count.
    #[serde(default)]
    knowledge: Option<serde_json::Value>,
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

/// The answer box some result pages show above the organic hits.
#[derive(Debug, Deserialize)]
struct KnowledgePanel {
    name: Option<String>,
    title: Option<String>,
    description: Option<String>,
    link: Option<String>,
    #[serde(default)]
    facts: Vec<KnowledgeFact>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeFact {
    key: Option<String>,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    title: Option<String>,
    link: Option<String>,
    #[serde(alias = "snippet")]
    description: Option<String>,
}

/// Web search through a SERP proxy API. One instance per engine.
#[derive(Clone)]
pub struct SerpClient {
    http: Client,
    config: SerpConfig,
    engine: SerpEngine,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl SerpClient {
    pub fn new(
        http: Client,
        config: SerpConfig,
        engine: SerpEngine,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            config,
            engine,
            request_timeout,
            retry,
        }
    }

    async fn request(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SourceError> {
        let target = self.engine.search_url(query, limit);
        let endpoint = format!("{}/request", self.config.base_url.trim_end_matches('/'));
        let body = ProxyRequest {
            zone: &self.config.zone,
            url: &target,
            format: "raw",
        };

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(self.config.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let parsed: SerpResponse = read_json(response).await?;
        let panel = parsed.knowledge.and_then(|raw| {
            serde_json::from_value::<KnowledgePanel>(raw)
                .inspect_err(|e| debug!(error = %e, "ignoring unreadable knowledge panel"))
                .ok()
        });
        let results = normalize(panel.and_then(knowledge_record), parsed.organic, limit);
        debug!(source = %self.kind(), count = results.len(), "serp results parsed");
        Ok(results)
    }
}

impl SourceAdapter for SerpClient {
    type Item = SearchResult;

    fn kind(&self) -> SourceKind {
        match self.engine {
            SerpEngine::Google => SourceKind::Google,
            SerpEngine::Bing => SourceKind::Bing,
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, SourceError> {
        self.retry
            .run(SourceError::is_retriable, || self.request(query, limit))
            .await
    }
}

/// Panel first, then organic hits in upstream order without the linkless ones,
/// capped at `limit`.
fn normalize(
    panel: Option<SearchResult>,
    organic: Vec<OrganicResult>,
    limit: usize,
) -> Vec<SearchResult> {
    let organic = organic.into_iter().filter_map(|r| {
        let link = r.link.filter(|l| !l.trim().is_empty())?;
        Some(SearchResult {
            title: r.title.unwrap_or_else(|| link.clone()).trim().to_string(),
            snippet: r.description.unwrap_or_default().trim().to_string(),
            link,
        })
    });
    panel.into_iter().chain(organic).take(limit).collect()
}

/// `None` when the panel has neither a name nor a description.
fn knowledge_record(panel: KnowledgePanel) -> Option<SearchResult> {
    let non_blank = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let name = non_blank(panel.name).or_else(|| non_blank(panel.title));
    let description = non_blank(panel.description);

    let facts = panel
        .facts
        .iter()
        .filter_map(|fact| {
            let key = fact.key.as_deref()?.trim();
            let value = match &fact.value {
                serde_json::Value::String(v) => v.trim().to_string(),
                serde_json::Value::Array(items) => items
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => return None,
            };
            (!key.is_empty() && !value.is_empty()).then(|| format!("{key}: {value}"))
        })
        .collect::<Vec<_>>();

    let mut snippet = description.clone().unwrap_or_default();
    if !facts.is_empty() {
        if !snippet.is_empty() {
            snippet.push_str(" | ");
        }
        snippet.push_str(&facts.join("; "));
    }

    let title = match (name, &description) {
        (Some(name), _) => format!("{name} (knowledge panel)"),
        (None, Some(_)) => "Knowledge panel".to_string(),
        (None, None) => return None,
    };
    Some(SearchResult {
        title,
        link: non_blank(panel.link).unwrap_or_default(),
        snippet,
    })
}
