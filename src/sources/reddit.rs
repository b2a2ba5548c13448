use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{DiscussionThread, SourceAdapter, SourceError, SourceKind, clip, read_json};
use crate::config::RedditConfig;
use crate::retry::RetryPolicy;

const WEB_BASE: &str = "https://www.reddit.com";
const MAX_BODY_CHARS: usize = 600;
const MAX_COMMENT_CHARS: usize = 400;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
struct ListingData<T> {
    children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
struct Thing<T> {
    kind: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    title: String,
    permalink: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
}

/// `more` placeholders share the listing with real comments, so every field is optional.
#[derive(Debug, Deserialize)]
struct CommentData {
    body: Option<String>,
    #[serde(default)]
    stickied: bool,
}

/// Reddit search through the OAuth API with an app-only token.
#[derive(Clone)]
pub struct RedditClient {
    http: Client,
    config: RedditConfig,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl RedditClient {
    pub fn new(
        http: Client,
        config: RedditConfig,
        request_timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            config,
            request_timeout,
            retry,
        }
    }

    async fn access_token(&self) -> Result<String, SourceError> {
        let response = self
            .http
            .post(&self.config.auth_url)
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.expose()))
            .header("User-Agent", crate::USER_AGENT)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .timeout(self.request_timeout)
            .send()
            .await?;

        let token: TokenResponse = read_json(response).await?;
        match (token.access_token, token.error) {
            (Some(t), _) if !t.is_empty() => Ok(t),
            (_, Some(e)) => Err(SourceError::Auth(e)),
            _ => Err(SourceError::Malformed("token response without access_token".into())),
        }
    }

    fn api_url(&self, path: &str, params: &[(&str, &str)]) -> Result<url::Url, SourceError> {
        let base = format!("{}{path}", self.config.api_base.trim_end_matches('/'));
        url::Url::parse_with_params(&base, params)
            .map_err(|e| SourceError::Malformed(format!("bad API URL {base}: {e}")))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
        url: url::Url,
    ) -> Result<T, SourceError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header("User-Agent", crate::USER_AGENT)
            .timeout(self.request_timeout)
            .send()
            .await?;
        read_json(response).await
    }

    async fn search_posts(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<(String, Vec<PostData>), SourceError> {
        let token = self.access_token().await?;
        let limit = limit.to_string();
        let url = self.api_url(
            "/search",
            &[
                ("q", query),
                ("limit", limit.as_str()),
                ("sort", "relevance"),
                ("type", "link"),
                ("raw_json", "1"),
            ],
        )?;
        let listing: Listing<PostData> = self.get(&token, url).await?;
        let posts = listing
            .data
            .children
            .into_iter()
            .filter(|t| t.kind == "t3")
            .map(|t| t.data)
            .collect();
        Ok((token, posts))
    }

    async fn top_comments(&self, token: &str, post_id: &str) -> Result<Vec<String>, SourceError> {
        let limit = self.config.comments_per_thread.to_string();
        let url = self.api_url(
            &format!("/comments/{post_id}"),
            &[
                ("limit", limit.as_str()),
                ("depth", "1"),
                ("sort", "top"),
                ("raw_json", "1"),
            ],
        )?;
        // [0] is the post itself, [1] its comment tree.
        let listings: Vec<Listing<CommentData>> = self.get(token, url).await?;
        let comments = listings
            .into_iter()
            .nth(1)
            .map(|l| extract_comments(l.data.children, self.config.comments_per_thread))
            .unwrap_or_default();
        Ok(comments)
    }

    async fn with_comments(&self, token: &str, post: PostData) -> DiscussionThread {
        let top_comments = match self.top_comments(token, &post.id).await {
            Ok(c) => c,
            Err(e) => {
                warn!(post = %post.id, error = %e, "could not load comments");
                Vec::new()
            }
        };
        DiscussionThread {
            title: post.title.trim().to_string(),
            permalink: absolute_permalink(&post.permalink),
            subreddit: post.subreddit,
            score: post.score,
            comment_count: post.num_comments,
            body: clip(&post.selftext, MAX_BODY_CHARS),
            top_comments,
        }
    }
}

impl SourceAdapter for RedditClient {
    type Item = DiscussionThread;

    fn kind(&self) -> SourceKind {
        SourceKind::Reddit
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<DiscussionThread>, SourceError> {
        let (token, mut posts) = self
            .retry
            .run(SourceError::is_retriable, || self.search_posts(query, limit))
            .await?;
        posts.truncate(limit);
        debug!(threads = posts.len(), "reddit threads found");

        let threads = join_all(posts.into_iter().map(|p| self.with_comments(&token, p))).await;
        Ok(threads)
    }
}

fn extract_comments(children: Vec<Thing<CommentData>>, limit: usize) -> Vec<String> {
    children
        .into_iter()
        .filter(|t| t.kind == "t1" && !t.data.stickied)
        .filter_map(|t| t.data.body)
        .filter(|b| {
            let b = b.trim();
            !b.is_empty() && b != "[deleted]" && b != "[removed]"
        })
        .map(|b| clip(&b, MAX_COMMENT_CHARS))
        .take(limit)
        .collect()
}

fn absolute_permalink(permalink: &str) -> String {
    if permalink.starts_with("http://") || permalink.starts_with("https://") {
        permalink.to_string()
    } else {
        format!("{WEB_BASE}{permalink}")
    }
}
