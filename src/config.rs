//! Command-line flags, credentials, and tuning knobs.
//!
//! Knobs come from [`Cli`] (each with an environment fallback); credentials are
//! read from the environment only. [`Config::resolve`] merges the two and
//! applies the missing-credential policy.

use std::time::Duration;

use clap::Parser;
use tracing::warn;

use crate::retry::RetryPolicy;
use crate::sources::SourceKind;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MODEL_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SERP_BASE_URL: &str = "https://api.brightdata.com";
pub const DEFAULT_SERP_ZONE: &str = "serp_api1";
pub const DEFAULT_REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_REDDIT_API_BASE: &str = "https://oauth.reddit.com";

pub const RESULTS_RANGE: std::ops::RangeInclusive<usize> = 3..=10;
pub const COMMENTS_RANGE: std::ops::RangeInclusive<usize> = 1..=10;

#[derive(Debug, Parser)]
#[command(name = "triangulate", version, about)]
pub struct Cli {
    /// Run a single research turn for this query and exit
    #[arg(short, long)]
    pub query: Option<String>,

    /// Print the full research state as JSON (one-shot mode only)
    #[arg(long, requires = "query")]
    pub json: bool,

    /// Results requested from each source (3-10)
    #[arg(short = 'n', long, env = "TRIANGULATE_RESULTS", default_value_t = 5)]
    pub results: usize,

    /// Top comments collected per Reddit thread (1-10)
    #[arg(long, env = "TRIANGULATE_COMMENTS", default_value_t = 3)]
    pub comments: usize,

    /// Chat model used for analysis and synthesis
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Sampling temperature (0-2); the API default when omitted
    #[arg(long, env = "OPENAI_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_MODEL_BASE_URL)]
    pub model_base_url: String,

    /// Bright Data SERP zone name
    #[arg(long, env = "BRIGHTDATA_SERP_ZONE", default_value = DEFAULT_SERP_ZONE)]
    pub serp_zone: String,

    /// Per-request network timeout in seconds
    #[arg(long, env = "TRIANGULATE_REQUEST_TIMEOUT", default_value_t = 20)]
    pub request_timeout: u64,

    /// Deadline for all three sources in one turn, in seconds
    #[arg(long, env = "TRIANGULATE_TURN_TIMEOUT", default_value_t = 90)]
    pub turn_timeout: u64,

    /// Attempts per upstream call, including the first
    #[arg(long, env = "TRIANGULATE_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Abort at startup if any source lacks credentials instead of disabling it
    #[arg(long)]
    pub require_all_sources: bool,

    /// Debug-level logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} not set (required for {purpose})")]
    MissingCredential {
        var: &'static str,
        purpose: &'static str,
    },

    #[error("no search source has credentials; set BRIGHTDATA_API_KEY and/or REDDIT_CLIENT_ID + REDDIT_CLIENT_SECRET")]
    NoSources,

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Secret,
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct SerpConfig {
    pub api_key: Secret,
    pub base_url: String,
    pub zone: String,
}

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: Secret,
    pub auth_url: String,
    pub api_base: String,
    pub comments_per_thread: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    /// Shared by Google and Bing; `None` disables both.
    pub serp: Option<SerpConfig>,
    pub reddit: Option<RedditConfig>,
    pub results_per_source: usize,
    pub request_timeout: Duration,
    pub turn_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Config {
    /// Builds the configuration from parsed flags and an environment lookup.
    ///
    /// The model key is always required. Source credentials are optional unless
    /// `--require-all-sources` is set; a source without them is disabled.
    pub fn resolve(
        cli: &Cli,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            env(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = var("OPENAI_API_KEY").ok_or(ConfigError::MissingCredential {
            var: "OPENAI_API_KEY",
            purpose: "analysis and synthesis",
        })?;

        let serp = match var("BRIGHTDATA_API_KEY") {
            Some(key) => Some(SerpConfig {
                api_key: Secret::new(key),
                base_url: var("BRIGHTDATA_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_SERP_BASE_URL.to_string()),
                zone: cli.serp_zone.clone(),
            }),
            None if cli.require_all_sources => {
                return Err(ConfigError::MissingCredential {
                    var: "BRIGHTDATA_API_KEY",
                    purpose: "Google and Bing search",
                });
            }
            None => {
                warn!("BRIGHTDATA_API_KEY not set; Google and Bing sources disabled");
                None
            }
        };

        let reddit = match (var("REDDIT_CLIENT_ID"), var("REDDIT_CLIENT_SECRET")) {
            (Some(client_id), Some(secret)) => Some(RedditConfig {
                client_id,
                client_secret: Secret::new(secret),
                auth_url: DEFAULT_REDDIT_AUTH_URL.to_string(),
                api_base: DEFAULT_REDDIT_API_BASE.to_string(),
                comments_per_thread: cli.comments.clamp(*COMMENTS_RANGE.start(), *COMMENTS_RANGE.end()),
            }),
            (id, _) if cli.require_all_sources => {
                return Err(ConfigError::MissingCredential {
                    var: if id.is_none() {
                        "REDDIT_CLIENT_ID"
                    } else {
                        "REDDIT_CLIENT_SECRET"
                    },
                    purpose: "Reddit search",
                });
            }
            _ => {
                warn!("Reddit credentials not set; Reddit source disabled");
                None
            }
        };

        if serp.is_none() && reddit.is_none() {
            return Err(ConfigError::NoSources);
        }

        let config = Self {
            llm: LlmConfig {
                api_key: Secret::new(api_key),
                model: cli.model.trim().to_string(),
                base_url: cli.model_base_url.trim().to_string(),
                temperature: cli.temperature,
            },
            serp,
            reddit,
            results_per_source: cli
                .results
                .clamp(*RESULTS_RANGE.start(), *RESULTS_RANGE.end()),
            request_timeout: Duration::from_secs(cli.request_timeout),
            turn_timeout: Duration::from_secs(cli.turn_timeout),
            retry: RetryPolicy {
                max_attempts: cli.max_attempts,
                ..RetryPolicy::default()
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than 0".into(),
            ));
        }
        if self.turn_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "turn timeout must be greater than 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max attempts must be at least 1".into(),
            ));
        }
        if let Some(t) = self.llm.temperature.filter(|t| !(0.0..=2.0).contains(t)) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be between 0 and 2, got {t}"
            )));
        }
        if self.llm.model.is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if url::Url::parse(&self.llm.base_url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "model base URL is not a valid URL: {}",
                self.llm.base_url
            )));
        }
        Ok(())
    }

    /// Sources that have credentials, in display order.
    pub fn enabled_sources(&self) -> Vec<SourceKind> {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                SourceKind::Google | SourceKind::Bing => self.serp.is_some(),
                SourceKind::Reddit => self.reddit.is_some(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["triangulate"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    const ALL_KEYS: &[(&str, &str)] = &[
        ("OPENAI_API_KEY", "sk-test"),
        ("BRIGHTDATA_API_KEY", "bd-test"),
        ("REDDIT_CLIENT_ID", "id"),
        ("REDDIT_CLIENT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_with_all_credentials() {
        let config = Config::resolve(&cli(&[]), env_of(ALL_KEYS)).unwrap();
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.results_per_source, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert_eq!(config.turn_timeout, Duration::from_secs(90));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.serp.as_ref().unwrap().zone, DEFAULT_SERP_ZONE);
        assert_eq!(config.reddit.as_ref().unwrap().comments_per_thread, 3);
        assert_eq!(config.enabled_sources(), SourceKind::ALL.to_vec());
    }

    #[test]
    fn missing_model_key_is_fatal() {
        let err = Config::resolve(&cli(&[]), env_of(&ALL_KEYS[1..])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"), "got: {err}");
    }

    #[test]
    fn blank_model_key_counts_as_missing() {
        let err = Config::resolve(
            &cli(&[]),
            env_of(&[("OPENAI_API_KEY", "   "), ("BRIGHTDATA_API_KEY", "bd")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential { .. }));
    }

    #[test]
    fn missing_search_key_disables_web_sources() {
        let config = Config::resolve(
            &cli(&[]),
            env_of(&[
                ("OPENAI_API_KEY", "sk"),
                ("REDDIT_CLIENT_ID", "id"),
                ("REDDIT_CLIENT_SECRET", "secret"),
            ]),
        )
        .unwrap();
        assert!(config.serp.is_none());
        assert_eq!(config.enabled_sources(), vec![SourceKind::Reddit]);
    }

    #[test]
    fn half_reddit_credentials_disable_reddit() {
        let config = Config::resolve(
            &cli(&[]),
            env_of(&[
                ("OPENAI_API_KEY", "sk"),
                ("BRIGHTDATA_API_KEY", "bd"),
                ("REDDIT_CLIENT_ID", "id"),
            ]),
        )
        .unwrap();
        assert!(config.reddit.is_none());
        assert_eq!(
            config.enabled_sources(),
            vec![SourceKind::Google, SourceKind::Bing]
        );
    }

    #[test]
    fn require_all_sources_makes_missing_key_fatal() {
        let err = Config::resolve(
            &cli(&["--require-all-sources"]),
            env_of(&[
                ("OPENAI_API_KEY", "sk"),
                ("BRIGHTDATA_API_KEY", "bd"),
                ("REDDIT_CLIENT_ID", "id"),
            ]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("REDDIT_CLIENT_SECRET"), "got: {err}");
    }

    #[test]
    fn no_source_credentials_is_fatal() {
        let err =
            Config::resolve(&cli(&[]), env_of(&[("OPENAI_API_KEY", "sk")])).unwrap_err();
        assert!(matches!(err, ConfigError::NoSources));
    }

    #[test]
    fn limits_are_clamped() {
        let config =
            Config::resolve(&cli(&["-n", "50", "--comments", "0"]), env_of(ALL_KEYS)).unwrap();
        assert_eq!(config.results_per_source, 10);
        assert_eq!(config.reddit.unwrap().comments_per_thread, 1);

        let config = Config::resolve(&cli(&["-n", "1"]), env_of(ALL_KEYS)).unwrap();
        assert_eq!(config.results_per_source, 3);
    }

    #[test]
    fn zero_timeouts_rejected() {
        let err = Config::resolve(&cli(&["--turn-timeout", "0"]), env_of(ALL_KEYS)).unwrap_err();
        assert!(err.to_string().contains("turn timeout"));

        let err =
            Config::resolve(&cli(&["--request-timeout", "0"]), env_of(ALL_KEYS)).unwrap_err();
        assert!(err.to_string().contains("request timeout"));
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = Config::resolve(&cli(&["--max-attempts", "0"]), env_of(ALL_KEYS)).unwrap_err();
        assert!(err.to_string().contains("attempts"));
    }

    #[test]
    fn temperature_is_optional_and_bounded() {
        let config = Config::resolve(&cli(&[]), env_of(ALL_KEYS)).unwrap();
        assert_eq!(config.llm.temperature, None);

        let config = Config::resolve(&cli(&["--temperature", "0.2"]), env_of(ALL_KEYS)).unwrap();
        assert_eq!(config.llm.temperature, Some(0.2));

        let err = Config::resolve(&cli(&["--temperature", "3"]), env_of(ALL_KEYS)).unwrap_err();
        assert!(err.to_string().contains("temperature"), "got: {err}");
    }

    #[test]
    fn json_requires_query() {
        let mut argv = vec!["triangulate", "--json"];
        assert!(Cli::try_parse_from(&argv).is_err());
        argv.extend(["--query", "rust"]);
        assert!(Cli::try_parse_from(&argv).is_ok());
    }

    #[test]
    fn secret_debug_is_redacted() {
        let s = Secret::new("sk-very-secret");
        assert_eq!(format!("{s:?}"), "[REDACTED]");
        let llm = LlmConfig {
            api_key: s,
            model: "m".into(),
            base_url: "https://x".into(),
            temperature: None,
        };
        assert!(!format!("{llm:?}").contains("sk-very-secret"));
    }
}
