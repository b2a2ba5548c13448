mod config;
mod llm;
mod prompts;
mod research;
mod retry;
mod session;
mod sources;

pub const USER_AGENT: &str = concat!("triangulate/", env!("CARGO_PKG_VERSION"));

use std::time::Duration;

use clap::Parser;
use config::{Cli, Config};
use llm::OpenAiClient;
use research::{Coordinator, Progress, Silent, TurnSettings};
use session::{ConsoleProgress, Session};
use sources::{RedditClient, SerpClient, SerpEngine};
use tracing::info;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type Triangulate = Coordinator<SerpClient, RedditClient, OpenAiClient>;

fn build(config: Config) -> Result<Triangulate, reqwest::Error> {
    let http = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(config.request_timeout)
        .build()?;

    let serp = |engine| {
        config.serp.clone().map(|serp| {
            SerpClient::new(http.clone(), serp, engine, config.request_timeout, config.retry)
        })
    };
    let google = serp(SerpEngine::Google);
    let bing = serp(SerpEngine::Bing);
    let reddit = config.reddit.clone().map(|reddit| {
        RedditClient::new(http.clone(), reddit, config.request_timeout, config.retry)
    });
    let llm = OpenAiClient::new(http.clone(), config.llm.clone(), config.request_timeout, config.retry);
    info!(model = llm.model(), "model client ready");

    Ok(Coordinator::new(
        google,
        bing,
        reddit,
        llm,
        TurnSettings {
            results_per_source: config.results_per_source,
            turn_timeout: config.turn_timeout,
        },
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { "triangulate=debug" } else { "triangulate=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    let config = Config::resolve(&cli, |name| std::env::var(name).ok())
        .inspect_err(|e| tracing::error!("configuration error: {e}"))?;
    let enabled = config
        .enabled_sources()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    info!(sources = %enabled.join(", "), "starting triangulate");

    let coordinator = build(config)?;

    if let Some(query) = cli.query.as_deref() {
        let progress: &dyn Progress = if cli.json { &Silent } else { &ConsoleProgress };
        match coordinator.run_turn(query, progress).await {
            Ok(state) if cli.json => println!("{}", serde_json::to_string_pretty(&state)?),
            Ok(state) => session::write_answer(&mut std::io::stdout(), &state)?,
            Err(e) => {
                session::write_failure(&mut std::io::stderr(), &e)?;
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    Session::new(&coordinator, &ConsoleProgress, std::io::stdout())
        .run(stdin)
        .await?;
    Ok(())
}
