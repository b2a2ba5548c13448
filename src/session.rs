//! The interactive loop: read a question, run one research turn, print, repeat.

use std::borrow::Cow;
use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::llm::CompletionClient;
use crate::research::{Coordinator, Progress, ResearchError, ResearchState, Stage};
use crate::sources::{DiscussionThread, SearchResult, SourceAdapter, SourceKind};

const PROMPT: &str = "research> ";
const SUCCESS: &str = "✔";
const FAILURE: &str = "✖";

/// Anything that can answer one research question.
pub trait Researcher {
    async fn research(
        &self,
        query: &str,
        progress: &dyn Progress,
    ) -> Result<ResearchState, ResearchError>;
}

impl<W, D, L> Researcher for Coordinator<W, D, L>
where
    W: SourceAdapter<Item = SearchResult>,
    D: SourceAdapter<Item = DiscussionThread>,
    L: CompletionClient,
{
    async fn research(
        &self,
        query: &str,
        progress: &dyn Progress,
    ) -> Result<ResearchState, ResearchError> {
        self.run_turn(query, progress).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Terminated,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Input<'a> {
    Exit,
    Blank,
    Query(&'a str),
}

pub(crate) fn classify(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        Input::Blank
    } else if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        Input::Exit
    } else {
        Input::Query(line)
    }
}

pub struct Session<'a, R, O> {
    researcher: &'a R,
    progress: &'a dyn Progress,
    out: O,
    state: SessionState,
    turns: usize,
}

impl<'a, R: Researcher, O: Write> Session<'a, R, O> {
    pub fn new(researcher: &'a R, progress: &'a dyn Progress, out: O) -> Self {
        Self {
            researcher,
            progress,
            out,
            state: SessionState::Idle,
            turns: 0,
        }
    }

    /// Reads lines until the exit keyword or end of input. Turn failures are
    /// printed and the loop goes on; only I/O errors end it early. Bytes that are
    /// not UTF-8 are replaced rather than rejected.
    pub async fn run<I: AsyncBufRead + Unpin>(&mut self, mut input: I) -> std::io::Result<()> {
        writeln!(
            self.out,
            "Ask a question to research across Google, Bing and Reddit. Type 'exit' to quit."
        )?;
        let mut buf = Vec::new();
        while self.state != SessionState::Terminated {
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;

            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                writeln!(self.out)?;
                self.state = SessionState::Terminated;
                continue;
            }
            let line = String::from_utf8_lossy(&buf);
            if matches!(line, Cow::Owned(_)) {
                warn!("input line is not valid UTF-8; undecodable bytes replaced");
            }
            match classify(&line) {
                Input::Blank => {}
                Input::Exit => self.state = SessionState::Terminated,
                Input::Query(query) => self.turn(query).await?,
            }
        }
        info!(turns = self.turns, "session ended");
        writeln!(self.out, "Goodbye.")?;
        Ok(())
    }

    async fn turn(&mut self, query: &str) -> std::io::Result<()> {
        self.state = SessionState::Running;
        self.turns += 1;
        debug!(turn = self.turns, "turn started");
        let outcome = self.researcher.research(query, self.progress).await;
        self.state = SessionState::Idle;

        match outcome {
            Ok(state) => write_answer(&mut self.out, &state),
            Err(e) => write_failure(&mut self.out, &e),
        }
    }
}

/// Prints the final answer followed by a one-line coverage summary.
pub fn write_answer(out: &mut impl Write, state: &ResearchState) -> std::io::Result<()> {
    writeln!(out, "\n{SUCCESS} {}\n", state.query())?;
    writeln!(out, "{}", state.final_answer().unwrap_or_default())?;
    writeln!(out, "\nCoverage: {}\n", coverage(state))
}

pub fn write_failure(out: &mut impl Write, error: &ResearchError) -> std::io::Result<()> {
    writeln!(out, "\n{FAILURE} {error}")?;
    if let Some(state) = error.state() {
        writeln!(out, "Coverage: {}", coverage(state))?;
    }
    writeln!(out)
}

fn coverage(state: &ResearchState) -> String {
    SourceKind::ALL
        .into_iter()
        .map(|kind| {
            let count = match kind {
                SourceKind::Google => state.google_results().map(<[_]>::len),
                SourceKind::Bing => state.bing_results().map(<[_]>::len),
                SourceKind::Reddit => state.reddit_results().map(<[_]>::len),
            };
            let noun = if kind == SourceKind::Reddit { "threads" } else { "results" };
            match (state.analysis(kind), count) {
                (Some(a), _) if !a.is_available() => format!(
                    "{kind} unavailable ({})",
                    a.unavailable.as_deref().unwrap_or("unknown")
                ),
                (Some(_), Some(n)) => format!("{kind} {n} {noun}"),
                _ => format!("{kind} pending"),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prints each stage to stdout as it happens.
pub struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn report(&self, stage: Stage) {
        match stage {
            Stage::Searching(source) => println!("  → searching {source}..."),
            Stage::Fetched { source, count } => println!("  · {source}: {count} fetched"),
            Stage::Analyzed { source, available } => {
                let outcome = if available { "analysis ready" } else { "no usable analysis" };
                println!("  · {source}: {outcome}");
            }
            Stage::Skipped { source, reason } => println!("  · {source}: skipped, {reason}"),
            Stage::Synthesizing { sources } => {
                println!("  → synthesizing answer from {sources} source(s)...")
            }
            Stage::Done => {}
        }
    }
}
