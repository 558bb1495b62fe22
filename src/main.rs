use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use logical_core::{Engine, EngineConfig, SearchStatus};

/// Load facts and rules, then answer queries against them.
#[derive(Parser, Debug)]
#[command(name = "logical-core", version)]
struct Args {
    /// Program file(s) of facts and rules to load, in order
    #[arg(short, long, value_name = "FILE")]
    program: Vec<PathBuf>,

    /// Engine configuration in TOML
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the derivation or failure reasoning instead of bare answers
    #[arg(long)]
    explain: bool,

    /// Print a JSON proof summary after each solution
    #[arg(long)]
    summary: bool,

    /// Print the loaded clauses and predicates before answering
    #[arg(long)]
    listing: bool,

    /// Queries to run; read one per line from stdin when none are given
    #[arg(value_name = "QUERY")]
    queries: Vec<String>,
}

fn main() -> Result<()> {
    // RUST_LOG=logical_core=debug shows clause insertion and search progress,
    // RUST_LOG=logical_core=trace every clause attempt.
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).without_time())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            EngineConfig::from_toml_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        },
        None => EngineConfig::default(),
    };

    let mut engine = Engine::with_config(config);
    for path in &args.program {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading program {}", path.display()))?;
        let count = engine
            .load(&text)
            .with_context(|| format!("loading program {}", path.display()))?;
        tracing::info!(path = %path.display(), clauses = count, "loaded program");
    }

    if args.listing {
        let kb = engine.knowledge_base();
        print!("{}", kb);
        let predicates: Vec<String> = kb.predicates().map(|p| p.to_string()).collect();
        println!("% predicates: {}", predicates.join(", "));
    }

    if !args.queries.is_empty() {
        for query in &args.queries {
            answer(&engine, query, &args)?;
        }
        return Ok(());
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading query from stdin")?;
        let query = line.trim();
        if query.is_empty() || query.starts_with('%') {
            continue;
        }
        if let Err(err) = answer(&engine, query, &args) {
            println!("error: {:#}", err);
        }
    }

    Ok(())
}

fn answer(engine: &Engine, query: &str, args: &Args) -> Result<()> {
    if args.explain {
        print!("{}", engine.explain(query)?);
        return Ok(());
    }

    let outcome = engine.evaluate(query)?;
    if !outcome.holds() {
        println!("false.");
    }
    let summaries = outcome.summaries();
    for (solution, summary) in outcome.solutions.iter().zip(summaries) {
        println!("{}.", solution);
        if args.summary {
            println!("{}", serde_json::to_string(&summary)?);
        }
    }
    if let SearchStatus::Truncated(exceeded) = &outcome.status {
        println!("% search incomplete: {}", exceeded);
    }
    Ok(())
}
