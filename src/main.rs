//! repoprobe — LLM-generated tests, mocks and bug reports for GitHub
//! repositories.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages. Results go to
//! stdout as JSON; logs and errors go to stderr.

mod cli;

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use cli::args::{CacheAction, Cli, Command, RepoArgs};
use repoprobe::cache::CacheEngine;
use repoprobe::config::Config;
use repoprobe::constants::{self, ENV_LOG};
use repoprobe::enrich::{Enricher, StackExchange};
use repoprobe::env::Env;
use repoprobe::generator::Generator;
use repoprobe::models::FileOperation;
use repoprobe::orchestrator::{Orchestrator, RequestError};
use repoprobe::providers::rig::RigProvider;
use repoprobe::source::GitHubSource;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        if let Some(request_err) = err.downcast_ref::<RequestError>() {
            let code = match request_err {
                RequestError::InvalidInput(_) => 1,
                RequestError::Upstream(_) => 2,
            };
            match serde_json::to_string(&request_err.body()) {
                Ok(body) => eprintln!("{body}"),
                Err(_) => eprintln!("Error: {request_err}"),
            }
            process::exit(code);
        }
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

/// Log to stderr so stdout stays machine-readable.
fn init_tracing() {
    let env = Env::real();
    let directives = env
        .first_of(&[ENV_LOG, "RUST_LOG"])
        .unwrap_or_else(|| "warn".to_string());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let op = cli.command.file_operation();
    let needs_llm = cli.command.needs_llm();

    match cli.command {
        Command::Files(args) => run_files(args).await,
        Command::Docs(args) => run_docs(args, needs_llm).await,
        Command::Tests(args)
        | Command::Mocks(args)
        | Command::Bugs(args)
        | Command::Licenses(args)
        | Command::Code(args) => {
            let op = op.context("command has no file operation")?;
            run_operation(op, args, needs_llm).await
        }
        Command::Cache { action } => run_cache(action).await,
        Command::Version => run_version(),
    }
}

/// Print version information.
fn run_version() -> Result<()> {
    use colored::Colorize;

    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    Ok(())
}

/// Manage the result cache.
async fn run_cache(action: CacheAction) -> Result<()> {
    let config = load_config()?;
    let engine = CacheEngine::from_config(&config.cache).context("failed to open cache")?;

    match action {
        CacheAction::Clear => {
            let stats = engine.clear().await.context("failed to clear cache")?;
            println!(
                "Cleared {} cached entry/entries ({}).",
                stats.entries,
                stats.human_size(),
            );
        }
        CacheAction::Stats => {
            let stats = engine.stats().await.context("failed to read cache stats")?;
            println!("Cache entries: {}", stats.entries);
            println!("Cache size:    {}", stats.human_size());
        }
        CacheAction::Path => println!("{}", engine.location()),
    }

    Ok(())
}

async fn run_files(args: RepoArgs) -> Result<()> {
    let config = load_config()?;
    let request = args.to_request(config.github.token.as_deref());
    let orchestrator = build_orchestrator(&config, &args, None, false)?;
    let files = orchestrator.list_files(&request).await?;
    print_json(&files)
}

async fn run_operation(op: FileOperation, args: RepoArgs, needs_llm: bool) -> Result<()> {
    let config = load_config()?;
    let request = args.to_request(config.github.token.as_deref());
    let orchestrator = build_orchestrator(&config, &args, Some(op), needs_llm)?;
    let result = orchestrator.run(op, &request).await?;
    print_json(&result.value)
}

async fn run_docs(args: RepoArgs, needs_llm: bool) -> Result<()> {
    let config = load_config()?;
    let request = args.to_request(config.github.token.as_deref());
    let orchestrator = build_orchestrator(&config, &args, None, needs_llm)?;
    let result = orchestrator.repo_docs(&request).await?;
    print_json(&result.value)
}

fn load_config() -> Result<Config> {
    let cwd = std::env::current_dir().context("failed to determine working directory")?;
    Config::load(Some(cwd.as_path()), &Env::real()).context("failed to load configuration")
}

/// Wire the collaborators for one invocation.
///
/// A `RigProvider` is built only when `needs_llm` is set, so `files`,
/// `licenses` and `code` work without an API key.
fn build_orchestrator(
    config: &Config,
    args: &RepoArgs,
    op: Option<FileOperation>,
    needs_llm: bool,
) -> Result<Orchestrator> {
    let limits = &config.limits;
    let http_timeout = Duration::from_secs(limits.http_timeout_secs);

    let cache = if args.no_cache {
        CacheEngine::disabled()
    } else {
        CacheEngine::from_config(&config.cache).context("failed to open cache")?
    };

    let source = GitHubSource::new(&config.github.api_base, http_timeout)
        .context("failed to build GitHub client")?;

    let provider: Arc<dyn repoprobe::providers::LlmProvider> = if needs_llm {
        let rig = RigProvider::new(config.provider.clone()).context("failed to configure LLM provider")?;
        tracing::info!(provider = %config.provider.name, model = rig.model(), "using LLM provider");
        Arc::new(rig)
    } else {
        Arc::new(NoLlm)
    };
    let generator = Generator::new(provider, Duration::from_secs(limits.llm_timeout_secs));

    let mut orchestrator = Orchestrator::new(Arc::new(source), generator, Arc::new(cache))
        .with_max_concurrent(args.max_concurrent.unwrap_or(limits.max_concurrent))
        .with_docs_char_budget(limits.docs_char_budget);

    let enrich = config.enrichment.enabled && !args.no_enrich && op == Some(FileOperation::DetectBugs);
    if enrich {
        let e = &config.enrichment;
        let search = StackExchange::new(&e.api_base, &e.site, e.key.clone(), http_timeout)
            .context("failed to build Stack Exchange client")?;
        orchestrator = orchestrator.with_enricher(Enricher::new(Arc::new(search), e.max_results, http_timeout));
    }

    Ok(orchestrator)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize result")?;
    println!("{json}");
    Ok(())
}

/// Stand-in provider for operations that never prompt the model.
struct NoLlm;

#[async_trait::async_trait]
impl repoprobe::providers::LlmProvider for NoLlm {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, repoprobe::providers::ProviderError> {
        Err(repoprobe::providers::ProviderError::NotConfigured(
            "no LLM provider is needed for this command".into(),
        ))
    }
}
