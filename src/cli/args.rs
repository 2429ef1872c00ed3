//! Clap argument types.

use clap::Parser;

use repoprobe::constants::ENV_GITHUB_TOKEN;
use repoprobe::models::FileOperation;
use repoprobe::orchestrator::GenerationRequest;

/// Generate tests, mocks and bug reports for GitHub repositories.
#[derive(Parser, Debug)]
#[command(
    name = "repoprobe",
    version = repoprobe::constants::VERSION,
    about = super::ABOUT_STYLED,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// List the supported source files of a repository.
    Files(RepoArgs),

    /// Generate unit tests for each file.
    Tests(RepoArgs),

    /// Generate mock data for each file.
    Mocks(RepoArgs),

    /// Detect bugs in each file, with Stack Overflow references.
    Bugs(RepoArgs),

    /// Report the license declared in each file's header.
    Licenses(RepoArgs),

    /// Fetch the full source of each file.
    Code(RepoArgs),

    /// Generate README-style documentation for the repository.
    Docs(RepoArgs),

    /// Manage the result cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print version information.
    Version,
}

impl Command {
    /// The per-file operation this command runs, if it is one.
    pub fn file_operation(&self) -> Option<FileOperation> {
        match self {
            Command::Tests(_) => Some(FileOperation::GenerateTests),
            Command::Mocks(_) => Some(FileOperation::GenerateMocks),
            Command::Bugs(_) => Some(FileOperation::DetectBugs),
            Command::Licenses(_) => Some(FileOperation::LicenseScan),
            Command::Code(_) => Some(FileOperation::FetchFullCode),
            _ => None,
        }
    }

    /// Whether this command prompts the LLM and so needs a provider key.
    pub fn needs_llm(&self) -> bool {
        match self {
            Command::Docs(_) => true,
            _ => self.file_operation().is_some_and(FileOperation::uses_llm),
        }
    }
}

/// Cache management subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum CacheAction {
    /// Remove all cached entries.
    Clear,
    /// Show cache statistics (entry count and size).
    Stats,
    /// Print where the cache lives.
    Path,
}

/// Arguments shared by every repository command.
#[derive(clap::Args, Debug, Clone)]
pub struct RepoArgs {
    /// Repository owner (user or organization).
    #[arg(long)]
    pub owner: String,

    /// Repository name.
    #[arg(long)]
    pub repo: String,

    /// Restrict the request to a single repo-relative file.
    #[arg(long, value_name = "PATH")]
    pub file: Option<String>,

    /// GitHub access token. Falls back to `GITHUB_TOKEN` and the config file.
    #[arg(long, env = ENV_GITHUB_TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    /// Bypass the cache for this run.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Skip Stack Overflow lookups for bug findings.
    #[arg(long, default_value_t = false)]
    pub no_enrich: bool,

    /// Maximum number of files processed in parallel.
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

impl RepoArgs {
    /// Build the request, using `fallback_token` when `--token` is absent.
    pub fn to_request(&self, fallback_token: Option<&str>) -> GenerationRequest {
        let credential = self
            .token
            .as_deref()
            .or(fallback_token)
            .unwrap_or_default();
        let request = GenerationRequest::new(&self.owner, &self.repo, credential);
        match &self.file {
            Some(path) => request.with_scope(path.as_str()),
            None => request,
        }
    }
}
