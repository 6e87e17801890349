use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::{
    config::{
        Config, ConfigError, DEFAULT_API_URL, DEFAULT_INTERVAL_SECS, DEFAULT_LABEL,
        DEFAULT_TIMEOUT_SECS,
    },
    types::PullRequestRef,
    watch::{WatchOptions, Watcher},
};

#[derive(Args, Debug, Clone)]
struct GlobalArgs {
    /// Login whose existing approvals are checked in watch mode
    #[arg(long, env = "USER", global = true, value_name = "LOGIN")]
    pub user: Option<String>,

    /// Label that opts a pull request into (re-)approval
    #[arg(
        long,
        env = "AUTOAPPROVE_LABEL",
        default_value = DEFAULT_LABEL,
        global = true,
        value_name = "NAME"
    )]
    pub label: String,

    /// GitHub REST API base URL
    #[arg(
        long = "api-url",
        env = "GITHUB_API_URL",
        default_value = DEFAULT_API_URL,
        global = true,
        value_name = "URL"
    )]
    pub api_url: String,

    /// Per-request timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true,
        value_name = "SECS"
    )]
    pub timeout: u64,
}

#[derive(Subcommand, Debug, Clone)]
enum ModeArgs {
    /// Approve the given pull requests once
    Cli {
        /// PR-URL ...
        #[arg(required = true, value_name = "PR-URL")]
        prs: Vec<String>,
    },

    /// Poll notifications and approve qualifying pull requests
    Watch {
        /// Seconds to sleep between polls
        #[arg(
            long,
            default_value_t = DEFAULT_INTERVAL_SECS,
            value_parser = clap::value_parser!(u64).range(1..),
            value_name = "SECS"
        )]
        interval: u64,

        /// Poll a single time and exit
        #[arg(long)]
        once: bool,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = "autoapprove",
    version,
    about = "Approve GitHub pull requests from the command line or by watching your notifications"
)]
struct CliArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub mode: ModeArgs,
}

/// What the binary was asked to do.
#[derive(Debug, Clone)]
pub enum Mode {
    Approve(Vec<PullRequestRef>),
    Watch(WatchOptions),
}

/// Settings shared by both modes.
#[derive(Debug, Clone)]
pub struct Settings {
    pub user: Option<String>,
    pub label: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl Settings {
    pub fn config(&self, token: impl Into<String>) -> Result<Config, ConfigError> {
        Config::new(token, &self.api_url, self.timeout)
    }

    pub fn watcher(&self) -> Result<Watcher, ConfigError> {
        let user = self.user.as_deref().ok_or(ConfigError::MissingUser)?;
        Watcher::new(user, self.label.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub settings: Settings,
    pub mode: Mode,
}

fn parse_pr_args(prs: &[String]) -> Result<Vec<PullRequestRef>> {
    let mut refs = Vec::new();

    for pr in prs {
        let pr = pr.trim();
        if pr.is_empty() {
            continue;
        }
        refs.push(
            PullRequestRef::parse(pr)
                .with_context(|| format!("Invalid pull request argument: '{}'", pr))?,
        );
    }

    if refs.is_empty() {
        anyhow::bail!("No pull requests given");
    }

    Ok(refs)
}

fn build_invocation(cli: CliArgs) -> Result<Invocation> {
    let settings = Settings {
        user: cli.global.user.filter(|user| !user.trim().is_empty()),
        label: cli.global.label,
        api_url: cli.global.api_url,
        timeout: Duration::from_secs(cli.global.timeout),
    };

    let mode = match cli.mode {
        ModeArgs::Cli { prs } => Mode::Approve(parse_pr_args(&prs)?),
        ModeArgs::Watch { interval, once } => Mode::Watch(WatchOptions {
            interval: Duration::from_secs(interval),
            max_polls: once.then_some(1),
        }),
    };

    Ok(Invocation { settings, mode })
}

/// Parses command-line arguments into the requested mode and its settings.
///
/// Pull request arguments are fully parsed here, so a malformed one is
/// reported before any request is made.
pub fn parse_args<I, T>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    build_invocation(cli)
}
