use anyhow::Context;
use autoapprove::{
    GitHub, Invocation, Mode, approve_all, get_github_token, parse_args, watch_loop,
};
use tracing::info;

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // Dependencies such as hyper and reqwest stay at warn.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(concat!("warn,", env!("CARGO_CRATE_NAME"), "=info")));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let Invocation { settings, mode } = match parse_args(std::env::args()) {
        Ok(invocation) => invocation,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    let token = get_github_token().context("Failed to obtain GitHub authentication token")?;
    let config = settings.config(token)?;
    let github = GitHub::new(&config)?;

    match mode {
        Mode::Approve(prs) => {
            let summary = approve_all(&github, &prs).await;

            for (pr, err) in &summary.failed {
                println!("Error approving PR {pr}: {err}");
            }

            if !summary.is_success() {
                anyhow::bail!(
                    "{} of {} PRs could not be approved",
                    summary.failed.len(),
                    summary.total()
                );
            }
            println!("PRs approved successfully");
        }
        Mode::Watch(options) => {
            let watcher = settings.watcher()?;
            info!(
                user = watcher.user(),
                label = watcher.label(),
                interval_secs = options.interval.as_secs(),
                "watching notifications"
            );

            tokio::select! {
                stats = watch_loop(&watcher, &github, &options) => {
                    info!(
                        polls = stats.polls,
                        approved = stats.approved,
                        "watch finished"
                    );
                    if !stats.is_clean() {
                        anyhow::bail!(
                            "{} poll(s) and {} approval(s) failed",
                            stats.failed_polls,
                            stats.failed_approvals
                        );
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted, stopping");
                }
            }
        }
    }

    Ok(())
}
