//! Autoapprove: approve GitHub pull requests automatically.
//!
//! Approves an explicit list of pull requests, or watches the
//! authenticated user's notification feed and approves every pull request
//! that carries the opt-in label or that the user has not approved yet.

pub mod approve;
pub mod cli;
pub mod config;
pub mod github;
pub mod types;
pub mod watch;

pub use approve::{ApprovalSummary, approve_all};
pub use cli::{Invocation, Mode, Settings, parse_args};
pub use config::{Config, ConfigError, get_github_token};
pub use github::{ApiError, GitHub};
pub use types::{Forge, Label, Notification, PullRequestRef, RefError, Review, ReviewState};
pub use watch::{WatchOptions, WatchStats, Watcher, poll_and_approve, qualifies, watch_loop};
