use std::{collections::HashSet, time::Duration};

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::{
    approve::{ApprovalSummary, approve_all},
    config::{ConfigError, DEFAULT_INTERVAL_SECS},
    types::{Forge, Label, PullRequestRef, Review},
};

/// Decides whether a pull request should be (re-)approved.
///
/// A pull request qualifies when it carries `opt_in_label`, or when the
/// configured user has not approved it yet. A pull request that is already
/// approved but still labelled qualifies again.
pub fn qualifies(labels: &[Label], approved_by_user: bool, opt_in_label: &str) -> bool {
    labels.iter().any(|label| label.name == opt_in_label) || !approved_by_user
}

pub fn has_approved(reviews: &[Review], login: &str) -> bool {
    reviews.iter().any(|review| review.is_approval_by(login))
}

/// Scans the notification feed for pull requests to approve.
#[derive(Debug, Clone)]
pub struct Watcher {
    user: String,
    label: String,
}

impl Watcher {
    pub fn new(user: impl Into<String>, label: impl Into<String>) -> Result<Self, ConfigError> {
        let user = user.into().trim().to_string();
        if user.is_empty() {
            return Err(ConfigError::MissingUser);
        }

        let label = label.into().trim().to_string();
        if label.is_empty() {
            return Err(ConfigError::EmptyLabel);
        }

        Ok(Self { user, label })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs one poll and returns the qualifying pull requests in
    /// notification order, each at most once.
    ///
    /// Any failure aborts the poll; no partial result is returned.
    pub async fn poll<F>(&self, forge: &F) -> Result<Vec<PullRequestRef>>
    where
        F: Forge + Sync,
    {
        let notifications = forge
            .notifications()
            .await
            .context("error fetching notifications")?;
        debug!(count = notifications.len(), "fetched notifications");

        let mut seen = HashSet::new();
        let mut qualifying = Vec::new();

        for notification in &notifications {
            let Some(pull_url) = notification.pull_request_url() else {
                debug!(id = %notification.id, "skipping non pull request notification");
                continue;
            };

            let (labels, reviews) =
                futures::try_join!(forge.labels(pull_url), forge.reviews(pull_url))
                    .with_context(|| format!("error inspecting pull request {pull_url}"))?;

            let approved = has_approved(&reviews, &self.user);
            if !qualifies(&labels, approved, &self.label) {
                debug!(url = pull_url, "already approved and not labelled");
                continue;
            }

            let pr = PullRequestRef::from_api_url(pull_url)
                .with_context(|| format!("error splitting link {pull_url}"))?;
            if seen.insert(pr.clone()) {
                qualifying.push(pr);
            }
        }

        Ok(qualifying)
    }
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub interval: Duration,
    /// Stop after this many polls; `None` loops forever.
    pub max_polls: Option<usize>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            max_polls: None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchStats {
    pub polls: usize,
    pub failed_polls: usize,
    pub approved: usize,
    pub failed_approvals: usize,
}

impl WatchStats {
    pub fn is_clean(&self) -> bool {
        self.failed_polls == 0 && self.failed_approvals == 0
    }
}

/// Polls once and approves everything that qualifies.
pub async fn poll_and_approve<F>(watcher: &Watcher, forge: &F) -> Result<ApprovalSummary>
where
    F: Forge + Sync,
{
    let prs = watcher.poll(forge).await?;
    Ok(approve_all(forge, &prs).await)
}

/// Polls and approves on a fixed interval.
///
/// A failed poll is logged and the loop carries on with the next tick.
pub async fn watch_loop<F>(watcher: &Watcher, forge: &F, options: &WatchOptions) -> WatchStats
where
    F: Forge + Sync,
{
    let mut stats = WatchStats::default();

    loop {
        stats.polls += 1;

        match poll_and_approve(watcher, forge).await {
            Ok(summary) => {
                if summary.total() > 0 {
                    info!(
                        approved = summary.approved.len(),
                        failed = summary.failed.len(),
                        "poll complete"
                    );
                } else {
                    debug!("poll complete, nothing to approve");
                }
                stats.approved += summary.approved.len();
                stats.failed_approvals += summary.failed.len();
            }
            Err(err) => {
                stats.failed_polls += 1;
                error!("poll failed: {err:#}");
            }
        }

        if options.max_polls.is_some_and(|max| stats.polls >= max) {
            break;
        }

        tokio::time::sleep(options.interval).await;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReviewState;

    fn labels(names: &[&str]) -> Vec<Label> {
        names.iter().map(|name| Label::new(*name)).collect()
    }

    #[test]
    fn test_qualifies_truth_table() {
        assert!(qualifies(&labels(&["autoapprove"]), true, "autoapprove"));
        assert!(qualifies(&labels(&["autoapprove"]), false, "autoapprove"));
        assert!(!qualifies(&labels(&[]), true, "autoapprove"));
        assert!(qualifies(&labels(&[]), false, "autoapprove"));
    }

    #[test]
    fn test_qualifies_label_match_is_exact() {
        assert!(!qualifies(&labels(&["AutoApprove", "bug"]), true, "autoapprove"));
        assert!(qualifies(&labels(&["bug", "ship-it"]), true, "ship-it"));
    }

    #[test]
    fn test_has_approved() {
        let reviews = vec![
            Review::new("alice", ReviewState::Commented),
            Review::new("bob", ReviewState::Approved),
        ];
        assert!(!has_approved(&reviews, "alice"));
        assert!(has_approved(&reviews, "bob"));
        assert!(!has_approved(&[], "bob"));
    }

    #[test]
    fn test_watcher_requires_user_and_label() {
        assert!(matches!(
            Watcher::new(" ", "autoapprove"),
            Err(ConfigError::MissingUser)
        ));
        assert!(matches!(
            Watcher::new("alice", ""),
            Err(ConfigError::EmptyLabel)
        ));

        let watcher = Watcher::new(" alice ", "autoapprove").unwrap();
        assert_eq!(watcher.user(), "alice");
        assert_eq!(watcher.label(), "autoapprove");
    }
}
