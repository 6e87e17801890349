use tracing::{info, warn};

use crate::types::{Forge, PullRequestRef};

/// Outcome of approving a batch of pull requests.
#[derive(Debug, Default)]
pub struct ApprovalSummary {
    pub approved: Vec<PullRequestRef>,
    pub failed: Vec<(PullRequestRef, String)>,
}

impl ApprovalSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.approved.len() + self.failed.len()
    }
}

/// Approves each pull request in order.
///
/// A failure is logged and recorded in the summary; the remaining pull
/// requests are still processed.
pub async fn approve_all<F>(forge: &F, prs: &[PullRequestRef]) -> ApprovalSummary
where
    F: Forge + Sync,
{
    let mut summary = ApprovalSummary::default();

    for pr in prs {
        match forge.approve(pr).await {
            Ok(()) => {
                info!(pr = %pr, "approved");
                summary.approved.push(pr.clone());
            }
            Err(err) => {
                warn!(pr = %pr, "failed to approve: {err:#}");
                summary.failed.push((pr.clone(), format!("{err:#}")));
            }
        }
    }

    summary
}
