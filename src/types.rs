use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Subject type GitHub reports for pull request notifications.
pub const PULL_REQUEST_SUBJECT: &str = "PullRequest";

/// Errors produced while turning a string into a [`PullRequestRef`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefError {
    #[error("invalid pull request format '{input}': expected at least {expected} '/'-separated segments, got {found}")]
    TooFewSegments {
        input: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid pull request format '{input}': empty {field}")]
    EmptySegment { input: String, field: &'static str },

    #[error("invalid pull request number '{number}' in '{input}'")]
    InvalidNumber { input: String, number: String },
}

/// Identifies a single pull request on GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PullRequestRef {
    owner: String,
    repo: String,
    number: u64,
}

impl PullRequestRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /// Parses either URL shape GitHub hands out for a pull request.
    ///
    /// Strings whose fourth segment is `repos` are treated as REST API URLs
    /// (`https://api.github.com/repos/owner/repo/pulls/42`); everything else
    /// is read as a web URL (`https://github.com/owner/repo/pull/42`).
    pub fn parse(input: &str) -> Result<Self, RefError> {
        let input = input.trim();
        let segments = split_segments(input);
        if segments.get(3) == Some(&"repos") {
            Self::from_segments(input, &segments, 4, 5, 7)
        } else {
            Self::from_segments(input, &segments, 3, 4, 6)
        }
    }

    /// Parses a web URL such as `https://github.com/acme/widgets/pull/42`.
    pub fn from_web_url(input: &str) -> Result<Self, RefError> {
        let input = input.trim();
        Self::from_segments(input, &split_segments(input), 3, 4, 6)
    }

    /// Parses a REST API URL such as
    /// `https://api.github.com/repos/acme/widgets/pulls/42`, the shape used
    /// by notification subjects.
    ///
    /// Positions are counted from the first `repos` segment after the host,
    /// so bases with a path prefix (`https://ghe.example.com/api/v3`) parse
    /// the same way as `api.github.com`.
    pub fn from_api_url(input: &str) -> Result<Self, RefError> {
        let input = input.trim();
        let segments = split_segments(input);
        let repos_at = segments
            .iter()
            .skip(3)
            .position(|segment| *segment == "repos")
            .map_or(3, |offset| offset + 3);
        Self::from_segments(input, &segments, repos_at + 1, repos_at + 2, repos_at + 4)
    }

    fn from_segments(
        input: &str,
        segments: &[&str],
        owner_at: usize,
        repo_at: usize,
        number_at: usize,
    ) -> Result<Self, RefError> {
        if segments.len() <= number_at {
            return Err(RefError::TooFewSegments {
                input: input.to_string(),
                expected: number_at + 1,
                found: segments.len(),
            });
        }

        let owner = segments[owner_at];
        if owner.is_empty() {
            return Err(RefError::EmptySegment {
                input: input.to_string(),
                field: "owner",
            });
        }

        let repo = segments[repo_at];
        if repo.is_empty() {
            return Err(RefError::EmptySegment {
                input: input.to_string(),
                field: "repository",
            });
        }

        let number = segments[number_at]
            .parse()
            .map_err(|_| RefError::InvalidNumber {
                input: input.to_string(),
                number: segments[number_at].to_string(),
            })?;

        Ok(Self::new(owner, repo, number))
    }
}

// A trailing slash would otherwise add an empty segment at the end.
fn split_segments(input: &str) -> Vec<&str> {
    input.trim_end_matches('/').split('/').collect()
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "https://github.com/{}/{}/pull/{}",
            self.owner, self.repo, self.number
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSubject {
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRepository {
    pub full_name: String,
}

/// One entry of the authenticated user's notification feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub id: String,
    pub subject: NotificationSubject,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub repository: Option<NotificationRepository>,
}

impl Notification {
    /// Returns the API URL of the pull request this notification is about,
    /// or `None` when the subject is something else.
    ///
    /// When GitHub omits the subject type the URL shape decides.
    pub fn pull_request_url(&self) -> Option<&str> {
        let url = self.subject.url.as_deref()?;
        let is_pull = match self.subject.kind.as_deref() {
            Some(kind) => kind == PULL_REQUEST_SUBJECT,
            None => url.contains("/pulls/"),
        };
        is_pull.then_some(url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Label {
    pub name: String,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Review states reported by the pull request reviews endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReviewUser {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Review {
    // Null for reviews left by deleted accounts.
    pub user: Option<ReviewUser>,
    pub state: ReviewState,
}

impl Review {
    pub fn new(login: impl Into<String>, state: ReviewState) -> Self {
        Self {
            user: Some(ReviewUser {
                login: login.into(),
            }),
            state,
        }
    }

    /// GitHub logins are case-insensitive.
    pub fn is_approval_by(&self, login: &str) -> bool {
        self.state == ReviewState::Approved
            && self
                .user
                .as_ref()
                .is_some_and(|user| user.login.eq_ignore_ascii_case(login))
    }
}

/// Abstraction over the code-hosting backend.
///
/// Implemented by [`crate::GitHub`] for real requests and by in-memory
/// mocks in tests.
#[async_trait]
pub trait Forge {
    /// Fetches the authenticated user's current notification list.
    async fn notifications(&self) -> Result<Vec<Notification>>;

    /// Fetches the labels of the pull request at `pull_url`.
    async fn labels(&self, pull_url: &str) -> Result<Vec<Label>>;

    /// Fetches the reviews of the pull request at `pull_url`.
    async fn reviews(&self, pull_url: &str) -> Result<Vec<Review>>;

    /// Submits an `APPROVE` review.
    async fn approve(&self, pr: &PullRequestRef) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_web_url() {
        let pr = PullRequestRef::parse("https://github.com/acme/widgets/pull/42").unwrap();
        assert_eq!(pr.owner(), "acme");
        assert_eq!(pr.repo(), "widgets");
        assert_eq!(pr.number(), 42);
    }

    #[test]
    fn test_parse_web_url_with_trailing_path() {
        let pr = PullRequestRef::parse("https://github.com/acme/widgets/pull/42/files").unwrap();
        assert_eq!(pr, PullRequestRef::new("acme", "widgets", 42));

        let pr = PullRequestRef::parse("https://github.com/acme/widgets/pull/42/").unwrap();
        assert_eq!(pr, PullRequestRef::new("acme", "widgets", 42));
    }

    #[test]
    fn test_parse_api_url() {
        let pr = PullRequestRef::parse("https://api.github.com/repos/acme/widgets/pulls/7").unwrap();
        assert_eq!(pr, PullRequestRef::new("acme", "widgets", 7));

        let pr =
            PullRequestRef::from_api_url("https://api.github.com/repos/acme/widgets/pulls/7")
                .unwrap();
        assert_eq!(pr, PullRequestRef::new("acme", "widgets", 7));
    }

    #[test]
    fn test_parse_api_url_with_path_prefix() {
        let pr =
            PullRequestRef::from_api_url("https://ghe.example.com/api/v3/repos/acme/widgets/pulls/7")
                .unwrap();
        assert_eq!(pr, PullRequestRef::new("acme", "widgets", 7));

        let err = PullRequestRef::from_api_url("https://ghe.example.com/api/v3/repos/acme/widgets")
            .unwrap_err();
        assert!(matches!(err, RefError::TooFewSegments { .. }));
    }

    #[test]
    fn test_parse_uses_literal_segments() {
        // Segment positions are fixed; the keyword segment is not checked.
        let pr = PullRequestRef::from_web_url("x://host/alice/tools/anything/9").unwrap();
        assert_eq!(pr, PullRequestRef::new("alice", "tools", 9));
    }

    #[test]
    fn test_parse_too_few_segments() {
        let err = PullRequestRef::parse("https://github.com/acme/widgets/pull").unwrap_err();
        assert_eq!(
            err,
            RefError::TooFewSegments {
                input: "https://github.com/acme/widgets/pull".to_string(),
                expected: 7,
                found: 6,
            }
        );

        let err = PullRequestRef::from_api_url("https://github.com/acme/widgets/pull/42")
            .unwrap_err();
        assert!(matches!(err, RefError::TooFewSegments { found: 7, .. }));
    }

    #[test]
    fn test_parse_invalid_number() {
        let err = PullRequestRef::parse("https://github.com/acme/widgets/pull/abc").unwrap_err();
        assert!(matches!(err, RefError::InvalidNumber { ref number, .. } if number == "abc"));
        assert!(err.to_string().contains("invalid pull request number"));
    }

    #[test]
    fn test_parse_empty_owner() {
        let err = PullRequestRef::parse("https://github.com//widgets/pull/1").unwrap_err();
        assert!(matches!(err, RefError::EmptySegment { field: "owner", .. }));
    }

    #[test]
    fn test_display_is_web_url() {
        let pr = PullRequestRef::new("acme", "widgets", 42);
        assert_eq!(pr.to_string(), "https://github.com/acme/widgets/pull/42");
    }

    #[test]
    fn test_notification_pull_request_url() {
        let json = r#"[
            {"id": "1", "reason": "review_requested",
             "subject": {"url": "https://api.github.com/repos/acme/widgets/pulls/1", "type": "PullRequest", "title": "Fix"}},
            {"id": "2",
             "subject": {"url": "https://api.github.com/repos/acme/widgets/issues/2", "type": "Issue"}},
            {"id": "3",
             "subject": {"url": null, "type": "Discussion"}},
            {"id": "4",
             "subject": {"url": "https://api.github.com/repos/acme/widgets/pulls/4"}}
        ]"#;
        let notifications: Vec<Notification> = serde_json::from_str(json).unwrap();

        let urls: Vec<Option<&str>> = notifications
            .iter()
            .map(Notification::pull_request_url)
            .collect();
        assert_eq!(
            urls,
            vec![
                Some("https://api.github.com/repos/acme/widgets/pulls/1"),
                None,
                None,
                Some("https://api.github.com/repos/acme/widgets/pulls/4"),
            ]
        );
    }

    #[test]
    fn test_review_state_decoding() {
        let json = r#"[
            {"user": {"login": "alice"}, "state": "APPROVED"},
            {"user": {"login": "bob"}, "state": "CHANGES_REQUESTED"},
            {"user": null, "state": "APPROVED"},
            {"user": {"login": "carol"}, "state": "SOMETHING_NEW"}
        ]"#;
        let reviews: Vec<Review> = serde_json::from_str(json).unwrap();

        assert_eq!(reviews[0].state, ReviewState::Approved);
        assert_eq!(reviews[1].state, ReviewState::ChangesRequested);
        assert!(reviews[2].user.is_none());
        assert_eq!(reviews[3].state, ReviewState::Unknown);
    }

    #[test]
    fn test_review_is_approval_by() {
        assert!(Review::new("Alice", ReviewState::Approved).is_approval_by("alice"));
        assert!(!Review::new("alice", ReviewState::Commented).is_approval_by("alice"));
        assert!(!Review::new("bob", ReviewState::Approved).is_approval_by("alice"));

        let anonymous = Review {
            user: None,
            state: ReviewState::Approved,
        };
        assert!(!anonymous.is_approval_by("alice"));
    }
}
