//! Repository events that trigger pipelines.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of repository event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
    Tag,
    Promote,
    Rollback,
    Cron,
    Custom,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Push => "push",
            EventKind::PullRequest => "pull_request",
            EventKind::Tag => "tag",
            EventKind::Promote => "promote",
            EventKind::Rollback => "rollback",
            EventKind::Cron => "cron",
            EventKind::Custom => "custom",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "pull_request" => Ok(EventKind::PullRequest),
            "tag" => Ok(EventKind::Tag),
            "promote" => Ok(EventKind::Promote),
            "rollback" => Ok(EventKind::Rollback),
            "cron" => Ok(EventKind::Cron),
            "custom" => Ok(EventKind::Custom),
            other => Err(format!("unknown event kind: {}", other)),
        }
    }
}

/// Outcome visible to trigger predicates through the `status` category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    Failure,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Success => "success",
            BuildStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The dimensions a trigger predicate can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Branch,
    Ref,
    Event,
    Status,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dimension::Branch => "branch",
            Dimension::Ref => "ref",
            Dimension::Event => "event",
            Dimension::Status => "status",
        })
    }
}

/// An incoming repository event.
///
/// For dependent pipelines the scheduler hands the trigger evaluator a copy
/// whose `status` carries the dependencies' outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub build_number: u64,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default)]
    pub status: Option<BuildStatus>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            branch: None,
            git_ref: None,
            commit: None,
            author: None,
            build_number: 0,
            remote_url: None,
            status: None,
        }
    }

    /// A push to `branch`, with the matching `refs/heads/` ref.
    pub fn push(branch: impl Into<String>) -> Self {
        let branch = branch.into();
        Self {
            git_ref: Some(format!("refs/heads/{}", branch)),
            branch: Some(branch),
            ..Self::new(EventKind::Push)
        }
    }

    /// A tag push; the ref becomes `refs/tags/<tag>`.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            git_ref: Some(format!("refs/tags/{}", tag.into())),
            ..Self::new(EventKind::Tag)
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.git_ref = Some(git_ref.into());
        self
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_build_number(mut self, build_number: u64) -> Self {
        self.build_number = build_number;
        self
    }

    pub fn with_remote_url(mut self, remote_url: impl Into<String>) -> Self {
        self.remote_url = Some(remote_url.into());
        self
    }

    pub fn with_status(mut self, status: BuildStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// The event's value for a predicate dimension, if it carries one.
    pub fn value(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::Branch => self.branch.as_deref(),
            Dimension::Ref => self.git_ref.as_deref(),
            Dimension::Event => Some(self.kind.as_str()),
            Dimension::Status => self.status.map(|s| s.as_str()),
        }
    }
}
