//! GitHub API helpers for posting coverage comments and commit statuses on
//! pull requests.

use anyhow::{bail, Context as _, Result};
use serde::Deserialize;
use tracing::{debug, info};

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_SERVER_URL: &str = "https://github.com";
const USER_AGENT: &str = "prcov";

/// Resolved GitHub Actions context, read from environment variables.
pub struct Context {
    token: String,
    api_url: String,
    server_url: String,
    pub repo: String,
    pub pr_number: Option<u64>,
    pub sha: Option<String>,
}

impl Context {
    /// Build a context from standard GitHub Actions environment variables
    /// (`GITHUB_TOKEN`, `GITHUB_REPOSITORY`, `GITHUB_EVENT_PATH`,
    /// `GITHUB_SHA`, `GITHUB_API_URL`, `GITHUB_SERVER_URL`).
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .context("GITHUB_TOKEN environment variable is required")?;
        let repo = std::env::var("GITHUB_REPOSITORY")
            .context("GITHUB_REPOSITORY environment variable is required")?;
        if repo.split('/').count() != 2 {
            bail!("Invalid GITHUB_REPOSITORY: {repo}");
        }

        let pr_number = std::env::var("GITHUB_EVENT_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .and_then(|p| std::fs::read_to_string(p).ok())
            .and_then(|event| pr_number_from_event(&event));
        let sha = std::env::var("GITHUB_SHA").ok().filter(|s| !s.is_empty());

        Ok(Self {
            token,
            api_url: env_or("GITHUB_API_URL", DEFAULT_API_URL),
            server_url: env_or("GITHUB_SERVER_URL", DEFAULT_SERVER_URL),
            repo,
            pr_number,
            sha,
        })
    }

    /// Web URL of the repository, used for blob links.
    pub fn repo_url(&self) -> String {
        format!("{}/{}", self.server_url.trim_end_matches('/'), self.repo)
    }

    fn request(&self, method: &str, path: &str, accept: &str) -> ureq::Request {
        let url = format!("{}{}", self.api_url.trim_end_matches('/'), path);
        ureq::request(method, &url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", accept)
            .set("User-Agent", USER_AGENT)
            .set("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Repo-relative paths of the files changed in a pull request.
    pub fn changed_files(&self, pr_number: u64) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        struct PrFile {
            filename: String,
        }

        let mut files = Vec::new();
        let mut page = 1u32;
        loop {
            let path = format!(
                "/repos/{}/pulls/{}/files?per_page=100&page={}",
                self.repo, pr_number, page
            );
            let batch: Vec<PrFile> = self
                .request("GET", &path, "application/vnd.github+json")
                .call()
                .map_err(|e| api_error("listing PR files", e))?
                .into_json()
                .context("Failed to parse PR files JSON")?;
            let done = batch.len() < 100;
            files.extend(batch.into_iter().map(|f| f.filename));
            if done {
                break;
            }
            page += 1;
        }
        debug!(count = files.len(), pr = pr_number, "fetched changed files");
        Ok(files)
    }

    /// Fetch the unified diff for a pull request.
    pub fn fetch_diff(&self, pr_number: u64) -> Result<String> {
        info!("Fetching diff for {}/pull/{} ...", self.repo, pr_number);
        let path = format!("/repos/{}/pulls/{}", self.repo, pr_number);
        self.request("GET", &path, "application/vnd.github.v3.diff")
            .call()
            .map_err(|e| api_error("fetching PR diff", e))?
            .into_string()
            .context("Failed to read PR diff response body")
    }

    /// Find an existing comment whose body starts with `marker`.
    pub fn find_existing_comment(&self, pr_number: u64, marker: &str) -> Result<Option<u64>> {
        #[derive(Deserialize)]
        struct Comment {
            id: u64,
            body: Option<String>,
        }

        let mut page = 1u32;
        loop {
            let path = format!(
                "/repos/{}/issues/{}/comments?per_page=100&page={}",
                self.repo, pr_number, page
            );
            let comments: Vec<Comment> = self
                .request("GET", &path, "application/vnd.github+json")
                .call()
                .map_err(|e| api_error("listing PR comments", e))?
                .into_json()
                .context("Failed to parse comments JSON")?;
            if comments.is_empty() {
                return Ok(None);
            }
            for c in &comments {
                if c.body.as_deref().is_some_and(|b| b.starts_with(marker)) {
                    return Ok(Some(c.id));
                }
            }
            page += 1;
        }
    }

    /// Create the coverage comment, or update it in place if one exists.
    pub fn post_comment(&self, pr_number: u64, marker: &str, body: &str) -> Result<()> {
        let payload = serde_json::json!({ "body": body });
        match self.find_existing_comment(pr_number, marker)? {
            Some(comment_id) => {
                info!("Updating existing comment (ID: {comment_id})");
                let path = format!("/repos/{}/issues/comments/{}", self.repo, comment_id);
                self.request("PATCH", &path, "application/vnd.github+json")
                    .send_json(payload)
                    .map_err(|e| api_error("updating comment", e))?;
            }
            None => {
                info!("Creating new comment");
                let path = format!("/repos/{}/issues/{}/comments", self.repo, pr_number);
                self.request("POST", &path, "application/vnd.github+json")
                    .send_json(payload)
                    .map_err(|e| api_error("creating comment", e))?;
            }
        }
        info!("Comment posted to {}/pull/{}", self.repo, pr_number);
        Ok(())
    }

    /// Set a commit status on `sha`.
    pub fn set_commit_status(&self, sha: &str, status: &CommitStatus, context: &str) -> Result<()> {
        let path = format!("/repos/{}/statuses/{}", self.repo, sha);
        self.request("POST", &path, "application/vnd.github+json")
            .send_json(serde_json::json!({
                "state": status.state.as_str(),
                "description": status.description,
                "context": context,
            }))
            .map_err(|e| api_error("setting commit status", e))?;
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn api_error(action: &str, err: ureq::Error) -> anyhow::Error {
    match err {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            anyhow::anyhow!("GitHub API error {action} (HTTP {code}): {body}")
        }
        other => anyhow::anyhow!("Failed {action}: {other}"),
    }
}

/// Extract the PR number from a GitHub event payload.
///
/// `pull_request` events carry `pull_request.number`; `issue_comment` and
/// similar events carry a top-level `number`.
pub fn pr_number_from_event(event_json: &str) -> Option<u64> {
    let event: serde_json::Value = serde_json::from_str(event_json).ok()?;
    event
        .pointer("/pull_request/number")
        .or_else(|| event.get("number"))
        .and_then(serde_json::Value::as_u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Success,
    Failure,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Success => "success",
            CommitState::Failure => "failure",
        }
    }
}

/// Commit status derived from overall coverage and a minimum threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitStatus {
    pub state: CommitState,
    pub description: String,
}

impl CommitStatus {
    /// A threshold of zero or less disables the check.
    pub fn from_coverage(coverage: f64, threshold: f64) -> Self {
        if threshold > 0.0 && coverage < threshold {
            Self {
                state: CommitState::Failure,
                description: format!("{coverage:.2}% coverage (minimum: {threshold:.2}%)"),
            }
        } else {
            Self {
                state: CommitState::Success,
                description: format!("{coverage:.2}% coverage"),
            }
        }
    }
}
