use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use prcov::cli::{self, FormatArg};
use prcov::compare::compare;
use prcov::diff::{GitDiff, GitHubDiff};
use prcov::github::{self, CommitState, CommitStatus};
use prcov::render::{self, CommentOptions, ShowFiles, COMMENT_MARKER};

const STATUS_CONTEXT: &str = "prcov";

/// prcov: post a coverage report from LCOV or Cobertura files as a pull
/// request comment, with an optional comparison against a base report.
#[derive(Parser)]
#[command(name = "prcov", version, about)]
struct Cli {
    /// Path to the coverage report (auto-located when omitted).
    #[arg(long)]
    coverage_file: Option<PathBuf>,

    /// Coverage report of the base branch to compare against.
    #[arg(long)]
    base_coverage_file: Option<PathBuf>,

    /// Coverage format.
    #[arg(long, value_enum, default_value = "auto")]
    format: FormatArg,

    /// Files to list: all, changed, threshold:N or worst:N.
    #[arg(long, default_value = "changed")]
    show_files: ShowFiles,

    /// Minimum coverage percentage for a passing status (0 disables).
    #[arg(long, default_value_t = 0.0)]
    threshold: f64,

    /// Comment title.
    #[arg(long, default_value = "Coverage Report")]
    title: String,

    /// Name of the base branch shown in the coverage diff.
    #[arg(long, default_value = "main")]
    base_branch: String,

    /// Emit workflow-command annotations for uncovered added lines. With
    /// --dry-run the diff comes from `git diff origin/<base-branch>...HEAD`.
    #[arg(long)]
    annotate: bool,

    /// Print the comment to stdout instead of calling the GitHub API.
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging.
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether coverage met the threshold.
fn run(cli: &Cli) -> Result<bool> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let (head, _) = cli::load_head(cli.coverage_file.as_deref(), &cwd, cli.format)?;
    let base = cli::load_base(cli.base_coverage_file.as_deref(), cli.format);

    let gh = if cli.dry_run {
        None
    } else {
        Some(github::Context::from_env()?)
    };
    let pr_number = gh.as_ref().and_then(|g| g.pr_number);

    let mut changed_files = Vec::new();
    if let (Some(gh), Some(pr), ShowFiles::Changed) = (&gh, pr_number, cli.show_files) {
        match gh.changed_files(pr) {
            Ok(files) => changed_files = files,
            Err(e) => warn!("Failed to get changed files: {e:#}"),
        }
    }

    let comparison = compare(Some(head), base, &changed_files);
    let opts = CommentOptions {
        title: cli.title.clone(),
        show_files: cli.show_files,
        repo_url: gh.as_ref().map(github::Context::repo_url),
        sha: gh.as_ref().and_then(|g| g.sha.clone()),
        pr_number,
        base_branch: cli.base_branch.clone(),
    };
    let body = render::format_comment(&comparison, &opts);

    let Some(head) = comparison.head.as_ref() else {
        anyhow::bail!("No head coverage report");
    };
    let status = CommitStatus::from_coverage(head.coverage, cli.threshold);

    match &gh {
        None => print!("{body}"),
        Some(gh) => publish(gh, pr_number, &body, &status)?,
    }

    if cli.annotate {
        let commands = match (&gh, pr_number) {
            (None, _) => Some(cli::cmd_annotate(
                head,
                &GitDiff {
                    args: format!("origin/{}...HEAD", cli.base_branch),
                },
            )),
            (Some(context), Some(pr_number)) => Some(cli::cmd_annotate(
                head,
                &GitHubDiff {
                    context,
                    pr_number,
                },
            )),
            (Some(_), None) => {
                info!("No PR number found, skipping annotations");
                None
            }
        };
        match commands {
            Some(Ok(commands)) => print!("{commands}"),
            Some(Err(e)) => warn!("Failed to annotate: {e:#}"),
            None => {}
        }
    }

    eprint!("{}", cli::cmd_summary(&comparison));

    if let Some(output) = std::env::var_os("GITHUB_OUTPUT").filter(|v| !v.is_empty()) {
        if let Err(e) = cli::write_step_outputs(Path::new(&output), head) {
            warn!("Failed to write step outputs: {e:#}");
        }
    }

    if status.state == CommitState::Failure {
        eprintln!(
            "Coverage {:.2}% is below threshold {:.2}%",
            head.coverage, cli.threshold
        );
        return Ok(false);
    }
    Ok(true)
}

fn publish(
    gh: &github::Context,
    pr_number: Option<u64>,
    body: &str,
    status: &CommitStatus,
) -> Result<()> {
    match pr_number {
        Some(pr) => gh
            .post_comment(pr, COMMENT_MARKER, body)
            .context("Failed to post comment")?,
        None => info!("No PR number found, skipping comment"),
    }

    if let Some(sha) = &gh.sha {
        match gh.set_commit_status(sha, status, STATUS_CONTEXT) {
            Ok(()) => info!(
                "Commit status set: {} - {}",
                status.state.as_str(),
                status.description
            ),
            Err(e) => warn!("Failed to set commit status: {e:#}"),
        }
    }
    Ok(())
}
