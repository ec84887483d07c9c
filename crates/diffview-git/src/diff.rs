use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use diffview_error::ToolError;

use crate::command::{git_spec, CommandError, CommandOutput, CommandRunner, Limits};
use crate::parser::{parse_stats, parse_unified, DiffTotals, FileDiff};
use crate::repository::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffType {
    Staged,
    Unstaged,
    Commit,
    CommitRange,
    Branch,
}

impl DiffType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffType::Staged => "staged",
            DiffType::Unstaged => "unstaged",
            DiffType::Commit => "commit",
            DiffType::CommitRange => "commit-range",
            DiffType::Branch => "branch",
        }
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRequest {
    pub diff_type: DiffType,
    pub base: Option<String>,
    pub target: Option<String>,
    pub paths: Vec<String>,
    pub context_lines: Option<u32>,
    pub ignore_whitespace: bool,
    pub include_chunks: bool,
}

impl DiffRequest {
    pub fn new(diff_type: DiffType) -> Self {
        Self {
            diff_type,
            base: None,
            target: None,
            paths: Vec::new(),
            context_lines: None,
            ignore_whitespace: false,
            include_chunks: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    pub repository: Repository,
    pub diff_type: DiffType,
    pub target: Option<String>,
    pub files: Vec<FileDiff>,
    pub stats: DiffTotals,
    pub raw: String,
}

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("unsafe diff path argument `{path}`: {reason}")]
    UnsafePath { path: String, reason: &'static str },
    #[error("diff path arguments must not be empty")]
    EmptyPath,
    #[error("unknown revision `{revision}`: {stderr}")]
    InvalidTarget { revision: String, stderr: String },
    #[error("ambiguous revision `{revision}`: {stderr}")]
    AmbiguousTarget { revision: String, stderr: String },
    #[error("git diff timed out after {timeout:?}")]
    Timeout { timeout: Duration },
    #[error("git diff failed: {reason}")]
    CommandFailed { reason: String },
}

impl DiffError {
    pub fn code(&self) -> &'static str {
        match self {
            DiffError::UnsafePath { .. } => "UNSAFE_PATH",
            DiffError::EmptyPath => "EMPTY_PATH",
            DiffError::InvalidTarget { .. } => "INVALID_TARGET",
            DiffError::AmbiguousTarget { .. } => "AMBIGUOUS_TARGET",
            DiffError::Timeout { .. } => "TIMEOUT",
            DiffError::CommandFailed { .. } => "DIFF_COMMAND_ERROR",
        }
    }
}

impl From<DiffError> for ToolError {
    fn from(error: DiffError) -> Self {
        ToolError::git_operation(error.code(), error.to_string())
    }
}

/// Builds the argument array for one diff invocation. All path arguments
/// are validated here, before any argv is assembled; a request that fails
/// validation never reaches the subprocess.
pub fn build_diff_args(request: &DiffRequest) -> Result<Vec<String>, DiffError> {
    let mut args = vec!["diff".to_string()];

    match request.diff_type {
        DiffType::Staged => args.push("--cached".to_string()),
        DiffType::Unstaged => {}
        DiffType::Commit => {
            let target = request.target.as_deref().unwrap_or("HEAD");
            args.push(format!("{target}~1"));
            args.push(target.to_string());
        }
        DiffType::CommitRange => {
            let base = request.base.as_deref().unwrap_or("HEAD~1");
            let target = request.target.as_deref().unwrap_or("HEAD");
            args.push(format!("{base}..{target}"));
        }
        DiffType::Branch => {
            // Three-dot form diffs against the merge base, not the tip.
            let target = request.target.as_deref().unwrap_or("main");
            args.push(format!("{target}...HEAD"));
        }
    }

    if let Some(context_lines) = request.context_lines {
        args.push(format!("-U{context_lines}"));
    }

    if request.ignore_whitespace {
        args.push("--ignore-all-space".to_string());
    }

    args.push("--no-prefix".to_string());

    if !request.paths.is_empty() {
        args.push("--".to_string());
        for path in &request.paths {
            args.push(sanitize_diff_path(path)?);
        }
    }

    Ok(args)
}

fn sanitize_diff_path(path: &str) -> Result<String, DiffError> {
    if path.is_empty() {
        return Err(DiffError::EmptyPath);
    }

    if path.contains('\0') {
        return Err(DiffError::UnsafePath {
            path: path.replace('\0', "\\0"),
            reason: "embedded NUL byte",
        });
    }

    // A leading dash would be parsed as a flag by git even after `--` is
    // forgotten somewhere downstream.
    if path.starts_with('-') {
        return Err(DiffError::UnsafePath {
            path: path.to_string(),
            reason: "leading dash",
        });
    }

    let normalized = path.replace('\\', "/");
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(DiffError::UnsafePath {
            path: path.to_string(),
            reason: "parent directory component",
        });
    }

    Ok(normalized)
}

/// Rewrites the raw-diff argv into the statistics variant: `--no-prefix`
/// is replaced by `--numstat --summary`.
fn stats_args(raw_args: &[String]) -> Vec<String> {
    let mut args = Vec::with_capacity(raw_args.len() + 1);
    for arg in raw_args {
        if arg == "--no-prefix" {
            args.push("--numstat".to_string());
            args.push("--summary".to_string());
        } else {
            args.push(arg.clone());
        }
    }

    args
}

#[derive(Debug, Clone)]
pub struct DiffExecutor {
    runner: CommandRunner,
    limits: Limits,
}

impl Default for DiffExecutor {
    fn default() -> Self {
        Self::with_limits(Limits::default())
    }
}

impl DiffExecutor {
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            runner: CommandRunner,
            limits,
        }
    }

    /// Runs two independent invocations against the repository root: the
    /// raw unified-diff body for rendering, and the `--numstat --summary`
    /// variant that provides authoritative per-file counts (numstat
    /// reports binary files correctly, which hunk scanning cannot).
    pub async fn execute(
        &self,
        repository: &Repository,
        request: &DiffRequest,
    ) -> Result<DiffResult, DiffError> {
        let raw_args = build_diff_args(request)?;
        let stats_args = stats_args(&raw_args);

        debug!(diff_type = %request.diff_type, args = ?raw_args, "running git diff");

        let raw_output = self.run_diff(repository, request, &raw_args).await?;
        let stats_output = self.run_diff(repository, request, &stats_args).await?;

        let raw = String::from_utf8_lossy(&raw_output.stdout).into_owned();
        let (mut files, stats) = parse_stats(&String::from_utf8_lossy(&stats_output.stdout));

        if request.include_chunks {
            attach_chunks(&mut files, parse_unified(&raw));
        }

        Ok(DiffResult {
            repository: repository.clone(),
            diff_type: request.diff_type,
            target: request.target.clone(),
            files,
            stats,
            raw,
        })
    }

    async fn run_diff(
        &self,
        repository: &Repository,
        request: &DiffRequest,
        args: &[String],
    ) -> Result<CommandOutput, DiffError> {
        let spec = git_spec(&repository.git_root, args.iter().map(String::as_str));
        let output = self
            .runner
            .run_with_limits(&spec, self.limits)
            .await
            .map_err(|err| match err {
                CommandError::Timeout { timeout, .. } => DiffError::Timeout { timeout },
                other => DiffError::CommandFailed {
                    reason: other.to_string(),
                },
            })?;

        if output.status_code != Some(0) {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_diff_failure(request, stderr));
        }

        Ok(output)
    }
}

fn classify_diff_failure(request: &DiffRequest, stderr: String) -> DiffError {
    let revision = revision_display(request);
    let lowered = stderr.to_ascii_lowercase();

    if lowered.contains("bad revision") {
        DiffError::InvalidTarget { revision, stderr }
    } else if lowered.contains("ambiguous argument") {
        DiffError::AmbiguousTarget { revision, stderr }
    } else if lowered.contains("unknown revision") {
        DiffError::InvalidTarget { revision, stderr }
    } else {
        DiffError::CommandFailed { reason: stderr }
    }
}

fn revision_display(request: &DiffRequest) -> String {
    match request.diff_type {
        DiffType::Staged => "--cached".to_string(),
        DiffType::Unstaged => "worktree".to_string(),
        DiffType::Commit => request.target.clone().unwrap_or_else(|| "HEAD".to_string()),
        DiffType::CommitRange => format!(
            "{}..{}",
            request.base.as_deref().unwrap_or("HEAD~1"),
            request.target.as_deref().unwrap_or("HEAD"),
        ),
        DiffType::Branch => format!(
            "{}...HEAD",
            request.target.as_deref().unwrap_or("main")
        ),
    }
}

fn attach_chunks(files: &mut [FileDiff], parsed: Vec<FileDiff>) {
    for parsed_file in parsed {
        if let Some(file) = files.iter_mut().find(|file| file.path == parsed_file.path) {
            file.chunks = parsed_file.chunks;
        }
    }
}
