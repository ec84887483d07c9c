//! repository detection and metadata lookup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use diffview_error::ToolError;

use crate::command::{git_spec, CommandError, CommandRunner, Limits};

/// Snapshot of the repository a request runs against. Built fresh per
/// request; branch and remotes may change between calls, so it is never
/// cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub git_root: PathBuf,
    pub current_branch: String,
    pub has_remote: bool,
    pub remote_name: Option<String>,
    pub remote_url: Option<String>,
    pub working_directory: PathBuf,
}

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("`{path}` is not inside a git repository")]
    NotARepository { path: PathBuf },
    #[error("directory `{path}` does not exist")]
    DirectoryNotFound { path: PathBuf },
    #[error("failed to determine repository root for `{path}`: {reason}")]
    RootLookupFailed { path: PathBuf, reason: String },
    #[error("failed to determine current branch: {reason}")]
    BranchLookupFailed { reason: String },
}

impl LocateError {
    pub fn code(&self) -> &'static str {
        match self {
            LocateError::NotARepository { .. } => "NOT_A_REPOSITORY",
            LocateError::DirectoryNotFound { .. } => "DIRECTORY_NOT_FOUND",
            LocateError::RootLookupFailed { .. } => "ROOT_LOOKUP_FAILED",
            LocateError::BranchLookupFailed { .. } => "BRANCH_LOOKUP_FAILED",
        }
    }
}

impl From<LocateError> for ToolError {
    fn from(error: LocateError) -> Self {
        ToolError::git_operation(error.code(), error.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryLocator {
    runner: CommandRunner,
    limits: Limits,
}

impl Default for RepositoryLocator {
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(10))
    }
}

impl RepositoryLocator {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            runner: CommandRunner,
            limits: Limits {
                timeout,
                ..Limits::default()
            },
        }
    }

    pub async fn detect(&self, path: impl AsRef<Path>) -> Result<Repository, LocateError> {
        let path = path.as_ref();

        if tokio::fs::metadata(path).await.is_err() {
            return Err(LocateError::DirectoryNotFound {
                path: path.to_path_buf(),
            });
        }

        let git_root = self.git_root(path).await?;
        let current_branch = self.current_branch(&git_root).await?;
        let (has_remote, remote_name, remote_url) = self.first_remote(&git_root).await;

        Ok(Repository {
            git_root,
            current_branch,
            has_remote,
            remote_name,
            remote_url,
            working_directory: path.to_path_buf(),
        })
    }

    async fn git_root(&self, path: &Path) -> Result<PathBuf, LocateError> {
        let spec = git_spec(path, ["rev-parse", "--show-toplevel"]);
        let output = self
            .runner
            .run_with_limits(&spec, self.limits)
            .await
            .map_err(|err| root_lookup_failure(path, err))?;

        if output.status_code != Some(0) {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if stderr.to_ascii_lowercase().contains("not a git repository") {
                return Err(LocateError::NotARepository {
                    path: path.to_path_buf(),
                });
            }

            return Err(LocateError::RootLookupFailed {
                path: path.to_path_buf(),
                reason: stderr.trim().to_string(),
            });
        }

        Ok(PathBuf::from(trimmed_stdout(&output.stdout)))
    }

    async fn current_branch(&self, git_root: &Path) -> Result<String, LocateError> {
        let branch = self
            .git_stdout(git_root, ["rev-parse", "--abbrev-ref", "HEAD"])
            .await?;

        // `HEAD` here is the detached-state sentinel, not a branch name.
        if branch != "HEAD" {
            return Ok(branch);
        }

        let short_hash = self
            .git_stdout(git_root, ["rev-parse", "--short", "HEAD"])
            .await?;

        Ok(format!("detached-{short_hash}"))
    }

    /// Missing remotes are an expected state, so every failure here
    /// degrades to `has_remote = false` instead of failing the request.
    async fn first_remote(&self, git_root: &Path) -> (bool, Option<String>, Option<String>) {
        let remotes = match self.git_stdout(git_root, ["remote"]).await {
            Ok(remotes) => remotes,
            Err(err) => {
                debug!(error = %err, "remote enumeration failed");
                return (false, None, None);
            }
        };

        let Some(name) = remotes.lines().next().map(str::to_string) else {
            return (false, None, None);
        };
        if name.is_empty() {
            return (false, None, None);
        }

        let url = self
            .git_stdout(git_root, ["remote", "get-url", name.as_str()])
            .await
            .ok();

        (true, Some(name), url)
    }

    async fn git_stdout<const N: usize>(
        &self,
        git_root: &Path,
        args: [&str; N],
    ) -> Result<String, LocateError> {
        let spec = git_spec(git_root, args);
        let output = self
            .runner
            .run_with_limits(&spec, self.limits)
            .await
            .map_err(|err| LocateError::BranchLookupFailed {
                reason: err.to_string(),
            })?;

        if output.status_code != Some(0) {
            return Err(LocateError::BranchLookupFailed {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(trimmed_stdout(&output.stdout))
    }
}

fn root_lookup_failure(path: &Path, err: CommandError) -> LocateError {
    match err {
        CommandError::Spawn { ref source, .. }
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            LocateError::DirectoryNotFound {
                path: path.to_path_buf(),
            }
        }
        other => LocateError::RootLookupFailed {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn trimmed_stdout(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}
