//! command execution abstractions for git subprocesses.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

const MAX_STDERR_BYTES: usize = 10 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

/// Builds a `git` invocation with an explicit argument array and the
/// hardened environment. Never goes through a shell.
pub fn git_spec<I, S>(cwd: &Path, args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandSpec {
        program: "git".to_string(),
        args: args.into_iter().map(Into::into).collect(),
        cwd: Some(cwd.to_path_buf()),
        env: hardened_env(),
    }
}

fn hardened_env() -> Vec<(String, String)> {
    vec![
        ("GIT_TERMINAL_PROMPT".to_string(), "0".to_string()),
        ("GIT_PAGER".to_string(), "cat".to_string()),
    ]
}

/// Hard bounds applied to every subprocess run. Exceeding either limit
/// fails the request instead of hanging or silently truncating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_output_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out after {timeout:?} while running `{program}`")]
    Timeout { program: String, timeout: Duration },
    #[error("output of `{program}` exceeded {limit} bytes")]
    OutputLimit { program: String, limit: usize },
    #[error("failed waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CommandRunner;

impl CommandRunner {
    pub async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.run_with_limits(spec, Limits::default()).await
    }

    pub async fn run_with_limits(
        &self,
        spec: &CommandSpec,
        limits: Limits,
    ) -> Result<CommandOutput, CommandError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(name, value)| (name, value)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A caller that abandons the request drops this future, which
            // kills the child instead of leaving it running.
            .kill_on_drop(true);

        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| CommandError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let collected = tokio::time::timeout(
            limits.timeout,
            collect_output(spec, &mut child, limits.max_output_bytes),
        )
        .await;

        match collected {
            Ok(result) => result,
            Err(_) => {
                let _ = child.start_kill();
                Err(CommandError::Timeout {
                    program: spec.program.clone(),
                    timeout: limits.timeout,
                })
            }
        }
    }
}

async fn collect_output(
    spec: &CommandSpec,
    child: &mut Child,
    max_output_bytes: usize,
) -> Result<CommandOutput, CommandError> {
    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| pipe_error(spec, "stdout was not piped for child process"))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| pipe_error(spec, "stderr was not piped for child process"))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut stdout_buf = [0u8; 8192];
    let mut stderr_buf = [0u8; 8192];

    while stdout_open || stderr_open {
        tokio::select! {
            read = stdout_pipe.read(&mut stdout_buf), if stdout_open => {
                let read = read.map_err(|source| wait_error(spec, source))?;
                if read == 0 {
                    stdout_open = false;
                } else {
                    stdout.extend_from_slice(&stdout_buf[..read]);
                    if stdout.len() > max_output_bytes {
                        let _ = child.start_kill();
                        return Err(CommandError::OutputLimit {
                            program: spec.program.clone(),
                            limit: max_output_bytes,
                        });
                    }
                }
            }
            read = stderr_pipe.read(&mut stderr_buf), if stderr_open => {
                let read = read.map_err(|source| wait_error(spec, source))?;
                if read == 0 {
                    stderr_open = false;
                } else if stderr.len() < MAX_STDERR_BYTES {
                    stderr.extend_from_slice(&stderr_buf[..read]);
                    stderr.truncate(MAX_STDERR_BYTES);
                }
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|source| wait_error(spec, source))?;

    Ok(CommandOutput {
        status_code: status.code(),
        stdout,
        stderr,
    })
}

fn pipe_error(spec: &CommandSpec, message: &str) -> CommandError {
    wait_error(
        spec,
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, message),
    )
}

fn wait_error(spec: &CommandSpec, source: std::io::Error) -> CommandError {
    CommandError::Wait {
        program: spec.program.clone(),
        source,
    }
}
