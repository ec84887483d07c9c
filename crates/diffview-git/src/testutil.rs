//! shared git fixtures for this crate's tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct TempGitRepo {
    path: PathBuf,
}

impl TempGitRepo {
    /// Initializes a repository on branch `main` with one commit.
    pub fn new() -> Self {
        let repo = Self::plain_dir();

        repo.git(&["init", "--quiet"]);
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        repo.git(&["config", "user.name", "Diffview Tests"]);
        repo.git(&["config", "user.email", "diffview-tests@example.com"]);

        repo.write("README.md", "test repository\n");
        repo.git(&["add", "README.md"]);
        repo.git(&["commit", "--quiet", "-m", "initial commit"]);

        repo
    }

    /// Creates the temp directory without initializing git.
    pub fn plain_dir() -> Self {
        let path = unique_path();
        fs::create_dir_all(&path).expect("temp repo directory should be creatable");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, name: &str, content: &str) {
        fs::write(self.path.join(name), content).expect("fixture file should be writable");
    }

    pub fn git(&self, args: &[&str]) {
        let output = self.git_output(args);

        assert!(
            output.status.success(),
            "git command failed: git -C {} {}\nstdout: {}\nstderr: {}",
            self.path.display(),
            args.join(" "),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    pub fn git_stdout(&self, args: &[&str]) -> String {
        let output = self.git_output(args);

        assert!(
            output.status.success(),
            "git command failed: git -C {} {}\nstderr: {}",
            self.path.display(),
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );

        String::from_utf8(output.stdout)
            .expect("git stdout should be UTF-8")
            .trim_end_matches(['\n', '\r'])
            .to_string()
    }

    fn git_output(&self, args: &[&str]) -> Output {
        Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(args)
            .output()
            .expect("git command should execute")
    }
}

impl Drop for TempGitRepo {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn unique_path() -> PathBuf {
    static NEXT_ID: AtomicU64 = AtomicU64::new(0);
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

    std::env::temp_dir().join(format!("diffview-git-tests-{}-{id}", std::process::id()))
}
