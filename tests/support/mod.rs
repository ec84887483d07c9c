#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct TempRepo {
    path: PathBuf,
}

impl TempRepo {
    /// Initializes a repository on branch `main` with one commit.
    pub fn new(name: &str) -> Self {
        let repo = Self::plain_dir(name);

        repo.git(&["init", "--quiet"]);
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        repo.git(&["config", "user.name", "Diffview Integration Tests"]);
        repo.git(&["config", "user.email", "diffview-integration@example.com"]);

        repo.write("README.md", "test repository\n");
        repo.git(&["add", "README.md"]);
        repo.git(&["commit", "--quiet", "-m", "initial commit"]);

        repo
    }

    pub fn plain_dir(name: &str) -> Self {
        let id = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "diffview-it-{name}-{}-{id}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path).expect("temp directory should be creatable");

        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, file: &str, content: &str) {
        std::fs::write(self.path.join(file), content).expect("fixture file should be writable");
    }

    pub fn git(&self, args: &[&str]) {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(args)
            .output()
            .expect("git command should execute");

        assert!(
            output.status.success(),
            "git -C {} {} failed\nstdout: {}\nstderr: {}",
            self.path.display(),
            args.join(" "),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

impl Drop for TempRepo {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Minimal HTTP/1.1 GET over a raw socket; returns status code, the
/// header section, and the body.
pub async fn http_get(port: u16, path: &str) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
        .await
        .expect("server should accept connections");

    let request = format!("GET {path} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .await
        .expect("request should send");

    let mut raw = Vec::new();
    stream
        .read_to_end(&mut raw)
        .await
        .expect("response should read");

    let raw = String::from_utf8_lossy(&raw).into_owned();
    let (head, body) = raw
        .split_once("\r\n\r\n")
        .expect("response should have a header section");
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("status line should carry a code");

    (status, head.to_string(), body.to_string())
}
