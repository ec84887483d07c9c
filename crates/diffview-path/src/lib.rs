use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use diffview_error::ToolError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path contains an embedded NUL byte")]
    NullByte,
    #[error("`{name}` is a reserved device name")]
    ReservedDeviceName { name: String },
    #[error("path `{path}` escapes the workspace root via parent components")]
    DirectoryTraversal { path: String },
    #[error("path `{path}` resolves outside the workspace root")]
    OutsideWorkspace { path: String },
    #[error("path `{path}` is not accessible: {reason}")]
    NotAccessible { path: String, reason: String },
}

impl PathError {
    pub fn code(&self) -> &'static str {
        match self {
            PathError::NullByte => "NULL_BYTE",
            PathError::ReservedDeviceName { .. } => "RESERVED_DEVICE_NAME",
            PathError::DirectoryTraversal { .. } => "DIRECTORY_TRAVERSAL",
            PathError::OutsideWorkspace { .. } => "OUTSIDE_WORKSPACE",
            PathError::NotAccessible { .. } => "NOT_ACCESSIBLE",
        }
    }
}

impl From<PathError> for ToolError {
    fn from(error: PathError) -> Self {
        ToolError::validation(error.code(), error.to_string())
    }
}

/// Whether absolute input paths may bypass workspace containment. `Allow`
/// matches the behavior this tool historically shipped with; `Deny` maps
/// every absolute input to `OUTSIDE_WORKSPACE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbsolutePathPolicy {
    #[default]
    Allow,
    Deny,
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    workspace_root: PathBuf,
    policy: AbsolutePathPolicy,
}

impl PathResolver {
    pub fn new(workspace_root: impl Into<PathBuf>, policy: AbsolutePathPolicy) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            policy,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Shape-only validation. Makes no filesystem calls, so it is safe to
    /// run before any I/O and usable from synchronous contexts.
    pub fn resolve_shape(&self, input: &str) -> Result<PathBuf, PathError> {
        if input.contains('\0') {
            return Err(PathError::NullByte);
        }

        if let Some(name) = reserved_device_name(input) {
            return Err(PathError::ReservedDeviceName { name });
        }

        let path = Path::new(input);
        if path.is_absolute() {
            return match self.policy {
                AbsolutePathPolicy::Allow => Ok(path.to_path_buf()),
                AbsolutePathPolicy::Deny => Err(PathError::OutsideWorkspace {
                    path: input.to_string(),
                }),
            };
        }

        let resolved = normalize_lexically(&self.workspace_root.join(path));
        if resolved.starts_with(&self.workspace_root) {
            return Ok(resolved);
        }

        if input.split(['/', '\\']).any(|segment| segment == "..") {
            Err(PathError::DirectoryTraversal {
                path: input.to_string(),
            })
        } else {
            Err(PathError::OutsideWorkspace {
                path: input.to_string(),
            })
        }
    }

    /// Shape validation plus a read-access check on the resolved path.
    pub async fn resolve(&self, input: &str) -> Result<PathBuf, PathError> {
        let resolved = self.resolve_shape(input)?;

        match tokio::fs::metadata(&resolved).await {
            Ok(_) => Ok(resolved),
            Err(source) => Err(PathError::NotAccessible {
                path: resolved.display().to_string(),
                reason: source.to_string(),
            }),
        }
    }
}

/// Windows device names collide with real filenames once content is written
/// to disk, so they are rejected on every platform.
fn reserved_device_name(input: &str) -> Option<String> {
    let filename = input.rsplit(['/', '\\']).next().unwrap_or(input);
    let stem = filename.split('.').next().unwrap_or(filename);
    let upper = stem.to_ascii_uppercase();

    let reserved = matches!(upper.as_str(), "CON" | "PRN" | "AUX" | "NUL")
        || is_numbered_device(&upper, "COM")
        || is_numbered_device(&upper, "LPT");

    reserved.then_some(upper)
}

fn is_numbered_device(upper: &str, prefix: &str) -> bool {
    upper
        .strip_prefix(prefix)
        .and_then(|suffix| suffix.parse::<u8>().ok())
        .is_some_and(|digit| (1..=9).contains(&digit) && upper.len() == prefix.len() + 1)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(segment) => normalized.push(segment),
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::{AbsolutePathPolicy, PathError, PathResolver};

    #[test]
    fn resolves_relative_path_under_workspace_root() {
        let resolver = PathResolver::new("/work/project", AbsolutePathPolicy::Allow);

        let resolved = resolver
            .resolve_shape("src/main.rs")
            .expect("plain relative path should resolve");

        assert_eq!(resolved, PathBuf::from("/work/project/src/main.rs"));
    }

    #[test]
    fn normalizes_current_dir_components() {
        let resolver = PathResolver::new("/work/project", AbsolutePathPolicy::Allow);

        let resolved = resolver
            .resolve_shape("./src/./lib.rs")
            .expect("dot components should normalize away");

        assert_eq!(resolved, PathBuf::from("/work/project/src/lib.rs"));
    }

    #[test]
    fn allows_parent_components_that_stay_inside_the_root() {
        let resolver = PathResolver::new("/work/project", AbsolutePathPolicy::Allow);

        let resolved = resolver
            .resolve_shape("src/../docs/README.md")
            .expect("contained parent component should resolve");

        assert_eq!(resolved, PathBuf::from("/work/project/docs/README.md"));
    }

    #[test]
    fn rejects_traversal_that_escapes_the_root() {
        let resolver = PathResolver::new("/work/project", AbsolutePathPolicy::Allow);

        for input in ["../escape.txt", "src/../../../etc/passwd", "a/../../b"] {
            let err = resolver
                .resolve_shape(input)
                .expect_err("escaping traversal must be rejected");
            assert!(
                matches!(err, PathError::DirectoryTraversal { .. }),
                "{input} should be DIRECTORY_TRAVERSAL, got {err:?}"
            );
            assert_eq!(err.code(), "DIRECTORY_TRAVERSAL");
        }
    }

    #[test]
    fn rejects_embedded_nul_byte_before_anything_else() {
        let resolver = PathResolver::new("/work/project", AbsolutePathPolicy::Allow);

        let err = resolver
            .resolve_shape("src/\0/../main.rs")
            .expect_err("NUL byte must be rejected");

        assert_eq!(err, PathError::NullByte);
        assert_eq!(err.code(), "NULL_BYTE");
    }

    #[test]
    fn rejects_reserved_device_names() {
        let resolver = PathResolver::new("/work/project", AbsolutePathPolicy::Allow);

        for input in ["CON", "con.txt", "docs/NUL.md", "COM5.log", "lpt9"] {
            let err = resolver
                .resolve_shape(input)
                .expect_err("reserved device name must be rejected");
            assert!(
                matches!(err, PathError::ReservedDeviceName { .. }),
                "{input} should be RESERVED_DEVICE_NAME, got {err:?}"
            );
        }
    }

    #[test]
    fn accepts_names_that_merely_start_with_a_device_prefix() {
        let resolver = PathResolver::new("/work/project", AbsolutePathPolicy::Allow);

        for input in ["CONFIG.toml", "console.rs", "COM10.log", "LPT0", "AUXILIARY"] {
            resolver
                .resolve_shape(input)
                .unwrap_or_else(|err| panic!("{input} should be accepted, got {err:?}"));
        }
    }

    #[test]
    fn absolute_paths_pass_through_under_allow_policy() {
        let resolver = PathResolver::new("/work/project", AbsolutePathPolicy::Allow);

        let resolved = resolver
            .resolve_shape("/etc/hosts")
            .expect("absolute path should pass under Allow");

        assert_eq!(resolved, PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn absolute_paths_are_rejected_under_deny_policy() {
        let resolver = PathResolver::new("/work/project", AbsolutePathPolicy::Deny);

        let err = resolver
            .resolve_shape("/etc/hosts")
            .expect_err("absolute path must be rejected under Deny");

        assert!(matches!(err, PathError::OutsideWorkspace { .. }));
        assert_eq!(err.code(), "OUTSIDE_WORKSPACE");
    }

    #[tokio::test]
    async fn access_check_passes_for_existing_file() {
        let workspace = TempDir::new("resolver-access");
        fs::write(workspace.path().join("notes.txt"), b"notes\n")
            .expect("fixture file should be writable");
        let resolver = PathResolver::new(workspace.path(), AbsolutePathPolicy::Allow);

        let resolved = resolver
            .resolve("notes.txt")
            .await
            .expect("existing file should be accessible");

        assert_eq!(resolved, workspace.path().join("notes.txt"));
    }

    #[tokio::test]
    async fn access_check_fails_for_missing_file() {
        let workspace = TempDir::new("resolver-missing");
        let resolver = PathResolver::new(workspace.path(), AbsolutePathPolicy::Allow);

        let err = resolver
            .resolve("missing.txt")
            .await
            .expect_err("missing file must be NOT_ACCESSIBLE");

        assert!(matches!(err, PathError::NotAccessible { .. }));
        assert_eq!(err.code(), "NOT_ACCESSIBLE");
    }

    struct TempDir {
        path: PathBuf,
    }

    impl TempDir {
        fn new(prefix: &str) -> Self {
            static NEXT_ID: AtomicU64 = AtomicU64::new(0);
            let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "diffview-path-{prefix}-{}-{id}",
                std::process::id()
            ));
            fs::create_dir_all(&path).expect("temp directory should be creatable");
            Self { path }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}
