//! seam for the external editor-open collaborator.

use std::path::PathBuf;

use diffview_error::ToolError;

/// An already-validated absolute path, optionally with a 1-based line to
/// jump to. Targets are produced by the pipeline's path resolution; the
/// opener must never re-validate or reinterpret them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorTarget {
    pub path: PathBuf,
    pub line: Option<u32>,
}

pub trait EditorOpener: Send + Sync {
    fn open(&self, targets: &[EditorTarget], reuse_window: bool) -> Result<(), ToolError>;
}
