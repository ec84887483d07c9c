use std::path::Path;
use std::sync::Arc;

use tracing::info;

use diffview_error::ToolError;
use diffview_git::{DiffExecutor, DiffRequest, DiffResult, RepositoryLocator};
use diffview_path::PathResolver;
use diffview_server::{ContentStore, StoredEntry};

use crate::editor::{EditorOpener, EditorTarget};
use crate::render::{DiffRenderer, RenderOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDiff {
    pub id: String,
    pub url_path: String,
}

/// Wires the diff components together: repository detection, diff
/// execution, rendering, and publication into the content store. Every
/// collaborator is constructor-injected; there is no global state.
pub struct DiffPipeline {
    locator: RepositoryLocator,
    executor: DiffExecutor,
    resolver: PathResolver,
    renderer: Arc<dyn DiffRenderer>,
    store: Arc<ContentStore>,
    render_options: RenderOptions,
}

impl DiffPipeline {
    pub fn new(
        locator: RepositoryLocator,
        executor: DiffExecutor,
        resolver: PathResolver,
        renderer: Arc<dyn DiffRenderer>,
        store: Arc<ContentStore>,
    ) -> Self {
        Self {
            locator,
            executor,
            resolver,
            renderer,
            store,
            render_options: RenderOptions::default(),
        }
    }

    pub fn with_render_options(mut self, render_options: RenderOptions) -> Self {
        self.render_options = render_options;
        self
    }

    /// Detects the repository around `working_dir`, runs the diff, and
    /// parses it into a structured result.
    pub async fn generate(
        &self,
        working_dir: &Path,
        request: &DiffRequest,
    ) -> Result<DiffResult, ToolError> {
        let repository = self.locator.detect(working_dir).await?;
        let result = self.executor.execute(&repository, request).await?;

        info!(
            diff_type = %result.diff_type,
            files = result.stats.files_changed,
            additions = result.stats.additions,
            deletions = result.stats.deletions,
            "generated diff"
        );

        Ok(result)
    }

    /// Renders a diff and stores the document, returning the opaque id
    /// and URL path the caller can hand to a browser.
    pub async fn publish(&self, diff: &DiffResult) -> PublishedDiff {
        let html = self.renderer.render(diff, &self.render_options);
        let filename = format!("diff-{}.html", diff.diff_type);
        let StoredEntry { id, url_path } = self.store.put(html, filename).await;

        PublishedDiff { id, url_path }
    }

    /// Validates paths for the editor collaborator. The opener receives
    /// absolute, access-checked targets and performs no validation of its
    /// own.
    pub async fn resolve_for_editor(
        &self,
        paths: &[String],
        line: Option<u32>,
    ) -> Result<Vec<EditorTarget>, ToolError> {
        let mut targets = Vec::with_capacity(paths.len());
        for path in paths {
            let resolved = self.resolver.resolve(path).await?;
            targets.push(EditorTarget {
                path: resolved,
                line,
            });
        }

        Ok(targets)
    }

    pub async fn open_in_editor(
        &self,
        opener: &dyn EditorOpener,
        paths: &[String],
        line: Option<u32>,
        reuse_window: bool,
    ) -> Result<(), ToolError> {
        let targets = self.resolve_for_editor(paths, line).await?;
        opener.open(&targets, reuse_window)
    }
}
