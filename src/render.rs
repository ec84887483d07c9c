//! seam for the external diff-to-HTML renderer.

use diffview_git::DiffResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    SideBySide,
    LineByLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Light,
    Dark,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineMatching {
    Lines,
    Words,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub output_format: OutputFormat,
    pub color_scheme: ColorScheme,
    pub matching: LineMatching,
    pub draw_file_list: bool,
    pub highlight: bool,
    pub synchronised_scroll: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::SideBySide,
            color_scheme: ColorScheme::Auto,
            matching: LineMatching::Lines,
            draw_file_list: true,
            highlight: true,
            synchronised_scroll: true,
        }
    }
}

/// Turns a diff into an HTML document. The real implementation lives in
/// the embedding tool; the pipeline only hands over the raw unified diff
/// text plus repository metadata and never re-parses the result.
pub trait DiffRenderer: Send + Sync {
    fn render(&self, diff: &DiffResult, options: &RenderOptions) -> String;
}

/// Minimal built-in renderer: the raw diff wrapped in a preformatted
/// page. Used by the standalone binary and by tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreformattedRenderer;

impl DiffRenderer for PreformattedRenderer {
    fn render(&self, diff: &DiffResult, _options: &RenderOptions) -> String {
        let title = format!(
            "{} diff — {}",
            diff.diff_type, diff.repository.current_branch
        );

        format!(
            "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n\
             <body>\n<h1>{}</h1>\n<p>{} files changed, +{} −{}</p>\n<pre>{}</pre>\n</body>\n</html>\n",
            escape_html(&title),
            escape_html(&title),
            diff.stats.files_changed,
            diff.stats.additions,
            diff.stats.deletions,
            escape_html(&diff.raw),
        )
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use diffview_git::{DiffResult, DiffTotals, DiffType, Repository};

    use super::{escape_html, DiffRenderer, PreformattedRenderer, RenderOptions};

    #[test]
    fn escapes_html_metacharacters() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
    }

    #[test]
    fn renders_raw_diff_into_a_preformatted_page() {
        let diff = DiffResult {
            repository: Repository {
                git_root: PathBuf::from("/work/project"),
                current_branch: "main".to_string(),
                has_remote: false,
                remote_name: None,
                remote_url: None,
                working_directory: PathBuf::from("/work/project"),
            },
            diff_type: DiffType::Staged,
            target: None,
            files: Vec::new(),
            stats: DiffTotals {
                files_changed: 1,
                additions: 3,
                deletions: 1,
            },
            raw: "diff --git a b\n+added <line>\n".to_string(),
        };

        let html = PreformattedRenderer.render(&diff, &RenderOptions::default());

        assert!(html.contains("staged diff — main"));
        assert!(html.contains("1 files changed, +3 −1"));
        assert!(html.contains("+added &lt;line&gt;"));
    }
}
