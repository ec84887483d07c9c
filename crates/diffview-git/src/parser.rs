//! parsers for git diff textual output.
//!
//! `parse_stats` consumes `--numstat --summary` output and is the single
//! source of truth for per-file statistics and statuses. `parse_unified`
//! reconstructs hunks from a raw diff body and only ever populates
//! `chunks`; it never contributes to statistics, so the two views cannot
//! disagree about numbers.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
            FileStatus::Renamed => "renamed",
            FileStatus::Copied => "copied",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffChunk {
    pub old_start: u64,
    pub old_lines: u64,
    pub new_start: u64,
    pub new_lines: u64,
    pub header: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
    pub chunks: Vec<DiffChunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffTotals {
    pub files_changed: u64,
    pub additions: u64,
    pub deletions: u64,
}

/// Parses `git diff --numstat --summary` output. Numstat lines carry the
/// line counts (`-` columns mark binary files and count as zero); the
/// summary section refines file statuses. Totals are accumulated from the
/// same records, so they always match the per-file sums.
pub fn parse_stats(output: &str) -> (Vec<FileDiff>, DiffTotals) {
    let mut files: Vec<FileDiff> = Vec::new();

    for line in output.lines() {
        let Some((additions, deletions, path_field)) = split_numstat_line(line) else {
            continue;
        };

        let (path, old_path) = fold_rename_arrow(path_field);
        files.push(FileDiff {
            path,
            old_path,
            status: FileStatus::Modified,
            additions,
            deletions,
            chunks: Vec::new(),
        });
    }

    for line in output.lines() {
        apply_summary_line(&mut files, line);
    }

    let totals = DiffTotals {
        files_changed: files.len() as u64,
        additions: files.iter().map(|file| file.additions).sum(),
        deletions: files.iter().map(|file| file.deletions).sum(),
    };

    (files, totals)
}

fn split_numstat_line(line: &str) -> Option<(u64, u64, &str)> {
    let mut columns = line.splitn(3, '\t');
    let additions = parse_numstat_value(columns.next()?)?;
    let deletions = parse_numstat_value(columns.next()?)?;
    let path = columns.next()?;
    if path.is_empty() {
        return None;
    }

    Some((additions, deletions, path))
}

fn parse_numstat_value(value: &str) -> Option<u64> {
    if value == "-" {
        return Some(0);
    }

    value.parse::<u64>().ok()
}

/// Folds git's rename notation into plain old/new paths. Handles both the
/// whole-path form `old.rs => new.rs` and the braced form
/// `src/{old.rs => new.rs}` with shared prefix and suffix.
fn fold_rename_arrow(path_field: &str) -> (String, Option<String>) {
    if let (Some(open), Some(close)) = (path_field.find('{'), path_field.rfind('}')) {
        if open < close {
            let prefix = &path_field[..open];
            let suffix = &path_field[close + 1..];
            if let Some((old_part, new_part)) = path_field[open + 1..close].split_once(" => ") {
                let old = normalize_folded(&format!("{prefix}{old_part}{suffix}"));
                let new = normalize_folded(&format!("{prefix}{new_part}{suffix}"));
                return (new, Some(old));
            }
        }
    }

    if let Some((old, new)) = path_field.split_once(" => ") {
        return (new.to_string(), Some(old.to_string()));
    }

    (path_field.to_string(), None)
}

/// An empty brace side (`src/{ => sub}/x.rs`) leaves a doubled separator
/// behind; collapse it.
fn normalize_folded(path: &str) -> String {
    path.replace("//", "/")
}

fn apply_summary_line(files: &mut [FileDiff], line: &str) {
    let trimmed = line.trim_start();

    if let Some(rest) = trimmed.strip_prefix("create mode ") {
        if let Some(path) = rest.split_once(' ').map(|(_, path)| path) {
            set_status(files, path, FileStatus::Added);
        }
    } else if let Some(rest) = trimmed.strip_prefix("delete mode ") {
        if let Some(path) = rest.split_once(' ').map(|(_, path)| path) {
            set_status(files, path, FileStatus::Deleted);
        }
    } else if let Some(rest) = trimmed.strip_prefix("rename ") {
        let spec = strip_similarity_suffix(rest);
        let (new, old) = match fold_rename_arrow(spec) {
            (new, Some(old)) => (new, old),
            _ => return,
        };
        if let Some(file) = files.iter_mut().find(|file| file.path == new) {
            file.status = FileStatus::Renamed;
            file.old_path = Some(old);
        }
    } else if let Some(rest) = trimmed.strip_prefix("copy ") {
        let spec = strip_similarity_suffix(rest);
        if let (new, Some(old)) = fold_rename_arrow(spec) {
            if let Some(file) = files.iter_mut().find(|file| file.path == new) {
                file.status = FileStatus::Copied;
                file.old_path = Some(old);
            }
        }
    }
}

fn set_status(files: &mut [FileDiff], path: &str, status: FileStatus) {
    if let Some(file) = files.iter_mut().find(|file| file.path == path) {
        file.status = status;
    }
}

fn strip_similarity_suffix(spec: &str) -> &str {
    match spec.rfind(" (") {
        Some(index) if spec.ends_with("%)") => &spec[..index],
        _ => spec,
    }
}

/// Full-hunk parse of a raw unified diff body. Only used when a caller
/// asks for structured chunks.
pub fn parse_unified(raw: &str) -> Vec<FileDiff> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current_file: Option<FileDiff> = None;
    let mut current_chunk: Option<DiffChunk> = None;

    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            flush(&mut files, &mut current_file, &mut current_chunk);

            let (old_path, path) = parse_git_header_paths(rest);
            current_file = Some(FileDiff {
                path,
                old_path: if old_path.is_empty() {
                    None
                } else {
                    Some(old_path)
                },
                status: FileStatus::Modified,
                additions: 0,
                deletions: 0,
                chunks: Vec::new(),
            });
            continue;
        }

        let Some(file) = current_file.as_mut() else {
            continue;
        };

        if line.starts_with("new file mode ") {
            file.status = FileStatus::Added;
        } else if line.starts_with("deleted file mode ") {
            file.status = FileStatus::Deleted;
        } else if let Some(old) = line.strip_prefix("rename from ") {
            file.status = FileStatus::Renamed;
            file.old_path = Some(old.to_string());
        } else if let Some(new) = line.strip_prefix("rename to ") {
            file.path = new.to_string();
        } else if let Some(old) = line.strip_prefix("copy from ") {
            file.status = FileStatus::Copied;
            file.old_path = Some(old.to_string());
        } else if let Some(new) = line.strip_prefix("copy to ") {
            file.path = new.to_string();
        } else if line.starts_with("@@") {
            if let Some(chunk) = current_chunk.take() {
                file.chunks.push(chunk);
            }
            current_chunk = parse_chunk_header(line);
        } else if let Some(chunk) = &mut current_chunk {
            match line.as_bytes().first() {
                Some(b' ') => append_chunk_line(chunk, line),
                Some(b'+') if !line.starts_with("+++") => {
                    file.additions += 1;
                    append_chunk_line(chunk, line);
                }
                Some(b'-') if !line.starts_with("---") => {
                    file.deletions += 1;
                    append_chunk_line(chunk, line);
                }
                _ => {}
            }
        }
    }

    flush(&mut files, &mut current_file, &mut current_chunk);

    files
}

fn append_chunk_line(chunk: &mut DiffChunk, line: &str) {
    chunk.content.push_str(line);
    chunk.content.push('\n');
}

fn flush(
    files: &mut Vec<FileDiff>,
    current_file: &mut Option<FileDiff>,
    current_chunk: &mut Option<DiffChunk>,
) {
    if let Some(mut file) = current_file.take() {
        if let Some(chunk) = current_chunk.take() {
            file.chunks.push(chunk);
        }
        files.push(file);
    }
}

/// `diff --git` headers carry both sides of the file pair, either as
/// `a/path b/path` or, under `--no-prefix`, as `path path`.
fn parse_git_header_paths(rest: &str) -> (String, String) {
    let mut parts = rest.split_whitespace();
    let old = parts.next().unwrap_or_default();
    let new = parts.next().unwrap_or(old);

    let old = old.strip_prefix("a/").unwrap_or(old);
    let new = new.strip_prefix("b/").unwrap_or(new);

    if old == new {
        (String::new(), new.to_string())
    } else {
        (old.to_string(), new.to_string())
    }
}

fn parse_chunk_header(line: &str) -> Option<DiffChunk> {
    let rest = line.strip_prefix("@@ ")?;
    let (ranges, trailer) = rest.split_once(" @@")?;

    let mut parts = ranges.split(' ');
    let (old_start, old_lines) = parse_range(parts.next()?.strip_prefix('-')?)?;
    let (new_start, new_lines) = parse_range(parts.next()?.strip_prefix('+')?)?;

    let header = trailer.strip_prefix(' ').unwrap_or(trailer).to_string();

    Some(DiffChunk {
        old_start,
        old_lines,
        new_start,
        new_lines,
        header,
        content: String::new(),
    })
}

fn parse_range(range: &str) -> Option<(u64, u64)> {
    match range.split_once(',') {
        Some((start, lines)) => Some((start.parse().ok()?, lines.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}
