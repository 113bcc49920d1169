//! Line-based storage of text filters.
//!
//! One filter per line. The first character carries the anchor: `^` for the
//! start of a word, `$` for the end of a word. An anywhere phrase that itself
//! begins with a marker, `#` or `\` is written behind a `\` escape. Blank
//! lines and lines starting with `#` are skipped. Inverse and temporary
//! filters are never written.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use super::text::{Anchor, FilterError, TextFilter};

const AT_START_MARKER: char = '^';
const AT_END_MARKER: char = '$';
const ESCAPE: char = '\\';
const COMMENT: char = '#';

const FILE_HEADER: &str = "# newsblob filters: ^phrase = word start, $phrase = word end, \\phrase = literal\n";

/// Encodes a filter, or `None` if it must not be persisted.
pub fn encode(filter: &TextFilter) -> Option<String> {
    if filter.is_inverse() || filter.is_temporary() {
        return None;
    }
    let phrase = filter.phrase();
    Some(match filter.anchor() {
        Anchor::Anywhere if needs_escape(phrase) => format!("{ESCAPE}{phrase}"),
        Anchor::Anywhere => phrase.to_string(),
        Anchor::AtStart => format!("{AT_START_MARKER}{phrase}"),
        Anchor::AtEnd => format!("{AT_END_MARKER}{phrase}"),
    })
}

fn needs_escape(phrase: &str) -> bool {
    phrase.starts_with([AT_START_MARKER, AT_END_MARKER, ESCAPE, COMMENT])
}

/// Decodes one stored phrase.
pub fn decode(encoded: &str) -> Result<TextFilter, FilterError> {
    let encoded = encoded.trim();
    if let Some(phrase) = encoded.strip_prefix(ESCAPE) {
        TextFilter::new(phrase, Anchor::Anywhere)
    } else if let Some(phrase) = encoded.strip_prefix(AT_START_MARKER) {
        TextFilter::new(phrase, Anchor::AtStart)
    } else if let Some(phrase) = encoded.strip_prefix(AT_END_MARKER) {
        TextFilter::new(phrase, Anchor::AtEnd)
    } else {
        TextFilter::new(encoded, Anchor::Anywhere)
    }
}

/// Decodes a filter file's contents, skipping (and logging) bad lines.
pub fn parse_lines(content: &str) -> Vec<TextFilter> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with(COMMENT)
        })
        .filter_map(|(n, line)| match decode(line) {
            Ok(filter) => Some(filter),
            Err(e) => {
                tracing::warn!(line = n + 1, error = %e, "Skipping invalid filter line");
                None
            }
        })
        .collect()
}

/// Reads filters from `path`. A missing file means no filters.
pub fn load(path: &Path) -> Result<Vec<TextFilter>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No filter file found");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read filter file '{}'", path.display()))
        }
    };
    let filters = parse_lines(&content);
    tracing::debug!(path = %path.display(), count = filters.len(), "Loaded filters");
    Ok(filters)
}

/// Writes the persistable filters to `path` atomically (temp file, sync, rename).
pub fn save<'a>(path: &Path, filters: impl IntoIterator<Item = &'a TextFilter>) -> Result<usize> {
    use std::time::{SystemTime, UNIX_EPOCH};

    let mut content = String::from(FILE_HEADER);
    let mut written = 0;
    for line in filters.into_iter().filter_map(encode) {
        content.push_str(&line);
        content.push('\n');
        written += 1;
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory '{}'", dir.display()))?;
    }

    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| format!("Failed to create temporary file '{}'", temp_path.display()))?;

    file.write_all(content.as_bytes()).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to write filters to '{}'", temp_path.display())
    })?;
    file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to sync '{}' to disk", temp_path.display())
    })?;
    drop(file);

    std::fs::rename(&temp_path, path).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to rename '{}' to '{}'", temp_path.display(), path.display())
    })?;

    tracing::debug!(path = %path.display(), count = written, "Saved filters");
    Ok(written)
}
