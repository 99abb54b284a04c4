use std::path::{Path, PathBuf};

use coderev_core::{CoderevError, InputMode, UploadedItem};
use futures::future::try_join_all;
use uuid::Uuid;

const FILE_MARKER: &str = "// File:";
const EMPTY_FILE_PLACEHOLDER: &str = "// (empty file)";
const MANUAL_MARKER: &str = "// Manual input";

/// Flatten the active input into the single text blob sent for review.
///
/// In file mode every item becomes a `// File: <name>` block with trimmed
/// content, in upload order, separated by a blank line. In manual mode the
/// trimmed buffer gets a manual-input marker, or the result is empty when
/// there is nothing but whitespace.
///
/// # Examples
///
/// ```
/// use coderev_core::{InputMode, UploadedItem};
/// use coderev_review::input::build_reviewable_unit;
///
/// let items = vec![UploadedItem::new("a.py", "x=1")];
/// let unit = build_reviewable_unit(InputMode::File, &items, "");
/// assert_eq!(unit, "// File: a.py\nx=1");
///
/// let unit = build_reviewable_unit(InputMode::Manual, &[], "   ");
/// assert!(unit.is_empty());
/// ```
pub fn build_reviewable_unit(mode: InputMode, items: &[UploadedItem], manual_text: &str) -> String {
    match mode {
        InputMode::File => items
            .iter()
            .map(|item| {
                let content = item.content.trim();
                let body = if content.is_empty() {
                    EMPTY_FILE_PLACEHOLDER
                } else {
                    content
                };
                format!("{FILE_MARKER} {}\n{body}", item.name)
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        InputMode::Manual => {
            let trimmed = manual_text.trim();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("{MANUAL_MARKER}\n{trimmed}")
            }
        }
    }
}

/// Number of characters in a reviewable unit, as reported to the user.
pub fn reviewed_chars(unit: &str) -> usize {
    unit.chars().count()
}

/// Read a batch of files concurrently into [`UploadedItem`]s.
///
/// All reads are issued at once and joined; the first failure aborts the
/// batch so callers never commit a partial set. Contents must be valid UTF-8.
///
/// # Errors
///
/// Returns [`CoderevError::FileRead`] naming the file that could not be
/// read or decoded.
pub async fn read_items(paths: &[PathBuf]) -> Result<Vec<UploadedItem>, CoderevError> {
    try_join_all(paths.iter().map(|p| read_item(p))).await
}

async fn read_item(path: &Path) -> Result<UploadedItem, CoderevError> {
    let name = display_name(path);
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CoderevError::FileRead {
            name: name.clone(),
            reason: e.to_string(),
        })?;
    let size = bytes.len() as u64;
    let content = String::from_utf8(bytes).map_err(|e| CoderevError::FileRead {
        name: name.clone(),
        reason: e.to_string(),
    })?;
    tracing::debug!(name = %name, size, "read uploaded file");
    Ok(UploadedItem {
        id: Uuid::new_v4(),
        name,
        size,
        content,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
