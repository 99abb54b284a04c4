use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which source currently supplies the code under review.
///
/// # Examples
///
/// ```
/// use coderev_core::InputMode;
///
/// let mode: InputMode = "manual".parse().unwrap();
/// assert_eq!(mode, InputMode::Manual);
/// assert_eq!(InputMode::default(), InputMode::File);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Uploaded files are reviewed.
    #[default]
    File,
    /// A manually pasted buffer is reviewed.
    Manual,
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputMode::File => write!(f, "file"),
            InputMode::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" | "files" => Ok(InputMode::File),
            "manual" | "paste" => Ok(InputMode::Manual),
            other => Err(format!("unknown input mode: {other}")),
        }
    }
}

/// A file the user uploaded, read fully into memory as text.
///
/// Immutable once created; removed only by explicit removal or a mode switch.
///
/// # Examples
///
/// ```
/// use coderev_core::UploadedItem;
///
/// let item = UploadedItem::new("a.py", "x=1");
/// assert_eq!(item.size, 3);
/// assert_eq!(item.name, "a.py");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedItem {
    /// Opaque unique identifier.
    pub id: Uuid,
    /// File name as shown to the user.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Decoded text content.
    pub content: String,
}

impl UploadedItem {
    /// Create an item with a fresh identifier, sized from `content`.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            size: content.len() as u64,
            content,
        }
    }
}

/// Snapshot of what was submitted for a review, taken at run time.
///
/// # Examples
///
/// ```
/// use coderev_core::InputDescriptor;
///
/// let d = InputDescriptor { file_count: 2, manual_chars: 0 };
/// assert_eq!(d.summary(), "2 files, 0 manual chars");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    /// Number of uploaded files at submission.
    pub file_count: usize,
    /// Character length of the manual buffer at submission.
    pub manual_chars: usize,
}

impl InputDescriptor {
    /// Human-readable one-line summary used by history entries.
    pub fn summary(&self) -> String {
        let files = if self.file_count == 1 { "file" } else { "files" };
        format!(
            "{} {files}, {} manual chars",
            self.file_count, self.manual_chars
        )
    }
}

/// One completed review, kept for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    /// Unique identifier for re-selection.
    pub id: Uuid,
    /// Completion time, serialized as RFC 3339.
    pub timestamp: DateTime<Utc>,
    /// Counts of files and manual characters reviewed.
    pub summary: String,
    /// Full review text returned by the model.
    pub result: String,
    /// Hex SHA-256 of the reviewable unit that was submitted.
    pub digest: String,
}

/// An API credential held only in memory.
///
/// `Debug` never prints the secret.
///
/// # Examples
///
/// ```
/// use coderev_core::ApiKey;
///
/// let key = ApiKey::new("sk-test");
/// assert_eq!(key.expose(), "sk-test");
/// assert_eq!(format!("{key:?}"), "ApiKey(***)");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw secret, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `true` when the key is empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(***)")
    }
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use coderev_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain review text.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Format a byte count with a binary unit and one decimal place.
///
/// # Examples
///
/// ```
/// use coderev_core::readable_bytes;
///
/// assert_eq!(readable_bytes(0), "0 B");
/// assert_eq!(readable_bytes(1536), "1.5 KB");
/// ```
pub fn readable_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".into();
    }
    const UNITS: [&str; 3] = ["B", "KB", "MB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_mode_round_trips_through_str() {
        assert_eq!("file".parse::<InputMode>().unwrap(), InputMode::File);
        assert_eq!("MANUAL".parse::<InputMode>().unwrap(), InputMode::Manual);
        assert_eq!(InputMode::Manual.to_string(), "manual");
        assert!("clipboard".parse::<InputMode>().is_err());
    }

    #[test]
    fn uploaded_items_get_distinct_ids() {
        let a = UploadedItem::new("a.rs", "fn main() {}");
        let b = UploadedItem::new("a.rs", "fn main() {}");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn uploaded_item_size_counts_bytes() {
        let item = UploadedItem::new("k.txt", "한글");
        assert_eq!(item.size, 6);
    }

    #[test]
    fn summary_uses_singular_for_one_file() {
        let d = InputDescriptor {
            file_count: 1,
            manual_chars: 0,
        };
        assert_eq!(d.summary(), "1 file, 0 manual chars");
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn readable_bytes_scales_units() {
        assert_eq!(readable_bytes(0), "0 B");
        assert_eq!(readable_bytes(500), "500.0 B");
        assert_eq!(readable_bytes(1024), "1.0 KB");
        assert_eq!(readable_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(readable_bytes(3 * 1024 * 1024 * 1024), "3072.0 MB");
    }

    #[test]
    fn record_serializes_timestamp_as_rfc3339() {
        let record = ReviewRecord {
            id: Uuid::nil(),
            timestamp: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
            summary: "1 file, 0 manual chars".into(),
            result: "LGTM".into(),
            digest: String::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["timestamp"], "2026-01-02T03:04:05Z");
        assert_eq!(json["summary"], "1 file, 0 manual chars");
    }
}
