//! Newline-delimited JSON persistence helpers

use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Append one record as a single line.
pub async fn append<T: Serialize>(path: &Path, entry: &T) -> Result<()> {
    ensure_parent(path).await?;

    let mut line = serde_json::to_string(entry)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;

    Ok(())
}

/// Read every record. A missing file reads as empty; a malformed line is an
/// error, the log is never silently skipped over.
pub async fn read_all<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}

/// Truncate the log to empty, creating it if absent.
pub async fn truncate(path: &Path) -> Result<()> {
    ensure_parent(path).await?;
    fs::write(path, "").await?;
    Ok(())
}

/// Create the parent directory of a store file if it does not exist yet.
pub async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        id: u32,
        label: String,
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        append(
            &path,
            &Entry {
                id: 1,
                label: "first".to_string(),
            },
        )
        .await
        .unwrap();
        append(
            &path,
            &Entry {
                id: 2,
                label: "second".to_string(),
            },
        )
        .await
        .unwrap();

        let entries: Vec<Entry> = read_all(&path).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[1].label, "second");
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.jsonl");

        let entries: Vec<Entry> = read_all(&path).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_truncate_then_fresh_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        append(
            &path,
            &Entry {
                id: 1,
                label: "old".to_string(),
            },
        )
        .await
        .unwrap();
        truncate(&path).await.unwrap();

        let entries: Vec<Entry> = read_all(&path).await.unwrap();
        assert!(entries.is_empty());

        append(
            &path,
            &Entry {
                id: 2,
                label: "new".to_string(),
            },
        )
        .await
        .unwrap();
        let entries: Vec<Entry> = read_all(&path).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 2);
    }

    #[tokio::test]
    async fn test_malformed_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, "{\"id\":1,\"label\":\"ok\"}\nnot json\n").unwrap();

        let result: Result<Vec<Entry>> = read_all(&path).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_parent_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("log.jsonl");

        append(
            &path,
            &Entry {
                id: 1,
                label: "x".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(path.exists());
    }
}
