//! Export artifact writing.
//!
//! An export produces one zip file per (solution, variant) pair under the
//! user-chosen export root. Each write records the byte count and a SHA-256
//! digest, and opens the archive once as a sanity check. A payload that does
//! not open as a zip is still written to disk; the check result is surfaced
//! so the caller can log it.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Result of writing one export artifact.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    /// Full path of the written zip file.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes_written: u64,
    /// SHA-256 of the payload, lowercase hex.
    pub sha256: String,
    /// Number of archive entries, or `None` if the payload did not open as a zip.
    pub zip_entries: Option<usize>,
}

/// File name for a (solution, variant) pair: `{name}.zip` or `{name}_managed.zip`.
pub fn artifact_file_name(unique_name: &str, managed: bool) -> String {
    let suffix = if managed { "_managed" } else { "" };
    format!("{}{}.zip", unique_name, suffix)
}

/// Create the directory if it does not exist yet.
pub async fn ensure_directory_exists(path: &Path) -> Result<(), ArtifactError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Write an export payload to its deterministic path under `export_root`.
pub async fn write_artifact(
    export_root: &Path,
    unique_name: &str,
    managed: bool,
    payload: &[u8],
) -> Result<ArtifactInfo, ArtifactError> {
    ensure_directory_exists(export_root).await?;

    let path = export_root.join(artifact_file_name(unique_name, managed));
    tokio::fs::write(&path, payload)
        .await
        .map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let sha256 = format_sha256_hex(&Sha256::digest(payload));

    let zip_entries = match zip::ZipArchive::new(Cursor::new(payload)) {
        Ok(archive) => Some(archive.len()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Export payload did not open as a zip archive");
            None
        }
    };

    debug!(
        path = %path.display(),
        bytes = payload.len(),
        %sha256,
        ?zip_entries,
        "Artifact written"
    );

    Ok(ArtifactInfo {
        path,
        bytes_written: payload.len() as u64,
        sha256,
        zip_entries,
    })
}

/// Formats a SHA-256 hash as lowercase hex.
pub(crate) fn format_sha256_hex(hash: &[u8]) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    /// Build a minimal real zip payload with one entry.
    fn sample_zip() -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("solution.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"<ImportExportXml/>").unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(artifact_file_name("foo", false), "foo.zip");
        assert_eq!(artifact_file_name("foo", true), "foo_managed.zip");
    }

    #[tokio::test]
    async fn test_write_artifact_creates_file_and_digest() {
        let tmp = TempDir::new().unwrap();
        let payload = sample_zip();

        let info = write_artifact(tmp.path(), "foo", false, &payload)
            .await
            .unwrap();

        assert!(info.path.ends_with("foo.zip"));
        assert!(info.path.exists());
        assert_eq!(info.bytes_written, payload.len() as u64);
        assert_eq!(info.sha256.len(), 64);
        assert_eq!(info.zip_entries, Some(1));
    }

    #[tokio::test]
    async fn test_write_artifact_managed_suffix() {
        let tmp = TempDir::new().unwrap();
        let info = write_artifact(tmp.path(), "foo", true, &sample_zip())
            .await
            .unwrap();
        assert!(info.path.ends_with("foo_managed.zip"));
    }

    #[tokio::test]
    async fn test_write_artifact_flags_non_zip_payload() {
        let tmp = TempDir::new().unwrap();
        let info = write_artifact(tmp.path(), "foo", false, b"not a zip")
            .await
            .unwrap();
        assert!(info.path.exists());
        assert_eq!(info.zip_entries, None);
    }

    #[tokio::test]
    async fn test_write_artifact_creates_missing_export_root() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("exports").join("run1");

        let info = write_artifact(&nested, "foo", false, &sample_zip())
            .await
            .unwrap();
        assert!(info.path.exists());
    }

    #[test]
    fn test_format_sha256_hex() {
        let hash = Sha256::digest(b"");
        assert_eq!(
            format_sha256_hex(&hash),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
