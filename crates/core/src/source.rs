use std::path::{Path, PathBuf};

use anyhow::Result;
use thiserror::Error;
use walkdir::WalkDir;

/// Accepted contract extensions.
pub const SOURCE_EXTENSIONS: &[&str] = &["sol", "vy"];

/// Default upper bound on a single source file (50 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{path}: unsupported file type (expected .sol or .vy)")]
    UnsupportedExtension { path: PathBuf },

    #[error("{path}: file is {size} bytes, limit is {limit}")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("{path}: not valid UTF-8")]
    InvalidEncoding { path: PathBuf },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A contract file accepted for analysis.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Name used in reports and finding locations
    pub file_name: String,
    pub contents: String,
}

pub fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

/// Validate and read one contract file. Extension and size are checked
/// before the contents are read.
pub fn load_source(path: &Path, max_size: u64) -> Result<SourceFile, IngestError> {
    if !has_source_extension(path) {
        return Err(IngestError::UnsupportedExtension {
            path: path.to_path_buf(),
        });
    }

    let io_err = |source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > max_size {
        return Err(IngestError::TooLarge {
            path: path.to_path_buf(),
            size,
            limit: max_size,
        });
    }

    let bytes = std::fs::read(path).map_err(io_err)?;
    let contents = String::from_utf8(bytes).map_err(|_| IngestError::InvalidEncoding {
        path: path.to_path_buf(),
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(SourceFile {
        path: path.to_path_buf(),
        file_name,
        contents,
    })
}

/// Discover contract files under a path. A file path is returned as-is so
/// that ingestion can report an unsupported extension.
pub fn discover(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_source_extension(e.path()))
        .filter(|e| {
            let p = e.path().to_string_lossy();
            !p.contains("/node_modules/") && !p.contains("/lib/forge-std/")
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No .sol or .vy files found in: {}", path.display());
    }

    Ok(files)
}
