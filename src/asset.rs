use std::io::{Error as IoError, ErrorKind};
use std::path::PathBuf;
use tokio::fs::File;

/// Reduce a client supplied asset name to its final path component.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable
/// is left (empty, `.`, `..`, or containing a NUL byte).
pub fn sanitize_asset_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default();

    if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
        return None;
    }

    Some(name.to_string())
}

/// An opened asset, ready to be streamed
#[derive(Debug)]
pub struct AssetFile {
    pub name: String,
    pub file: File,
    pub len: u64,
}

/// Read-only view over the directory holding downloadable assets
#[derive(Debug, Clone)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of an already sanitized asset name
    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Whether `name` is an existing regular file
    pub async fn exists(&self, name: &str) -> bool {
        tokio::fs::metadata(self.path_of(name))
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
    }

    /// Open `name` for reading. Directories and other non-files are reported
    /// as `NotFound`.
    pub async fn open(&self, name: &str) -> std::io::Result<AssetFile> {
        let file = File::open(self.path_of(name)).await?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(IoError::new(ErrorKind::NotFound, "asset is not a regular file"));
        }

        Ok(AssetFile {
            name: name.to_string(),
            file,
            len: metadata.len(),
        })
    }
}
