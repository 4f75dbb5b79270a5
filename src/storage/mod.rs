//! Upload store
//!
//! A single directory of files identified only by name. There is no index;
//! every listing walks the directory and every lookup goes to the filesystem.

pub mod template;

use std::ffi::OsStr;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};
use crate::logger;

const PART_SUFFIX: &str = ".part";

/// Distinguishes concurrent uploads of the same name
static PART_SEQ: AtomicU64 = AtomicU64::new(0);

/// One row of the listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// Directory-backed file store
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the store directory (and parents) if missing
    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Start writing `name` into a private part file inside the store
    ///
    /// The target is only replaced by [`PendingUpload::commit`], so a failed
    /// upload leaves any existing file with that name untouched.
    pub async fn begin_upload(&self, name: &str) -> AppResult<PendingUpload> {
        let target = self
            .resolve(name)
            .ok_or(AppError::BadRequest("Invalid file name"))?;
        self.ensure_root()
            .await
            .map_err(AppError::storage("Error creating upload directory"))?;

        let seq = PART_SEQ.fetch_add(1, Ordering::Relaxed);
        let part = self.root.join(format!(".{name}.{seq}{PART_SUFFIX}"));
        let file = File::create(&part)
            .await
            .map_err(AppError::storage("Error creating file"))?;
        Ok(PendingUpload { file, part, target })
    }

    /// Map a client-supplied name onto a path directly inside the store
    ///
    /// Returns `None` for empty names, names with separators, `.`/`..`,
    /// absolute paths and names containing NUL.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\', '\0']) {
            return None;
        }
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => Some(self.root.join(part)),
            _ => None,
        }
    }

    /// Recursively enumerate every non-directory entry in the store
    ///
    /// Siblings are visited in file name order. Any walk error, including a
    /// missing store directory, aborts the listing.
    pub fn scan(&self) -> io::Result<Vec<FileEntry>> {
        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_dir() || is_part_file(entry.file_name()) {
                continue;
            }
            let metadata = entry.metadata()?;
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
            });
        }
        Ok(entries)
    }

    /// [`scan`](Self::scan) on the blocking pool
    pub async fn list(&self) -> AppResult<Vec<FileEntry>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.scan())
            .await
            .map_err(|e| AppError::Storage {
                context: "Error listing files",
                source: io::Error::other(e),
            })?
            .map_err(AppError::storage("Error listing files"))
    }
}

/// An upload being written to its part file
#[derive(Debug)]
pub struct PendingUpload {
    file: File,
    part: PathBuf,
    target: PathBuf,
}

impl PendingUpload {
    pub async fn write(&mut self, chunk: &[u8]) -> AppResult<()> {
        self.file
            .write_all(chunk)
            .await
            .map_err(AppError::storage("Error copying file"))
    }

    /// Flush and move the part file over the target, replacing it
    pub async fn commit(mut self) -> AppResult<()> {
        if let Err(e) = self.file.flush().await {
            self.abort().await;
            return Err(AppError::storage("Error copying file")(e));
        }
        let Self { file, part, target } = self;
        drop(file);
        if let Err(e) = fs::rename(&part, &target).await {
            remove_part(&part).await;
            return Err(AppError::storage("Error storing file")(e));
        }
        Ok(())
    }

    /// Drop the part file; the target is left as it was
    pub async fn abort(self) {
        let Self { file, part, .. } = self;
        drop(file);
        remove_part(&part).await;
    }
}

async fn remove_part(part: &Path) {
    if let Err(e) = fs::remove_file(part).await {
        logger::log_warning(&format!(
            "Failed to remove partial upload '{}': {e}",
            part.display()
        ));
    }
}

fn is_part_file(name: &OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with('.') && name.ends_with(PART_SUFFIX)
}

/// Reduce a multipart file name to its final path component
///
/// Browsers normally send a bare name, but some send a full client path.
pub fn sanitize_upload_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." || last.contains('\0') {
        return None;
    }
    Some(last.to_string())
}

/// Render a byte count with binary units, e.g. `1.5 MiB`
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
