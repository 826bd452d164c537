use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use log::{info, warn};
use uuid::Uuid;

use crate::{Result, ServiceErr};

/// Keeps uploaded images on disk under collision free names.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    allowed_extensions: Vec<String>,
}

impl FileStore {
    /// Creates a new `FileStore`, creating its directory if it doesn't exist.
    ///
    /// # Arguments
    /// * `dir` - Where the files are kept.
    /// * `allowed_extensions` - The accepted extensions, matched case-insensitively.
    ///
    /// # Returns
    /// A new `FileStore` or an io error if the directory can't be created.
    pub fn new<I, S>(dir: impl Into<PathBuf>, allowed_extensions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!("created upload folder {}", dir.display());
        }

        Ok(Self {
            dir,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether `filename` has one of the allowed extensions.
    pub fn allowed(&self, filename: &str) -> bool {
        extension(filename).is_some_and(|ext| self.allowed_extensions.contains(&ext))
    }

    /// Writes an upload under a fresh `<uuid>_<unix secs>.<ext>` name.
    ///
    /// # Arguments
    /// * `filename` - The name the client gave the file, only its extension is kept.
    /// * `bytes` - The content.
    ///
    /// # Returns
    /// The reference to read the file back with.
    pub fn save(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let Some(ext) = extension(filename).filter(|_| self.allowed(filename)) else {
            warn!("rejected upload {filename}");
            return Err(ServiceErr::FileTypeNotAllowed(filename.to_string()));
        };

        let reference = format!("{}_{}.{ext}", Uuid::new_v4(), unix_secs());
        let path = self.dir.join(&reference);
        fs::write(&path, bytes)?;

        info!(bytes = bytes.len(); "saved upload to {}", path.display());
        Ok(reference)
    }

    /// Resolves a reference to a path inside the store.
    ///
    /// Only the final component of `reference` is honored, so references can't escape the
    /// store's directory.
    pub fn path(&self, reference: &str) -> Result<PathBuf> {
        Path::new(reference)
            .file_name()
            .map(|name| self.dir.join(name))
            .ok_or_else(|| ServiceErr::FileNotFound(reference.to_string()))
    }

    /// Reads a stored file back.
    pub fn read(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.path(reference)?;

        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ServiceErr::FileNotFound(reference.to_string()),
            _ => ServiceErr::Storage(e),
        })
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

pub(crate) fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
