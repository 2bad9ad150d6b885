use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory {path:?} unusable: {message}")]
    OutputDir { path: PathBuf, message: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure `dir` exists and is a writable directory, creating it if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let unusable = |message: String| PersistError::OutputDir {
        path: dir.to_path_buf(),
        message,
    };
    if dir.exists() && !dir.is_dir() {
        return Err(unusable("path is not a directory".into()));
    }
    fs::create_dir_all(dir).map_err(|e| unusable(e.to_string()))?;
    NamedTempFile::new_in(dir).map_err(|e| unusable(e.to_string()))?;
    Ok(())
}

/// Atomically writes `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn write(&self, filename: &str, content: impl AsRef<[u8]>) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_ref())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}
