use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("cannot serialize {file}: {message}")]
    Serialize { file: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Create `dir` if needed and check that files can be created in it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir)
                .map_err(|e| PersistError::OutputDir(format!("{}: {e}", dir.display())))?;
        }
        Err(err) => return Err(PersistError::OutputDir(format!("{}: {err}", dir.display()))),
    }
    NamedTempFile::new_in(dir)
        .map_err(|e| PersistError::OutputDir(format!("{}: {e}", dir.display())))?;
    Ok(())
}

/// Writes whole files under one directory through a temp file and rename, so a
/// reader never sees a half-written report.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    /// Checks the directory once; later writes assume it stays usable.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let dir = dir.into();
        ensure_output_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: impl AsRef<[u8]>) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_ref())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        engine_logging::engine_trace!("wrote {}", target.display());
        Ok(target)
    }

    /// Pretty-printed JSON.
    pub fn write_json<T: Serialize>(&self, filename: &str, value: &T) -> Result<PathBuf, PersistError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|err| PersistError::Serialize {
            file: filename.to_string(),
            message: err.to_string(),
        })?;
        self.write(filename, bytes)
    }
}
