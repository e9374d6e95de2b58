use crate::error::{BuildError, BuildResult};
use std::fs;
use std::path::{Path, PathBuf};

const PATCHED_MARKER: &str = ".patched";

/// Scratch directory holding one build's objects.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
    /// `false` for dry runs: every mutation becomes a no-op.
    on_disk: bool,
}

impl StagingArea {
    /// Create the directory if absent. Objects left by an earlier run are kept.
    pub fn prepare(dir: impl Into<PathBuf>) -> BuildResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| BuildError::io(&dir, e))?;
        Ok(Self { dir, on_disk: true })
    }

    /// Use a directory a previous build left behind.
    pub fn open(dir: impl Into<PathBuf>) -> BuildResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(BuildError::io(
                &dir,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "staging directory missing; run a full build first",
                ),
            ));
        }
        Ok(Self { dir, on_disk: true })
    }

    /// A staging area that is only planned, never created or modified.
    pub fn planned(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            on_disk: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn marker(&self) -> PathBuf {
        self.dir.join(PATCHED_MARKER)
    }

    /// Whether the objects here had their entry symbols rewritten.
    pub fn is_patched(&self) -> bool {
        self.on_disk && self.marker().exists()
    }

    pub fn mark_patched(&self) -> BuildResult<()> {
        if !self.on_disk {
            return Ok(());
        }
        let marker = self.marker();
        fs::write(&marker, "entry symbols renamed; recompile before linking\n")
            .map_err(|e| BuildError::io(&marker, e))
    }

    pub fn clear_patched(&self) -> BuildResult<()> {
        if !self.on_disk {
            return Ok(());
        }
        let marker = self.marker();
        match fs::remove_file(&marker) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::io(&marker, e)),
        }
    }

    /// Remove everything inside the directory, keeping the directory itself.
    pub fn clear(&self) -> BuildResult<()> {
        if !self.on_disk {
            return Ok(());
        }
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(BuildError::io(&self.dir, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| BuildError::io(&self.dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| BuildError::io(&path, e))?;
            let removed = if file_type.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|e| BuildError::io(&path, e))?;
        }
        Ok(())
    }
}
