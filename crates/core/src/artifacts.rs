//! Temporary files owned by one narration run.

use crate::types::UploadedDocument;
use crate::Result;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Every temporary file created by a run.
///
/// [`RunArtifacts::cleanup`] removes them; dropping the set cleans up too, so
/// files are released on every exit path, including unwinding.
#[derive(Debug, Default)]
pub struct RunArtifacts {
    input: Option<TempPath>,
    audio: Vec<PathBuf>,
}

/// What a cleanup pass removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: usize,
}

impl RunArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the uploaded document to a uniquely named file in `dir`.
    pub fn store_input(
        &mut self,
        dir: &Path,
        document: &UploadedDocument,
        suffix: &str,
    ) -> Result<PathBuf> {
        let mut file = tempfile::Builder::new()
            .prefix("narration_input_")
            .suffix(suffix)
            .tempfile_in(dir)?;
        let path = file.path().to_path_buf();
        // Track the path before writing so a failed write is still cleaned up.
        let write_result = file.write_all(&document.bytes).and_then(|_| file.flush());
        self.input = Some(file.into_temp_path());
        write_result?;
        Ok(path)
    }

    /// Path of the input copy, if one was stored.
    pub fn input_path(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    /// Register an audio file before it is created.
    pub fn track_audio(&mut self, path: PathBuf) {
        self.audio.push(path);
    }

    /// Audio files registered so far, in slide order.
    pub fn audio_paths(&self) -> &[PathBuf] {
        &self.audio
    }

    /// Remove every tracked file. Files that were never created are skipped.
    ///
    /// Calling this again is a no-op.
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        if let Some(input) = self.input.take() {
            let path = input.to_path_buf();
            match input.close() {
                Ok(()) => report.removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    log::warn!("Failed to remove {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        for path in self.audio.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => report.removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    log::warn!("Failed to remove {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn is_empty(&self) -> bool {
        self.input.is_none() && self.audio.is_empty()
    }
}

impl Drop for RunArtifacts {
    fn drop(&mut self) {
        if !self.is_empty() {
            let report = self.cleanup();
            log::debug!("Released leftover run artifacts: {:?}", report);
        }
    }
}
