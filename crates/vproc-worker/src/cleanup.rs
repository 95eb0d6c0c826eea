//! Best-effort operations and scratch file cleanup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::logging::JobLogger;

/// Outcome of an operation whose failure must not change the job result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestEffort {
    /// The operation did its work
    Done,
    /// Nothing to do
    Skipped,
    /// The operation failed; the reason is logged
    Failed(String),
}

impl BestEffort {
    /// Log the outcome against the job.
    pub fn log(&self, logger: &JobLogger, what: &str) {
        match self {
            Self::Done => logger.log_progress(&format!("{} done", what)),
            Self::Skipped => logger.log_progress(&format!("{} skipped", what)),
            Self::Failed(reason) => logger.log_warning(&format!("{} failed: {}", what, reason)),
        }
    }

    /// Combine two outcomes: any failure wins, then any completed work.
    fn and(self, other: BestEffort) -> BestEffort {
        match (self, other) {
            (Self::Failed(a), Self::Failed(b)) => Self::Failed(format!("{}; {}", a, b)),
            (Self::Failed(a), _) | (_, Self::Failed(a)) => Self::Failed(a),
            (Self::Done, _) | (_, Self::Done) => Self::Done,
            _ => Self::Skipped,
        }
    }
}

/// Removes a job's scratch file and its per-job directory.
///
/// Call [`Cleanup::run`] on the normal exit path. If the guard is dropped
/// without running (a panic or a cancelled future), the same removal happens
/// synchronously in `Drop`.
#[derive(Debug)]
pub struct Cleanup {
    file: PathBuf,
    dir: PathBuf,
    armed: bool,
}

impl Cleanup {
    pub fn new(file: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            dir: dir.into(),
            armed: true,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Remove the file, then the directory if it is empty.
    pub async fn run(mut self) -> BestEffort {
        self.armed = false;
        let file = classify(tokio::fs::remove_file(&self.file).await, &self.file);
        let dir = classify(tokio::fs::remove_dir(&self.dir).await, &self.dir);
        file.and(dir)
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.file);
            let _ = std::fs::remove_dir(&self.dir);
        }
    }
}

fn classify(result: std::io::Result<()>, path: &Path) -> BestEffort {
    match result {
        Ok(()) => BestEffort::Done,
        Err(e) if e.kind() == ErrorKind::NotFound => BestEffort::Skipped,
        Err(e) => BestEffort::Failed(format!("{}: {}", path.display(), e)),
    }
}
