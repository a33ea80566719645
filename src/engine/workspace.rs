use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::strategy::ExecutionStrategy;
use crate::error::{CodeletError, Result};

/// Isolated staging directory for a single execution request.
///
/// Exactly one workspace exists per request, created under the system temp
/// directory with a unique name so concurrent requests never collide. The
/// orchestrator disposes it on every exit path; `Drop` is the backstop for
/// paths that never reach the explicit dispose (panics, early `?` returns).
pub struct Workspace {
    root: PathBuf,
    source_file: PathBuf,
}

impl Workspace {
    /// Create the directory and materialize the source file in it.
    ///
    /// The filename comes from the strategy when the language dictates one
    /// (class-oriented languages name the file after the declared type);
    /// otherwise a random unique stem is generated.
    pub async fn stage(source: &str, strategy: &dyn ExecutionStrategy) -> Result<Workspace> {
        let root = std::env::temp_dir().join(format!("code_exec_{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            CodeletError::Staging(format!("failed to create {}: {}", root.display(), e))
        })?;

        let stem = strategy
            .staged_file_stem(source)
            .unwrap_or_else(|| format!("code_{}", Uuid::new_v4()));
        let source_file = root.join(format!("{}{}", stem, strategy.file_extension()));

        if let Err(e) = tokio::fs::write(&source_file, source).await {
            let _ = tokio::fs::remove_dir_all(&root).await;
            return Err(CodeletError::Staging(format!(
                "failed to write {}: {}",
                source_file.display(),
                e
            )));
        }

        debug!(
            root = %root.display(),
            file = %source_file.display(),
            "Staged workspace"
        );

        Ok(Workspace { root, source_file })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// Recursively remove the directory and everything staged or compiled
    /// into it. Tolerant of files that are already gone.
    pub async fn dispose(&self) {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!(root = %self.root.display(), "Disposed workspace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(root = %self.root.display(), error = %e, "Workspace cleanup failed"),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
