//! Temp-root lifecycle and interrupt handling.
//!
//! One temp root exists per run. It is created on first use and removed by
//! either of two triggers: the [`CleanupGuard`] dropped at the end of the
//! normal path, or [`watch_interrupt`] when a termination signal arrives.
//! Both call the same idempotent [`TempRoot::cleanup`].

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

/// Prefix of the temp root directory name.
pub const TEMP_ROOT_PREFIX: &str = "docfields_tmp";

#[derive(Debug, Default)]
struct RootState {
    path: Option<PathBuf>,
    closed: bool,
}

#[derive(Debug)]
struct TempRootInner {
    parent: PathBuf,
    state: Mutex<RootState>,
}

/// Lazily created, idempotently removable run directory. Cheap to clone.
///
/// Once [`TempRoot::cleanup`] has run the root is closed: later calls to
/// [`TempRoot::path`] or [`TempRoot::scratch_dir`] fail instead of
/// recreating it.
#[derive(Debug, Clone)]
pub struct TempRoot {
    inner: Arc<TempRootInner>,
}

impl TempRoot {
    /// A temp root to be created under `parent` when first needed.
    pub fn new(parent: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(TempRootInner {
                parent: parent.into(),
                state: Mutex::new(RootState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, RootState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The root directory, created on first call as
    /// `docfields_tmp_<unix-seconds>_<uuid>`.
    pub fn path(&self) -> io::Result<PathBuf> {
        let mut state = self.state();
        if state.closed {
            return Err(io::Error::other("temp root already removed"));
        }

        let path = match state.path.as_ref() {
            Some(path) => path.clone(),
            None => {
                let name = format!(
                    "{}_{}_{}",
                    TEMP_ROOT_PREFIX,
                    chrono::Utc::now().timestamp(),
                    uuid::Uuid::new_v4().simple()
                );
                let path = self.inner.parent.join(name);
                debug!("Using temp root {:?}", path);
                state.path = Some(path.clone());
                path
            }
        };
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Path of the root if it was ever requested.
    pub fn created_path(&self) -> Option<PathBuf> {
        self.state().path.clone()
    }

    /// A scratch directory for one file, removed when dropped.
    pub fn scratch_dir(&self) -> io::Result<tempfile::TempDir> {
        let root = self.path()?;
        tempfile::Builder::new().prefix("file_").tempdir_in(root)
    }

    /// Remove the root and close it. Safe to call any number of times.
    pub fn cleanup(&self) -> io::Result<()> {
        let mut state = self.state();
        state.closed = true;
        match state.path.as_deref() {
            Some(path) => remove_dir_if_exists(path),
            None => Ok(()),
        }
    }

    /// Guard that cleans up when dropped.
    pub fn guard(&self) -> CleanupGuard {
        CleanupGuard { root: self.clone() }
    }
}

fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed temp root {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Removes the temp root when the normal path ends.
#[derive(Debug)]
pub struct CleanupGuard {
    root: TempRoot,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if let Err(e) = self.root.cleanup() {
            warn!("Failed to remove temp root: {}", e);
        }
    }
}

/// Wait for `signal`, then clean up `root`.
///
/// Returns once cleanup is done; the caller terminates the process.
pub async fn watch_interrupt<F>(root: TempRoot, signal: F)
where
    F: Future<Output = ()>,
{
    signal.await;
    info!("Interrupted, removing temporary files");
    if let Err(e) = root.cleanup() {
        warn!("Failed to remove temp root: {}", e);
    }
}

/// Resolves on SIGINT, SIGTERM, SIGQUIT or SIGHUP.
#[cfg(unix)]
pub async fn termination_signal() -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT"),
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigquit.recv() => info!("Received SIGQUIT"),
        _ = sighup.recv() => info!("Received SIGHUP"),
    }
    Ok(())
}

/// Resolves on Ctrl-C.
#[cfg(not(unix))]
pub async fn termination_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_before_use_is_a_no_op() {
        let parent = tempfile::tempdir().unwrap();
        let root = TempRoot::new(parent.path());

        root.cleanup().unwrap();
        assert!(root.created_path().is_none());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_lazy_creation_and_idempotent_cleanup() {
        let parent = tempfile::tempdir().unwrap();
        let root = TempRoot::new(parent.path());

        assert!(root.created_path().is_none());
        let path = root.path().unwrap();
        assert!(path.is_dir());
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("docfields_tmp_")
        );
        assert_eq!(root.path().unwrap(), path);

        root.cleanup().unwrap();
        assert!(!path.exists());
        root.cleanup().unwrap();
    }

    #[test]
    fn test_guard_and_scratch_dirs() {
        let parent = tempfile::tempdir().unwrap();
        let root = TempRoot::new(parent.path());
        let path;
        {
            let _guard = root.guard();
            let scratch = root.scratch_dir().unwrap();
            path = root.path().unwrap();
            assert!(scratch.path().starts_with(&path));
            let scratch_path = scratch.path().to_path_buf();
            drop(scratch);
            assert!(!scratch_path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_closed_root_is_not_recreated() {
        let parent = tempfile::tempdir().unwrap();
        let root = TempRoot::new(parent.path());
        let path = root.path().unwrap();
        let in_flight = root.clone();

        root.cleanup().unwrap();

        assert!(in_flight.scratch_dir().is_err());
        assert!(in_flight.path().is_err());
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_roots_created_together_are_distinct() {
        let parent = tempfile::tempdir().unwrap();
        let first = TempRoot::new(parent.path());
        let second = TempRoot::new(parent.path());

        let a = first.scratch_dir().unwrap();
        let b = second.scratch_dir().unwrap();
        assert_ne!(first.path().unwrap(), second.path().unwrap());

        drop(a);
        first.cleanup().unwrap();
        assert!(b.path().is_dir());
    }

    #[tokio::test]
    async fn test_interrupt_observer_cleans_up() {
        let parent = tempfile::tempdir().unwrap();
        let root = TempRoot::new(parent.path());
        let path = root.path().unwrap();
        std::fs::write(path.join("artifact.png"), b"x").unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let observer = tokio::spawn(watch_interrupt(root.clone(), async move {
            let _ = rx.await;
        }));

        assert!(path.exists());
        tx.send(()).unwrap();
        observer.await.unwrap();
        assert!(!path.exists());

        // The normal-path guard firing afterwards is harmless.
        drop(root.guard());
    }
}
