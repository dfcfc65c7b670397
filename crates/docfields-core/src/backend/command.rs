//! Running external tools with explicit argv and a time budget.

use std::ffi::OsStr;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::BackendError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Stderr kept in error messages.
const MAX_STDERR: usize = 2048;

/// An external executable plus the timeout applied to every invocation.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl AsRef<OsStr>, timeout: Duration) -> Self {
        Self {
            program: program.as_ref().to_string_lossy().into_owned(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the tool to completion.
    ///
    /// Arguments are passed as-is, never through a shell. Stderr is buffered
    /// in an anonymous temp file inside `work_dir` so a chatty tool cannot
    /// block on a full pipe. The child is killed once the timeout elapses.
    pub fn run<I, S>(&self, args: I, work_dir: &Path) -> Result<(), BackendError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut stderr_file = tempfile::tempfile_in(work_dir).map_err(|e| self.spawn_error(e))?;
        let stderr_handle = stderr_file.try_clone().map_err(|e| self.spawn_error(e))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_handle));
        debug!("Running {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;
        let started = Instant::now();

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= self.timeout => {
                    warn!("{} exceeded {:?}, killing", self.program, self.timeout);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(BackendError::Timeout {
                        program: self.program.clone(),
                        seconds: self.timeout.as_secs(),
                    });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(self.spawn_error(e)),
            }
        };

        if status.success() {
            return Ok(());
        }

        let mut stderr = String::new();
        if stderr_file.seek(SeekFrom::Start(0)).is_ok() {
            let mut bytes = Vec::new();
            let _ = stderr_file.read_to_end(&mut bytes);
            stderr = String::from_utf8_lossy(&bytes).trim().to_string();
        }
        if stderr.len() > MAX_STDERR {
            let mut cut = MAX_STDERR;
            while !stderr.is_char_boundary(cut) {
                cut -= 1;
            }
            stderr.truncate(cut);
        }

        Err(BackendError::Exit {
            program: self.program.clone(),
            status: status.to_string(),
            stderr,
        })
    }

    fn spawn_error(&self, e: std::io::Error) -> BackendError {
        BackendError::Spawn {
            program: self.program.clone(),
            reason: e.to_string(),
        }
    }

    /// Error for output files the tool should have produced but did not.
    pub fn output_error(&self, reason: impl Into<String>) -> BackendError {
        BackendError::Output {
            program: self.program.clone(),
            reason: reason.into(),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ok = ToolCommand::new("sh", Duration::from_secs(5));
        ok.run(["-c", "exit 0"], dir.path()).unwrap();

        let err = ok.run(["-c", "echo broken >&2; exit 3"], dir.path()).unwrap_err();
        match err {
            BackendError::Exit { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let slow = ToolCommand::new("sh", Duration::from_millis(100));
        let started = Instant::now();
        let err = slow.run(["-c", "sleep 5"], dir.path()).unwrap_err();
        assert!(matches!(err, BackendError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let missing = ToolCommand::new("docfields-no-such-tool", Duration::from_secs(1));
        assert!(matches!(
            missing.run(["x"], dir.path()),
            Err(BackendError::Spawn { .. })
        ));
    }
}
