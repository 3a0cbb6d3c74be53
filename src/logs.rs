//! Per-run log tee over stdout and stderr.
//!
//! A `tee -a` child captures everything written to fds 1 and 2 for the
//! duration of a session, including output from child processes spawned
//! inside it. The file is only ever appended to; consecutive sessions on
//! the same path stack their payloads.
//!
//! Shutdown ordering is load-bearing: all write ends of the pipe must be
//! closed before waiting on the tee, which exits only on EOF.

use crate::error::{Result, VibeError};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::process::{Child, Command, Stdio};

fn dup(fd: RawFd) -> io::Result<RawFd> {
    // SAFETY: duplicating a process-owned descriptor; failure is reported.
    let duped = unsafe { libc::dup(fd) };
    if duped < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(duped)
}

fn dup2(src: RawFd, dst: RawFd) -> io::Result<()> {
    // SAFETY: both descriptors are owned by this process.
    if unsafe { libc::dup2(src, dst) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn close(fd: RawFd) {
    // SAFETY: fd was obtained from dup above and is closed exactly once.
    unsafe {
        libc::close(fd);
    }
}

/// One append session over a run log. Obtain with [`LogSession::begin`],
/// release with [`LogSession::end`]; `Drop` restores the descriptors as a
/// last resort but cannot report failures.
pub struct LogSession {
    tee: Child,
    saved_stdout: RawFd,
    saved_stderr: RawFd,
    finished: bool,
}

impl LogSession {
    /// Redirect stdout/stderr through an appending tee onto `path`.
    ///
    /// The first creation of the file writes a one-time `RUN_ID=<id>`
    /// header; every `_base` run stamps its session entry.
    pub fn begin(path: &Path, run_id: &str) -> Result<LogSession> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let fresh = !path.exists();
        {
            // Written before the tee spawns, so headers always precede the
            // session payload in the file.
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            if fresh {
                writeln!(file, "RUN_ID={run_id}")?;
            }
            if run_id.ends_with("_base") {
                writeln!(file, "BEGIN-STAMP {}", Utc::now().to_rfc3339())?;
            }
        }

        let tee_bin = which::which("tee")
            .map_err(|err| VibeError::Internal(format!("tee binary not found: {err}")))?;

        // Flush Rust-side buffers so pre-session output stays on the console.
        io::stdout().flush()?;
        io::stderr().flush()?;

        // Spawned before the redirect, so the tee inherits the original
        // stdout and keeps echoing to the console.
        let mut tee = Command::new(tee_bin)
            .arg("-a")
            .arg(path)
            .stdin(Stdio::piped())
            .spawn()?;

        let pipe = tee
            .stdin
            .take()
            .ok_or_else(|| VibeError::Internal("tee child has no piped stdin".to_string()))?;

        let saved_stdout = dup(1)?;
        let saved_stderr = match dup(2) {
            Ok(fd) => fd,
            Err(err) => {
                close(saved_stdout);
                return Err(err.into());
            }
        };
        let redirected = dup2(pipe.as_raw_fd(), 1).and_then(|()| dup2(pipe.as_raw_fd(), 2));
        if let Err(err) = redirected {
            // A failed second dup2 leaves fd 1 on the pipe; put both back,
            // release the saves, and reap the tee before reporting.
            let _ = dup2(saved_stdout, 1);
            let _ = dup2(saved_stderr, 2);
            close(saved_stdout);
            close(saved_stderr);
            drop(pipe);
            let _ = tee.kill();
            let _ = tee.wait();
            return Err(err.into());
        }
        // Fds 1 and 2 now hold the only write ends of the pipe.
        drop(pipe);

        Ok(LogSession {
            tee,
            saved_stdout,
            saved_stderr,
            finished: false,
        })
    }

    /// Restore the original descriptors and wait for the tee to drain.
    pub fn end(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        let _ = io::stdout().flush();
        let _ = io::stderr().flush();

        // Restoring fds 1/2 closes the last write ends of the pipe; the tee
        // sees EOF and exits, so the wait below cannot deadlock.
        let restore_out = dup2(self.saved_stdout, 1);
        let restore_err = dup2(self.saved_stderr, 2);
        close(self.saved_stdout);
        close(self.saved_stderr);
        restore_out?;
        restore_err?;

        self.tee.wait()?;
        Ok(())
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
