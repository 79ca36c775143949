//! Installer invoker: runs the installer in simulation, single-target mode
//! and captures its standard output.
use std::fmt;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Flag selecting simulation mode.
pub const SIMULATE_FLAG: &str = "-s";
/// Flag selecting single-target mode; followed by the target path.
pub const TARGET_FLAG: &str = "-t";
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Failures of the installer process itself. These abort the whole run.
#[derive(Debug)]
pub enum InvokeError {
    Spawn {
        command: String,
        source: std::io::Error,
    },
    Exit {
        command: String,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    TimedOut {
        command: String,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },
    Io {
        command: String,
        source: std::io::Error,
    },
}

impl InvokeError {
    /// Captured standard output, when the process got far enough to produce any.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            InvokeError::Exit { stdout, .. } | InvokeError::TimedOut { stdout, .. } => {
                Some(stdout.as_str())
            }
            InvokeError::Spawn { .. } | InvokeError::Io { .. } => None,
        }
    }
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokeError::Spawn { command, source } => {
                write!(f, "failed to start installer `{command}`: {source}")
            }
            InvokeError::Exit {
                command,
                status,
                stderr,
                ..
            } => {
                write!(f, "installer `{command}` exited with {status}")?;
                if !stderr.trim().is_empty() {
                    write!(f, ": {}", stderr.trim())?;
                }
                Ok(())
            }
            InvokeError::TimedOut {
                command,
                timeout,
                stderr,
                ..
            } => {
                write!(
                    f,
                    "installer `{command}` hung: no exit after {}s",
                    timeout.as_secs()
                )?;
                if !stderr.trim().is_empty() {
                    write!(f, ": {}", stderr.trim())?;
                }
                Ok(())
            }
            InvokeError::Io { command, source } => {
                write!(f, "lost contact with installer `{command}`: {source}")
            }
        }
    }
}

impl std::error::Error for InvokeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InvokeError::Spawn { source, .. } | InvokeError::Io { source, .. } => Some(source),
            InvokeError::Exit { .. } | InvokeError::TimedOut { .. } => None,
        }
    }
}

/// How to reach the installer under test.
#[derive(Debug, Clone)]
pub struct Installer {
    /// Working directory of the installer (its repository root).
    pub base_dir: PathBuf,
    /// Script path, relative to `base_dir` unless absolute.
    pub script: String,
    pub timeout: Duration,
}

impl Installer {
    pub fn program(&self) -> PathBuf {
        self.base_dir.join(&self.script)
    }

    /// Shell-quoted form of the invocation, for diagnostics.
    pub fn command_line(&self, target: &Path) -> String {
        let program = if Path::new(&self.script).is_absolute() {
            self.script.clone()
        } else {
            format!("./{}", self.script)
        };
        shell_words::join([
            program,
            SIMULATE_FLAG.to_string(),
            TARGET_FLAG.to_string(),
            target.display().to_string(),
        ])
    }

    /// Run the installer against `target` (an absolute path) and return its stdout.
    pub fn invoke(&self, target: &Path) -> Result<String, InvokeError> {
        let command = self.command_line(target);
        tracing::debug!(%command, cwd = %self.base_dir.display(), "invoking installer");

        let start = Instant::now();
        let mut child = Command::new(self.program())
            .arg(SIMULATE_FLAG)
            .arg(TARGET_FLAG)
            .arg(target)
            .current_dir(&self.base_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
            .map_err(|source| InvokeError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let waited = wait_with_timeout(&mut child, self.timeout);
        // Descendants left behind would hold the pipes open and block the readers.
        kill_process_group(child.id());
        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);
        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::warn!(
                    %command,
                    timeout_secs = self.timeout.as_secs(),
                    "installer timed out"
                );
                return Err(InvokeError::TimedOut {
                    command,
                    timeout: self.timeout,
                    stdout,
                    stderr,
                });
            }
            Err(source) => return Err(InvokeError::Io { command, source }),
        };

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis(),
            stdout_bytes = stdout.len(),
            exit = ?status.code(),
            "installer finished"
        );

        if !status.success() {
            return Err(InvokeError::Exit {
                command,
                status,
                stdout,
                stderr,
            });
        }
        Ok(stdout)
    }
}

/// Poll until exit or timeout. On timeout the child's whole process group is
/// killed and `None` returned.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() > timeout {
            kill_process_group(child.id());
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// SIGKILL every process in the group led by `pgid`. A group that is already
/// gone is not an error.
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    #[allow(unsafe_code)]
    let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::debug!(pgid, error = %err, "failed to kill installer process group");
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let bytes = handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, body: &str) {
        let path = dir.join("install.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
    }

    fn installer(dir: &Path, timeout: Duration) -> Installer {
        Installer {
            base_dir: dir.to_path_buf(),
            script: "install.sh".to_string(),
            timeout,
        }
    }

    fn sh_available() -> bool {
        Path::new("/bin/sh").is_file()
    }

    #[test]
    fn command_line_quotes_target() {
        let installer = installer(Path::new("/repo"), Duration::from_secs(1));
        assert_eq!(
            installer.command_line(Path::new("/tmp/a b.testtarget")),
            "./install.sh -s -t '/tmp/a b.testtarget'"
        );
    }

    #[test]
    fn captures_stdout_and_passes_flags() {
        if !sh_available() {
            return;
        }
        let dir = tempfile::tempdir().expect("create temp dir");
        write_script(dir.path(), r#"echo "args: $1 $2 $3"; echo "cwd: $(pwd)""#);
        let output = installer(dir.path(), Duration::from_secs(10))
            .invoke(Path::new("/tmp/x.testtarget"))
            .expect("invoke");
        let cwd = dir.path().canonicalize().expect("canonical");
        assert!(output.contains("args: -s -t /tmp/x.testtarget"));
        assert!(output.contains(&format!("cwd: {}", cwd.display())));
    }

    #[test]
    fn nonzero_exit_is_an_error_with_output() {
        if !sh_available() {
            return;
        }
        let dir = tempfile::tempdir().expect("create temp dir");
        write_script(dir.path(), "echo partial; echo broken >&2; exit 3");
        let err = installer(dir.path(), Duration::from_secs(10))
            .invoke(Path::new("/tmp/x.testtarget"))
            .unwrap_err();
        assert!(matches!(err, InvokeError::Exit { .. }));
        assert_eq!(err.stdout(), Some("partial\n"));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn hang_is_reported_as_timeout() {
        if !sh_available() {
            return;
        }
        let dir = tempfile::tempdir().expect("create temp dir");
        write_script(dir.path(), "echo started; exec sleep 30");
        let err = installer(dir.path(), Duration::from_millis(200))
            .invoke(Path::new("/tmp/x.testtarget"))
            .unwrap_err();
        assert!(matches!(err, InvokeError::TimedOut { .. }));
        assert_eq!(err.stdout(), Some("started\n"));
    }

    #[test]
    fn hang_in_a_child_process_is_cut_off_at_the_timeout() {
        if !sh_available() {
            return;
        }
        let dir = tempfile::tempdir().expect("create temp dir");
        write_script(dir.path(), "echo started; sleep 30; echo finished");
        let start = Instant::now();
        let err = installer(dir.path(), Duration::from_millis(200))
            .invoke(Path::new("/tmp/x.testtarget"))
            .unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(matches!(err, InvokeError::TimedOut { .. }));
        assert_eq!(err.stdout(), Some("started\n"));
    }

    #[test]
    fn background_descendants_do_not_block_a_clean_exit() {
        if !sh_available() {
            return;
        }
        let dir = tempfile::tempdir().expect("create temp dir");
        write_script(dir.path(), "sleep 30 &\necho done");
        let start = Instant::now();
        let output = installer(dir.path(), Duration::from_secs(20))
            .invoke(Path::new("/tmp/x.testtarget"))
            .expect("invoke");
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(output, "done\n");
    }

    #[test]
    fn missing_script_fails_to_spawn() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = installer(dir.path(), Duration::from_secs(1))
            .invoke(Path::new("/tmp/x.testtarget"))
            .unwrap_err();
        assert!(matches!(err, InvokeError::Spawn { .. }));
    }
}
