//! External filter commands.
//!
//! A filter gets the page content on stdin and answers with the new content
//! on stdout. Stdout and stderr are drained on their own threads, so a child
//! that writes a lot before reading all of its input cannot deadlock us.

use crate::debug;
use anyhow::{Context, Result, anyhow, bail};
use std::{
    ffi::OsStr,
    io::{Read, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Output, Stdio},
    thread,
    time::{Duration, Instant},
};

/// How often a child under a timeout is polled.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Find `program` on `PATH`, falling back to a script next to the config.
pub fn resolve_program(program: &str, base: &Path) -> Result<PathBuf> {
    which::which(program)
        .or_else(|_| which::which(base.join(program)))
        .map_err(|_| anyhow!("command '{program}' not found"))
}

/// Pipe `input` through `program args...`, running in `cwd`.
///
/// # Errors
/// Spawn failure, non-zero exit (the message carries stderr), or timeout.
pub fn run_filter(
    program: &Path,
    args: &[String],
    cwd: &Path,
    input: &[u8],
    timeout: Option<Duration>,
) -> Result<Vec<u8>> {
    let (name, mut command) = prepare(cwd, program, args)?;

    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child: Child = command
        .spawn()
        .with_context(|| format!("Failed to spawn `{name}`"))?;

    let mut stdin = child.stdin.take().context("Failed to acquire stdin")?;
    let mut stdout = child.stdout.take().context("Failed to acquire stdout")?;
    let mut stderr = child.stderr.take().context("Failed to acquire stderr")?;

    let input = input.to_vec();
    // Dropping stdin at the end of the closure signals EOF
    let writer = thread::spawn(move || stdin.write_all(&input));
    let out_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).map(|_| buf)
    });
    let err_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        stderr.read_to_end(&mut buf).map(|_| buf)
    });

    let status = wait(&mut child, &name, timeout)?;

    // A child may exit without reading its input; a broken pipe is fine then
    let _ = writer.join();
    let stdout = out_reader
        .join()
        .map_err(|_| anyhow!("stdout reader for `{name}` panicked"))?
        .with_context(|| format!("Failed to read stdout of `{name}`"))?;
    let stderr = err_reader
        .join()
        .map_err(|_| anyhow!("stderr reader for `{name}` panicked"))?
        .with_context(|| format!("Failed to read stderr of `{name}`"))?;

    let output = Output {
        status,
        stdout,
        stderr,
    };
    log_output(&name, &output)?;
    Ok(output.stdout)
}

/// Prepare a Command from components.
fn prepare(cwd: &Path, program: &Path, args: &[String]) -> Result<(String, Command)> {
    let name = program
        .file_name()
        .and_then(OsStr::to_str)
        .context("Empty command")?
        .to_owned();

    let mut command = Command::new(program);
    command.args(args).current_dir(cwd);

    Ok((name, command))
}

fn wait(child: &mut Child, name: &str, timeout: Option<Duration>) -> Result<ExitStatus> {
    let Some(limit) = timeout else {
        return child
            .wait()
            .with_context(|| format!("{name} process failed"));
    };

    let started = Instant::now();
    loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("{name} process failed"))?
        {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            bail!("Command `{name}` timed out after {:.1}s", limit.as_secs_f64());
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Fail on non-zero exit; otherwise surface stderr as debug output.
fn log_output(name: &str, output: &Output) -> Result<()> {
    if !output.status.success() {
        bail!(format_error(name, output));
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        debug!(name; "{line}");
    }
    Ok(())
}

fn format_error(name: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut msg = format!("Command `{name}` failed with {}", output.status);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        msg.push('\n');
        msg.push_str(stderr);
    }
    msg
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh() -> PathBuf {
        resolve_program("sh", Path::new("/")).unwrap()
    }

    #[test]
    fn test_resolve_missing_program() {
        let err = resolve_program("definitely-not-a-real-binary-xyz", Path::new("/")).unwrap_err();
        assert_eq!(err.to_string(), "command 'definitely-not-a-real-binary-xyz' not found");
    }

    #[test]
    fn test_resolve_falls_back_to_base() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("upper.sh");
        std::fs::write(&script, "#!/bin/sh\ntr a-z A-Z\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = resolve_program("upper.sh", dir.path()).unwrap();
        assert_eq!(found, script);

        let out = run_filter(&found, &[], dir.path(), b"shout", None).unwrap();
        assert_eq!(out, b"SHOUT");
    }

    #[test]
    fn test_run_filter_pipes_stdin() {
        let cat = resolve_program("cat", Path::new("/")).unwrap();
        let out = run_filter(&cat, &[], Path::new("/"), b"hello\nworld\n", None).unwrap();
        assert_eq!(out, b"hello\nworld\n");
    }

    #[test]
    fn test_run_filter_large_input() {
        let cat = resolve_program("cat", Path::new("/")).unwrap();
        let input = vec![b'x'; 1 << 20];
        let out = run_filter(&cat, &[], Path::new("/"), &input, None).unwrap();
        assert_eq!(out.len(), input.len());
    }

    #[test]
    fn test_run_filter_failure_includes_stderr() {
        let args = vec!["-c".to_owned(), "echo broken pipe dream >&2; exit 3".to_owned()];
        let err = run_filter(&sh(), &args, Path::new("/"), b"", None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed"), "{msg}");
        assert!(msg.contains("broken pipe dream"), "{msg}");
    }

    #[test]
    fn test_run_filter_timeout() {
        let args = vec!["-c".to_owned(), "exec sleep 5".to_owned()];
        let started = Instant::now();
        let err = run_filter(&sh(), &args, Path::new("/"), b"", Some(Duration::from_millis(100)))
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_run_filter_uses_cwd() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = vec!["-c".to_owned(), "pwd".to_owned()];
        let out = run_filter(&sh(), &args, dir.path(), b"", None).unwrap();
        let printed = String::from_utf8(out).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(std::fs::canonicalize(printed.trim()).unwrap(), expected);
    }
}
