//! External command invocation.
//!
//! Every probe, rip and transcode shells out to an external tool. Commands
//! run either in capture mode (combined output buffered and returned
//! trimmed) or streaming mode (each output line forwarded to the log as it
//! arrives). No timeout is enforced; a hung tool hangs only the loop that
//! invoked it.

use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::thread;
use thiserror::Error;
use tracing::info;

/// Error type for external command invocations
#[derive(Debug, Error)]
pub enum CommandError {
    /// Process exited with non-zero status
    #[error("{command} exited with status {code}")]
    ExitStatus {
        command: String,
        code: i32,
        /// Captured output, empty in streaming mode
        output: String,
    },

    /// Process was terminated by a signal
    #[error("{command} was terminated by a signal")]
    Terminated { command: String },

    /// IO error spawning or reading from the process
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run a command and return its combined stdout/stderr, trimmed.
///
/// A non-zero exit yields `CommandError::ExitStatus` carrying the captured
/// output for diagnostics.
pub fn run_capture(command: &mut Command) -> Result<String, CommandError> {
    let name = program_name(command);
    let output = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let combined = combined.trim().to_string();

    if output.status.success() {
        Ok(combined)
    } else {
        match output.status.code() {
            Some(code) => Err(CommandError::ExitStatus {
                command: name,
                code,
                output: combined,
            }),
            None => Err(CommandError::Terminated { command: name }),
        }
    }
}

/// Run a command, forwarding each stdout/stderr line to the log as it
/// arrives. Returns no output; a non-zero exit is reported only after the
/// process has finished.
pub fn run_streaming(command: &mut Command) -> Result<(), CommandError> {
    let name = program_name(command);
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout_logger = child.stdout.take().map(|pipe| {
        let name = name.clone();
        thread::spawn(move || log_lines(&name, pipe))
    });
    let stderr_logger = child.stderr.take().map(|pipe| {
        let name = name.clone();
        thread::spawn(move || log_lines(&name, pipe))
    });

    let status = child.wait()?;

    for logger in [stdout_logger, stderr_logger].into_iter().flatten() {
        let _ = logger.join();
    }

    if status.success() {
        Ok(())
    } else {
        match status.code() {
            Some(code) => Err(CommandError::ExitStatus {
                command: name,
                code,
                output: String::new(),
            }),
            None => Err(CommandError::Terminated { command: name }),
        }
    }
}

fn log_lines<R: Read>(name: &str, pipe: R) {
    for line in BufReader::new(pipe).lines().map_while(Result::ok) {
        info!("[{}] {}", name, line);
    }
}

fn program_name(command: &Command) -> String {
    command.get_program().to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_returns_trimmed_output() {
        let mut cmd = Command::new("echo");
        cmd.arg("hello world");
        let out = run_capture(&mut cmd).unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn test_capture_combines_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo out; echo err 1>&2");
        let out = run_capture(&mut cmd).unwrap();
        assert!(out.contains("out"));
        assert!(out.contains("err"));
    }

    #[test]
    fn test_capture_nonzero_exit_carries_code_and_output() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo oops; exit 3");
        match run_capture(&mut cmd) {
            Err(CommandError::ExitStatus { code, output, .. }) => {
                assert_eq!(code, 3);
                assert!(output.contains("oops"));
            }
            other => panic!("expected ExitStatus error, got {:?}", other),
        }
    }

    #[test]
    fn test_streaming_succeeds_without_output() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo streamed line");
        assert!(run_streaming(&mut cmd).is_ok());
    }

    #[test]
    fn test_streaming_nonzero_exit() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 7");
        match run_streaming(&mut cmd) {
            Err(CommandError::ExitStatus { code, output, .. }) => {
                assert_eq!(code, 7);
                assert!(output.is_empty());
            }
            other => panic!("expected ExitStatus error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let mut cmd = Command::new("definitely-not-a-real-binary-name");
        match run_capture(&mut cmd) {
            Err(CommandError::Io(_)) => {}
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
