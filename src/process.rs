//! Running external tools with a hard wall-clock limit

use crate::error::ToolError;
use std::io::{ErrorKind, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// How often a running child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long stderr is drained after the child exits
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Exit status and captured stderr of a finished tool run
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stderr: String,
}

/// Run `command` to completion, killing it once `timeout` elapses
///
/// stdout is discarded and stdin is closed. stderr is drained on a helper
/// thread so a chatty child cannot fill the pipe and stall. The deadline
/// also bounds that drain: a background grandchild holding stderr open
/// cannot keep the call waiting.
pub fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<ToolOutput, ToolError> {
    let program = command.get_program().to_string_lossy().into_owned();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| match source.kind() {
        ErrorKind::NotFound => ToolError::NotFound {
            program: program.clone(),
        },
        _ => ToolError::Spawn {
            program: program.clone(),
            source,
        },
    })?;

    let (tx, stderr_chunks) = mpsc::channel::<Vec<u8>>();
    match child.stderr.take() {
        Some(mut pipe) => {
            thread::spawn(move || {
                let mut buf = [0u8; 4096];
                loop {
                    match pipe.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if tx.send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
            });
        }
        None => drop(tx),
    }

    let deadline = Instant::now() + timeout;
    let status = loop {
        let polled = child.try_wait().map_err(|source| ToolError::Wait {
            program: program.clone(),
            source,
        })?;

        match polled {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                log::debug!("Killing {} after {:?}", program, timeout);
                let _ = child.kill();
                let _ = child.wait();
                // The stderr reader is left detached
                return Err(ToolError::Timeout { program, timeout });
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    };

    let drain_until = deadline.min(Instant::now() + STDERR_GRACE);
    let stderr = drain_stderr(&stderr_chunks, drain_until);

    Ok(ToolOutput { status, stderr })
}

/// Collect stderr until the pipe closes or `until` passes
fn drain_stderr(chunks: &Receiver<Vec<u8>>, until: Instant) -> String {
    let mut bytes = Vec::new();
    loop {
        let remaining = until.saturating_duration_since(Instant::now());
        match chunks.recv_timeout(remaining) {
            Ok(chunk) => bytes.extend(chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                log::debug!("stderr still open after the tool exited, not waiting for it");
                bytes.extend(chunks.try_iter().flatten());
                break;
            }
        }
    }
    String::from_utf8_lossy(&bytes).trim().to_string()
}
