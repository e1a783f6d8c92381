//! Runs a benchmark in a child process.
//!
//! The parent re-executes the harness binary in worker mode, writes one JSON
//! [`BenchmarkRequest`] to the child's stdin, and reads one JSON
//! [`WorkerResponse`] from its stdout. The child's stderr is inherited so its
//! logs reach the terminal. A child that outlives the timeout is killed.

use super::benchmark_runner::execute_benchmark;
use super::benchmark_types::{BenchmarkRequest, FrameworkMetrics};
use crate::errors::{IsolationError, IsolationResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Hidden flag that switches the harness binary into worker mode.
pub const WORKER_FLAG: &str = "--worker";

/// How to launch a worker process.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl WorkerCommand {
    /// Re-executes the running binary with [`WORKER_FLAG`].
    pub fn current_exe(timeout: Duration) -> IsolationResult<Self> {
        let program = std::env::current_exe().map_err(|source| IsolationError::Spawn {
            program: "<current executable>".to_string(),
            source,
        })?;
        Ok(Self {
            program,
            args: vec![WORKER_FLAG.to_string()],
            timeout,
        })
    }
}

/// Single message a worker writes to stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerResponse {
    Completed { metrics: FrameworkMetrics },
    Failed { message: String },
}

/// Parent side: spawns the worker, exchanges one request/response pair, and
/// enforces the timeout.
pub fn run_isolated(
    request: &BenchmarkRequest,
    command: &WorkerCommand,
) -> IsolationResult<WorkerResponse> {
    let payload = serde_json::to_vec(request).map_err(|e| IsolationError::Protocol {
        message: e.to_string(),
    })?;

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| IsolationError::Spawn {
            program: command.program.display().to_string(),
            source,
        })?;
    debug!("Spawned worker pid {}", child.id());

    let missing_pipe = || IsolationError::Pipe {
        source: std::io::Error::other("worker pipe was not captured"),
    };
    let mut stdin = child.stdin.take().ok_or_else(missing_pipe)?;
    let mut stdout = child.stdout.take().ok_or_else(missing_pipe)?;

    // Both directions run on their own threads so a stalled child cannot
    // block the parent past the deadline.
    let writer = thread::spawn(move || stdin.write_all(&payload));
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let result = stdout.read_to_end(&mut buffer).map(|_| buffer);
        let _ = sender.send(result);
    });

    // A timeout past the end of the clock means no deadline.
    let deadline = Instant::now().checked_add(command.timeout);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if deadline.is_some_and(|deadline| Instant::now() >= deadline) => {
                warn!(
                    "Worker exceeded {}s, killing pid {}",
                    command.timeout.as_secs(),
                    child.id()
                );
                let _ = child.kill();
                let _ = child.wait();
                return Err(IsolationError::Timeout {
                    seconds: command.timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(IsolationError::Pipe { source });
            }
        }
    };

    if let Ok(Err(e)) = writer.join() {
        debug!("Worker closed stdin early: {}", e);
    }

    if !status.success() {
        return Err(IsolationError::ChildExited {
            status: status.to_string(),
        });
    }

    let output = receiver
        .recv()
        .map_err(|e| IsolationError::Protocol {
            message: e.to_string(),
        })?
        .map_err(|source| IsolationError::Pipe { source })?;

    serde_json::from_slice(&output).map_err(|e| IsolationError::Protocol {
        message: format!("invalid worker response: {}", e),
    })
}

/// Child side: reads one request from `input`, runs it on this thread, and
/// writes one response to `output`.
pub fn serve_worker<R: Read, W: Write>(input: R, mut output: W) -> IsolationResult<()> {
    let request: BenchmarkRequest =
        serde_json::from_reader(input).map_err(|e| IsolationError::Protocol {
            message: format!("invalid worker request: {}", e),
        })?;

    let response = match execute_benchmark(&request) {
        Ok(metrics) => WorkerResponse::Completed { metrics },
        Err(e) => WorkerResponse::Failed {
            message: e.to_string(),
        },
    };

    serde_json::to_writer(&mut output, &response).map_err(|e| IsolationError::Protocol {
        message: e.to_string(),
    })?;
    output
        .flush()
        .map_err(|source| IsolationError::Pipe { source })
}
