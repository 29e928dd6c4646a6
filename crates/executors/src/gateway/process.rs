use std::{process::Stdio, time::Instant};

use async_trait::async_trait;
use board::{Grid, NormalizedInput};
use command_group::AsyncCommandGroup;
use tokio::process::Command;

use super::{
    Expectation, InvocationSpec, WorkerFailure, WorkerGateway, WorkerOutput,
    capture::{self, Capture, Pipe},
};

/// Longest stdout excerpt carried in a malformed-output failure.
const STDOUT_EXCERPT_CHARS: usize = 2_000;
/// Longest stderr excerpt carried in exit and timeout failures.
const STDERR_EXCERPT_CHARS: usize = 4_000;

/// [`WorkerGateway`] backed by OS processes.
///
/// Each invocation spawns the worker in its own process group so a timeout
/// can take down anything the worker started itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessGateway;

impl ProcessGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkerGateway for ProcessGateway {
    async fn invoke(&self, spec: InvocationSpec) -> Result<WorkerOutput, WorkerFailure> {
        let mut command = Command::new(&spec.program);
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .args(&spec.args);
        spec.env.apply(&mut command);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let started = Instant::now();
        tracing::info!("Starting worker {} ({} args)", spec.program, spec.args.len());

        let mut child = command.group_spawn().map_err(|source| {
            tracing::error!("Failed to start worker {}: {}", spec.program, source);
            WorkerFailure::Launch {
                program: spec.program.clone(),
                source,
            }
        })?;

        let stdout = child
            .inner()
            .stdout
            .take()
            .map(|pipe| Capture::spawn(pipe, Pipe::Stdout, spec.program.clone()));
        let stderr = child
            .inner()
            .stderr
            .take()
            .map(|pipe| Capture::spawn(pipe, Pipe::Stderr, spec.program.clone()));

        let waited = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(waited) => waited,
                Err(_) => {
                    tracing::warn!(
                        "Worker {} exceeded {}s, killing process group",
                        spec.program,
                        limit.as_secs()
                    );
                    if let Err(e) = child.kill().await {
                        tracing::warn!("Failed to kill worker {}: {}", spec.program, e);
                    }
                    let stderr = capture::finish(stderr).await;
                    return Err(WorkerFailure::TimedOut {
                        after: limit,
                        stderr: capture::tail(stderr.trim(), STDERR_EXCERPT_CHARS),
                    });
                }
            },
            None => child.wait().await,
        };
        let status = waited.map_err(WorkerFailure::Wait)?;

        // anything the worker left behind may still hold the pipes open
        if let Err(e) = child.kill().await {
            tracing::debug!("Process group of {} already gone: {}", spec.program, e);
        }

        let stdout = capture::finish(stdout).await;
        let stderr = capture::finish(stderr).await;
        let elapsed = started.elapsed().as_millis();

        if !status.success() {
            tracing::warn!(
                "Worker {} failed after {}ms with status {:?}",
                spec.program,
                elapsed,
                status.code()
            );
            return Err(WorkerFailure::Exit {
                code: status.code(),
                stderr: capture::tail(stderr.trim(), STDERR_EXCERPT_CHARS),
            });
        }
        tracing::info!("Worker {} finished in {}ms", spec.program, elapsed);

        match spec.expectation {
            Expectation::RecognitionJson => parse_board(&stdout).map(WorkerOutput::Grid),
            Expectation::OutputFile(path) => match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(WorkerOutput::File {
                    path,
                    len: meta.len(),
                }),
                _ => {
                    tracing::warn!(
                        "Worker {} exited cleanly without writing {}",
                        spec.program,
                        path.display()
                    );
                    Err(WorkerFailure::MissingOutput { path })
                }
            },
        }
    }
}

/// Parse recognizer stdout in either accepted shape.
pub fn parse_board(stdout: &str) -> Result<Grid, WorkerFailure> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(WorkerFailure::MalformedOutput {
            reason: "worker wrote nothing to stdout".to_string(),
            raw: String::new(),
        });
    }
    serde_json::from_str::<NormalizedInput>(trimmed)
        .map(Grid::from)
        .map_err(|e| WorkerFailure::MalformedOutput {
            reason: e.to_string(),
            raw: capture::head(trimmed, STDOUT_EXCERPT_CHARS),
        })
}
