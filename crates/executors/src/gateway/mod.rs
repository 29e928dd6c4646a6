mod capture;
mod process;

use std::{io, path::PathBuf, time::Duration};

use async_trait::async_trait;
use board::Grid;
use bon::Builder;
use thiserror::Error;

use crate::command::EnvPolicy;

pub use process::ProcessGateway;

/// What a successful job must leave behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Board JSON on stdout, with or without a header object.
    RecognitionJson,
    /// A non-empty file at the given path; stdout is ignored.
    OutputFile(PathBuf),
}

/// One external job.
#[derive(Debug, Clone, Builder)]
pub struct InvocationSpec {
    #[builder(into)]
    pub program: String,
    #[builder(default)]
    pub args: Vec<String>,
    #[builder(default)]
    pub env: EnvPolicy,
    pub expectation: Expectation,
    /// Wall-clock ceiling; the process group is killed when it is reached.
    pub timeout: Option<Duration>,
    pub current_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutput {
    Grid(Grid),
    File { path: PathBuf, len: u64 },
}

impl WorkerOutput {
    pub fn into_grid(self) -> Option<Grid> {
        match self {
            WorkerOutput::Grid(grid) => Some(grid),
            WorkerOutput::File { .. } => None,
        }
    }
}

/// Coarse class of a [`WorkerFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The program could not be started.
    Launch,
    /// The program ran and failed, or ran too long.
    Execution,
    /// The program exited cleanly but broke the output contract.
    Protocol,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Launch => "launch",
            FailureKind::Execution => "execution",
            FailureKind::Protocol => "protocol",
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkerFailure {
    #[error("failed to start worker `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed while waiting for worker: {0}")]
    Wait(#[source] io::Error),
    #[error("worker exited with {}: {stderr}", exit_label(.code))]
    Exit { code: Option<i32>, stderr: String },
    #[error("worker timed out after {}s: {stderr}", .after.as_secs())]
    TimedOut { after: Duration, stderr: String },
    #[error("worker output is not valid board JSON ({reason}); output: {raw}")]
    MalformedOutput { reason: String, raw: String },
    #[error("worker did not produce output file {}", .path.display())]
    MissingOutput { path: PathBuf },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl WorkerFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            WorkerFailure::Launch { .. } => FailureKind::Launch,
            WorkerFailure::Wait(_) | WorkerFailure::Exit { .. } | WorkerFailure::TimedOut { .. } => {
                FailureKind::Execution
            }
            WorkerFailure::MalformedOutput { .. } | WorkerFailure::MissingOutput { .. } => {
                FailureKind::Protocol
            }
        }
    }
}

/// Runs one external job to completion.
///
/// Implementations hold no per-job state; each call is independent and
/// callers decide how many may run at once.
#[async_trait]
pub trait WorkerGateway: Send + Sync {
    async fn invoke(&self, spec: InvocationSpec) -> Result<WorkerOutput, WorkerFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kinds() {
        let launch = WorkerFailure::Launch {
            program: "python3".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(launch.kind(), FailureKind::Launch);

        let exit = WorkerFailure::Exit {
            code: Some(1),
            stderr: "model load error".into(),
        };
        assert_eq!(exit.kind(), FailureKind::Execution);
        assert_eq!(exit.kind().as_str(), "execution");
        assert_eq!(exit.to_string(), "worker exited with code 1: model load error");

        let missing = WorkerFailure::MissingOutput {
            path: PathBuf::from("uploads/out.xlsx"),
        };
        assert_eq!(missing.kind(), FailureKind::Protocol);
        assert!(missing.to_string().contains("uploads/out.xlsx"));
    }

    #[test]
    fn test_builder_defaults() {
        let spec = InvocationSpec::builder()
            .program("worker")
            .expectation(Expectation::RecognitionJson)
            .build();
        assert!(spec.args.is_empty());
        assert_eq!(spec.env, EnvPolicy::default());
        assert!(spec.timeout.is_none());
    }
}
