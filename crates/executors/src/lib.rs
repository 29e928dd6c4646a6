//! Worker invocation gateway.
//!
//! Recognition and spreadsheet generation run as external programs. This
//! crate spawns one child process per job, drains its output while it runs,
//! and classifies the outcome into a [`gateway::WorkerOutput`] or a
//! [`gateway::WorkerFailure`].

pub mod command;
pub mod gateway;

pub use command::{EnvPolicy, WorkerCommand};
pub use gateway::{
    Expectation, FailureKind, InvocationSpec, ProcessGateway, WorkerFailure, WorkerGateway,
    WorkerOutput,
};
