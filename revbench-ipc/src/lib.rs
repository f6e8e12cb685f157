#![warn(missing_docs)]
//! revbench IPC Protocol
//!
//! Binary protocol between the harness and the isolated worker process.
//! Messages are archived with rkyv and validated on receipt.

mod framing;
mod messages;

pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, read_frame, write_frame};
pub use messages::{
    BackendOption, FailureKind, RunOutcome, RunSpec, SupervisorCommand, WorkerCapabilities,
    WorkerMessage,
};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Backend option naming the file the worker writes its trace to
pub const TRACE_OUTPUT_OPTION: &str = "trace.output";

/// File descriptor the worker reads commands from
pub const COMMAND_FD: i32 = 3;

/// File descriptor the worker writes messages to
pub const MESSAGE_FD: i32 = 4;
