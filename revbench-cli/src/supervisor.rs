//! Process Isolation
//!
//! Every iteration runs in a fresh worker process: the harness re-executes a
//! binary with the worker flag, hands it a command pipe on fd 3 and a message pipe
//! on fd 4, and sends exactly one run command. The worker's stdout and stderr are
//! captured and returned as diagnostic output.

use crate::executor::{IsolatedOutcome, IsolationBackend, IsolationError};
use revbench_core::IPC_FD_ENV;
use revbench_ipc::{
    COMMAND_FD, FailureKind, FrameError, FrameReader, FrameWriter, MESSAGE_FD, PROTOCOL_VERSION,
    RunOutcome, RunSpec, SupervisorCommand, WorkerMessage,
};
use std::io::Read;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Command-line flag that switches a binary into worker mode
pub const WORKER_FLAG: &str = "--revbench-worker";

#[derive(Debug, Error)]
enum SupervisorError {
    #[error("failed to spawn worker: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("timed out")]
    Timeout,

    #[error("worker protocol error: expected {expected}, got {got}")]
    Protocol { expected: String, got: String },
}

impl From<FrameError> for SupervisorError {
    fn from(e: FrameError) -> Self {
        SupervisorError::Ipc(e.to_string())
    }
}

enum WorkerReply {
    Outcome(RunOutcome),
    Failure {
        kind: FailureKind,
        message: String,
        backtrace: Option<String>,
    },
}

#[derive(Debug)]
enum PollResult {
    DataAvailable,
    Timeout,
    PipeClosed,
    Error(std::io::Error),
}

fn wait_for_data(fd: RawFd, timeout: Duration) -> PollResult {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);

    // SAFETY: one valid pollfd for the duration of the call
    let result = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

    if result < 0 {
        PollResult::Error(std::io::Error::last_os_error())
    } else if result == 0 {
        PollResult::Timeout
    } else if pollfd.revents & libc::POLLIN != 0 {
        PollResult::DataAvailable
    } else if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        PollResult::PipeClosed
    } else {
        PollResult::Timeout
    }
}

/// Pipe with close-on-exec on both ends, as `(read, write)`
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    // SAFETY: fds has room for the two descriptors pipe() writes
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    for &fd in &fds {
        // SAFETY: fd was just returned by pipe()
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

fn close_fd(fd: RawFd) {
    // SAFETY: only called on descriptors this module owns
    unsafe {
        libc::close(fd);
    }
}

fn send_sigterm(pid: u32) {
    // SAFETY: kill() has no memory-safety preconditions
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

fn capture<R: Read + Send + 'static>(stream: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    stream.map(|mut stream| {
        std::thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = stream.read_to_end(&mut buffer);
            buffer
        })
    })
}

/// One worker process serving one run
struct WorkerHandle {
    child: Child,
    reader: FrameReader<std::fs::File>,
    writer: FrameWriter<std::fs::File>,
    msg_read_fd: RawFd,
    deadline: Instant,
    timeout: Duration,
    output: Vec<JoinHandle<Vec<u8>>>,
}

impl WorkerHandle {
    fn spawn(program: &Path, timeout: Duration) -> Result<Self, SupervisorError> {
        let (cmd_read, cmd_write) = create_pipe()?;
        let (msg_read, msg_write) = match create_pipe() {
            Ok(fds) => fds,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        let mut command = Command::new(program);
        command
            .arg(WORKER_FLAG)
            .env(IPC_FD_ENV, format!("{COMMAND_FD},{MESSAGE_FD}"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // SAFETY: only async-signal-safe libc calls between fork and exec
        unsafe {
            command.pre_exec(move || {
                if cmd_read != COMMAND_FD {
                    libc::dup2(cmd_read, COMMAND_FD);
                    libc::close(cmd_read);
                }
                let flags = libc::fcntl(COMMAND_FD, libc::F_GETFD);
                libc::fcntl(COMMAND_FD, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

                if msg_write != MESSAGE_FD {
                    libc::dup2(msg_write, MESSAGE_FD);
                    libc::close(msg_write);
                }
                let flags = libc::fcntl(MESSAGE_FD, libc::F_GETFD);
                libc::fcntl(MESSAGE_FD, libc::F_SETFD, flags & !libc::FD_CLOEXEC);

                libc::close(cmd_write);
                libc::close(msg_read);
                Ok(())
            });
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                for fd in [cmd_read, cmd_write, msg_read, msg_write] {
                    close_fd(fd);
                }
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        close_fd(cmd_read);
        close_fd(msg_write);

        let output = [capture(child.stdout.take()), capture(child.stderr.take())]
            .into_iter()
            .flatten()
            .collect();

        // SAFETY: the parent-side ends are owned here and nowhere else
        let writer_file = unsafe { std::fs::File::from_raw_fd(cmd_write) };
        let reader_file = unsafe { std::fs::File::from_raw_fd(msg_read) };

        Ok(Self {
            child,
            reader: FrameReader::new(reader_file),
            writer: FrameWriter::new(writer_file),
            msg_read_fd: msg_read,
            deadline: Instant::now() + timeout,
            timeout,
            output,
        })
    }

    /// Next message, bounded by the run deadline
    fn next_message(&mut self) -> Result<WorkerMessage, SupervisorError> {
        loop {
            if self.reader.has_buffered_data() {
                break;
            }
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SupervisorError::Timeout);
            }

            match wait_for_data(self.msg_read_fd, remaining.min(Duration::from_millis(100))) {
                PollResult::DataAvailable => break,
                PollResult::Timeout => {
                    if !self.is_alive() {
                        return Err(SupervisorError::WorkerCrashed(
                            "worker process exited unexpectedly".to_string(),
                        ));
                    }
                }
                PollResult::PipeClosed => {
                    return Err(SupervisorError::WorkerCrashed(
                        "worker pipe closed unexpectedly".to_string(),
                    ));
                }
                PollResult::Error(e) => {
                    return Err(SupervisorError::WorkerCrashed(format!("pipe error: {e}")));
                }
            }
        }

        match self.reader.read::<WorkerMessage>() {
            Ok(message) => Ok(message),
            Err(FrameError::EndOfStream) => Err(SupervisorError::WorkerCrashed(
                "worker closed connection unexpectedly".to_string(),
            )),
            Err(e) if !self.is_alive() => Err(SupervisorError::WorkerCrashed(format!(
                "worker crashed during read: {e}"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn wait_for_hello(&mut self) -> Result<(), SupervisorError> {
        match self.next_message()? {
            WorkerMessage::Hello(caps) if caps.protocol_version == PROTOCOL_VERSION => {
                debug!(pid = caps.pid, alloc_tracking = caps.has_alloc_tracking, "worker ready");
                Ok(())
            }
            WorkerMessage::Hello(caps) => Err(SupervisorError::Protocol {
                expected: format!("protocol version {PROTOCOL_VERSION}"),
                got: format!("protocol version {}", caps.protocol_version),
            }),
            other => Err(SupervisorError::Protocol {
                expected: "Hello".to_string(),
                got: format!("{other:?}"),
            }),
        }
    }

    fn run(&mut self, spec: &RunSpec) -> Result<WorkerReply, SupervisorError> {
        self.writer.write(&SupervisorCommand::Run(spec.clone()))?;

        let reply = match self.next_message() {
            Err(SupervisorError::Timeout) => {
                self.terminate();
                return Err(SupervisorError::Timeout);
            }
            other => other?,
        };

        match reply {
            WorkerMessage::Outcome(outcome) => Ok(WorkerReply::Outcome(outcome)),
            WorkerMessage::Failure {
                kind,
                message,
                backtrace,
            } => Ok(WorkerReply::Failure {
                kind,
                message,
                backtrace,
            }),
            WorkerMessage::Hello(_) => Err(SupervisorError::Protocol {
                expected: "Outcome/Failure".to_string(),
                got: "Hello".to_string(),
            }),
        }
    }

    /// SIGTERM, a short grace period, then SIGKILL
    fn terminate(&mut self) {
        if !self.is_alive() {
            return;
        }
        send_sigterm(self.child.id());
        let grace = Instant::now() + Duration::from_millis(500);
        while Instant::now() < grace {
            if !self.is_alive() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    /// Shut the worker down and return everything it printed
    fn finish(mut self) -> String {
        if self.is_alive() {
            let _ = self.writer.write(&SupervisorCommand::Shutdown);
            let exit_deadline = Instant::now() + self.timeout.min(Duration::from_secs(1));
            while self.is_alive() && Instant::now() < exit_deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            self.terminate();
        }
        let _ = self.child.wait();

        let mut output = Vec::new();
        for handle in self.output.drain(..) {
            match handle.join() {
                Ok(bytes) => output.extend(bytes),
                Err(_) => warn!("output capture thread panicked"),
            }
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Runs each iteration in a fresh worker process
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    program: PathBuf,
    timeout: Duration,
}

impl ProcessBackend {
    /// Re-execute `program` in worker mode, aborting runs after `timeout`
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Re-execute the running binary
    pub fn current_exe(timeout: Duration) -> Result<Self, IsolationError> {
        std::env::current_exe()
            .map(|program| Self::new(program, timeout))
            .map_err(|e| IsolationError::Launch(format!("cannot locate own binary: {e}")))
    }

    /// Binary re-executed for each run
    pub fn program(&self) -> &Path {
        &self.program
    }
}

fn with_output(message: String, output: &str) -> String {
    if output.is_empty() {
        message
    } else {
        format!("{message}\n{output}")
    }
}

impl IsolationBackend for ProcessBackend {
    fn name(&self) -> &'static str {
        "process"
    }

    fn run(&self, spec: &RunSpec) -> Result<IsolatedOutcome, IsolationError> {
        let mut worker = WorkerHandle::spawn(&self.program, self.timeout).map_err(|e| {
            IsolationError::Launch(format!("{}: {e}", self.program.display()))
        })?;

        if let Err(e) = worker.wait_for_hello() {
            let output = worker.finish();
            return Err(IsolationError::Launch(with_output(
                format!("{}: {e}", self.program.display()),
                &output,
            )));
        }

        let reply = worker.run(spec);
        let diagnostic_output = worker.finish();

        match reply {
            Ok(WorkerReply::Outcome(outcome)) => Ok(IsolatedOutcome {
                time_us: outcome.time_us,
                memory_bytes: outcome.memory_bytes,
                diagnostic_output,
            }),
            Ok(WorkerReply::Failure {
                kind,
                message,
                backtrace,
            }) => Err(IsolationError::RunFailed {
                kind,
                message,
                backtrace,
                diagnostic_output,
            }),
            Err(SupervisorError::Timeout) => Err(IsolationError::Aborted {
                reason: format!("timed out after {:?}", self.timeout),
                diagnostic_output,
            }),
            Err(e) => Err(IsolationError::Aborted {
                reason: e.to_string(),
                diagnostic_output,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> RunSpec {
        RunSpec::new("bench", "subject", "{}", 1, 0)
    }

    #[test]
    fn test_missing_program_is_launch_error() {
        let backend = ProcessBackend::new("/nonexistent/revbench-worker", Duration::from_secs(1));
        let err = backend.run(&spec()).unwrap_err();
        assert!(matches!(err, IsolationError::Launch(_)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_worker_program_output_is_reported() {
        // echo prints its arguments and exits without a handshake
        let backend = ProcessBackend::new("/bin/echo", Duration::from_secs(5));
        match backend.run(&spec()) {
            Err(IsolationError::Launch(message)) => assert!(message.contains(WORKER_FLAG)),
            other => panic!("expected launch error, got {other:?}"),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_silent_hang_times_out() {
        // sleep never answers the handshake
        let backend = ProcessBackend::new("/bin/sleep", Duration::from_millis(300));
        let started = Instant::now();
        assert!(backend.run(&spec()).is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
