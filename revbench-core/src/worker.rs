//! Worker Process Entry Point
//!
//! The isolated side of the harness. Commands arrive on an inherited descriptor pair
//! named by [`IPC_FD_ENV`] so that stdout and stderr stay free: anything the
//! subject prints there is reported by the harness as noise.

use crate::measure::pin_to_cpu;
use crate::run::execute_run;
use revbench_ipc::{
    FrameError, FrameReader, FrameWriter, SupervisorCommand, WorkerCapabilities, WorkerMessage,
};

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// Environment variable carrying `<read_fd>,<write_fd>`
pub const IPC_FD_ENV: &str = "REVBENCH_IPC_FD";

enum IpcTransport {
    #[cfg(unix)]
    Fds { read_fd: i32, write_fd: i32 },
    Stdio,
}

fn detect_transport() -> IpcTransport {
    #[cfg(unix)]
    if let Ok(val) = std::env::var(IPC_FD_ENV) {
        if let Some((r, w)) = val.split_once(',') {
            if let (Ok(read_fd), Ok(write_fd)) = (r.parse::<i32>(), w.parse::<i32>()) {
                return IpcTransport::Fds { read_fd, write_fd };
            }
        }
    }
    IpcTransport::Stdio
}

/// Worker main loop
pub struct WorkerMain {
    reader: FrameReader<Box<dyn std::io::Read>>,
    writer: FrameWriter<Box<dyn std::io::Write>>,
}

impl WorkerMain {
    /// Attach to the descriptors named by [`IPC_FD_ENV`], or stdin/stdout without it
    pub fn new() -> Self {
        match detect_transport() {
            #[cfg(unix)]
            IpcTransport::Fds { read_fd, write_fd } => {
                // SAFETY: the harness hands these descriptors to this process only
                let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                Self::from_streams(Box::new(read_file), Box::new(write_file))
            }
            IpcTransport::Stdio => {
                Self::from_streams(Box::new(std::io::stdin()), Box::new(std::io::stdout()))
            }
        }
    }

    /// Serve over arbitrary streams
    pub fn from_streams(reader: Box<dyn std::io::Read>, writer: Box<dyn std::io::Write>) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    /// Answer run commands until shutdown or the harness hangs up
    pub fn run(&mut self) -> Result<(), FrameError> {
        // panics are reported over IPC; the default hook would print them as noise
        std::panic::set_hook(Box::new(|_| {}));

        self.writer.write(&WorkerMessage::Hello(WorkerCapabilities {
            has_alloc_tracking: crate::is_tracking_active(),
            ..WorkerCapabilities::default()
        }))?;

        let _ = pin_to_cpu(0);

        loop {
            let command: SupervisorCommand = match self.reader.read() {
                Ok(command) => command,
                Err(FrameError::EndOfStream) => break,
                Err(e) => return Err(e),
            };

            match command {
                SupervisorCommand::Run(spec) => {
                    let message = match execute_run(&spec) {
                        Ok(outcome) => WorkerMessage::Outcome(outcome),
                        Err(failure) => WorkerMessage::Failure {
                            kind: failure.kind,
                            message: failure.message,
                            backtrace: failure.backtrace,
                        },
                    };
                    self.writer.write(&message)?;
                }
                SupervisorCommand::Shutdown => break,
            }
        }

        Ok(())
    }
}

impl Default for WorkerMain {
    fn default() -> Self {
        Self::new()
    }
}
