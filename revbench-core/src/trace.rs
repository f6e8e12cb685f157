//! Trace Artifacts
//!
//! With the trace backend enabled, the worker records every revolution and writes
//! the records as JSON lines. The trace executor reads them back and folds them
//! into results.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// One recorded call of the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Zero-based position in the loop, warmup included
    pub revolution: u64,
    /// Whether this call belongs to the warmup
    pub warmup: bool,
    /// Wall time of the call, in nanoseconds
    pub time_ns: u64,
    /// Live heap bytes above the pre-loop baseline after the call
    pub memory_bytes: u64,
}

/// Errors raised while writing or reading a trace
#[derive(Debug, Error)]
pub enum TraceError {
    /// The artifact could not be accessed
    #[error("trace artifact {path}: {source}")]
    Io {
        /// Artifact path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// A line is not a trace entry
    #[error("trace artifact {path}, line {line}: {source}")]
    Malformed {
        /// Artifact path
        path: String,
        /// One-based line number
        line: usize,
        /// Parse error
        source: serde_json::Error,
    },
}

/// Totals folded from a trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceSummary {
    /// Sum of all call times, in microseconds
    pub time_us: u64,
    /// Highest memory reading, in bytes
    pub memory_bytes: u64,
    /// Number of recorded calls
    pub calls: u64,
}

impl TraceSummary {
    /// Fold entries into totals
    pub fn from_entries(entries: &[TraceEntry]) -> Self {
        let time_ns: u64 = entries.iter().map(|entry| entry.time_ns).sum();
        Self {
            time_us: time_ns / 1_000,
            memory_bytes: entries.iter().map(|e| e.memory_bytes).max().unwrap_or(0),
            calls: entries.len() as u64,
        }
    }
}

pub(crate) fn write_trace(path: &Path, entries: &[TraceEntry]) -> Result<(), TraceError> {
    let io_err = |source| TraceError::Io {
        path: path.display().to_string(),
        source,
    };

    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    for entry in entries {
        serde_json::to_writer(&mut writer, entry).map_err(|e| io_err(e.into()))?;
        writer.write_all(b"\n").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

/// Read every entry of a trace artifact
pub fn read_trace(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let display = path.display().to_string();
    let file = File::open(path).map_err(|source| TraceError::Io {
        path: display.clone(),
        source,
    })?;

    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| TraceError::Io {
            path: display.clone(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|source| TraceError::Malformed {
            path: display.clone(),
            line: index + 1,
            source,
        })?;
        entries.push(entry);
    }
    Ok(entries)
}
