use thiserror::Error;

use super::process::{ProcessHandle, ProcessState};

/// One process's counters at a single instant. I/O counters are cumulative
/// since the process started.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub mem_resident_bytes: u64,
    pub mem_virtual_bytes: u64,
    pub io_read_bytes: u64,
    pub io_write_bytes: u64,
}

impl ResourceSample {
    /// Adds `other` into `self`; counters saturate instead of wrapping.
    pub fn merge(&mut self, other: &ResourceSample) {
        self.cpu_percent += other.cpu_percent;
        self.mem_resident_bytes = self.mem_resident_bytes.saturating_add(other.mem_resident_bytes);
        self.mem_virtual_bytes = self.mem_virtual_bytes.saturating_add(other.mem_virtual_bytes);
        self.io_read_bytes = self.io_read_bytes.saturating_add(other.io_read_bytes);
        self.io_write_bytes = self.io_write_bytes.saturating_add(other.io_write_bytes);
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The process exited, turned into a zombie, or its pid was recycled.
    #[error("process {pid} is gone")]
    ProcessGone { pid: u32 },

    #[error("failed to enumerate children of process {pid}: {reason}")]
    Enumeration { pid: u32, reason: String },

    /// Permission or OS error on a process that still exists.
    #[error("failed to read process {pid}: {reason}")]
    Transient { pid: u32, reason: String },
}

impl ProbeError {
    pub fn is_gone(&self) -> bool {
        matches!(self, ProbeError::ProcessGone { .. })
    }
}

/// Which part of the process table a tick needs refreshed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshScope {
    Root(u32),
    All,
}

/// Source of per-process readings.
///
/// CPU readings are relative to the previous [`ProcessProbe::refresh`], so the
/// sampling loop refreshes exactly once per tick and reads each process at
/// most once afterwards.
pub trait ProcessProbe {
    /// Resolves a live pid into a handle for the rest of the run.
    fn attach(&mut self, pid: u32) -> Result<ProcessHandle, ProbeError>;

    fn refresh(&mut self, scope: RefreshScope);

    fn status(&mut self, handle: &ProcessHandle) -> Result<ProcessState, ProbeError>;

    /// Fails with [`ProbeError::ProcessGone`] for exited or zombie processes.
    fn read(&mut self, handle: &ProcessHandle) -> Result<ResourceSample, ProbeError>;

    /// Current transitive children of `root`, as fresh handles.
    fn descendants(&mut self, root: &ProcessHandle) -> Result<Vec<ProcessHandle>, ProbeError>;
}
