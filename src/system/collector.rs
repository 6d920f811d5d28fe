use std::io;

use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::trace;

use super::platform;
use super::process::{ProcessEntry, ProcessHandle, ProcessState, ProcessTree};
use super::snapshot::{ProbeError, ProcessProbe, RefreshScope, ResourceSample};

/// [`ProcessProbe`] backed by `sysinfo`, with disk counters from the
/// platform layer.
pub struct SysinfoProbe {
    sys: System,
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh_kind());
        SysinfoProbe { sys }
    }

    /// Name of `pid` as of the last refresh.
    pub fn process_name(&self, pid: u32) -> Option<String> {
        self.sys
            .process(Pid::from_u32(pid))
            .map(|p| p.name().to_string_lossy().to_string())
    }

    /// Looks up the live process behind `handle`, rejecting recycled pids.
    fn live(&self, handle: &ProcessHandle) -> Result<&Process, ProbeError> {
        let gone = ProbeError::ProcessGone { pid: handle.pid };
        let process = self.sys.process(Pid::from_u32(handle.pid)).ok_or(gone)?;
        if process.start_time() != handle.start_time {
            return Err(ProbeError::ProcessGone { pid: handle.pid });
        }
        Ok(process)
    }

    fn process_table(&self) -> ProcessTree {
        let entries = self
            .sys
            .processes()
            .iter()
            // Userland threads share their owner's memory; never count them twice.
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                ppid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
                start_time: process.start_time(),
                name: process.name().to_string_lossy().to_string(),
                children: Vec::new(),
            })
            .collect();
        ProcessTree::from_flat(entries)
    }
}

/// Only a vanished process ends its series; anything else (including a
/// permission error) skips the process for this tick.
fn io_failure(pid: u32, err: io::Error) -> ProbeError {
    match err.kind() {
        io::ErrorKind::NotFound => ProbeError::ProcessGone { pid },
        _ => ProbeError::Transient {
            pid,
            reason: err.to_string(),
        },
    }
}

fn refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing().with_memory().with_cpu()
}

fn map_status(status: ProcessStatus) -> ProcessState {
    match status {
        ProcessStatus::Run => ProcessState::Running,
        ProcessStatus::Sleep => ProcessState::Sleeping,
        ProcessStatus::Idle => ProcessState::Idle,
        ProcessStatus::Stop => ProcessState::Stopped,
        ProcessStatus::Zombie => ProcessState::Zombie,
        ProcessStatus::Dead => ProcessState::Dead,
        _ => ProcessState::Other,
    }
}

impl ProcessProbe for SysinfoProbe {
    fn attach(&mut self, pid: u32) -> Result<ProcessHandle, ProbeError> {
        let sys_pid = Pid::from_u32(pid);
        self.sys
            .refresh_processes_specifics(ProcessesToUpdate::Some(&[sys_pid]), true, refresh_kind());
        let process = self
            .sys
            .process(sys_pid)
            .ok_or(ProbeError::ProcessGone { pid })?;
        Ok(ProcessHandle::new(
            pid,
            process.start_time(),
            process.name().to_string_lossy(),
        ))
    }

    fn refresh(&mut self, scope: RefreshScope) {
        let updated = match scope {
            RefreshScope::Root(pid) => self.sys.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[Pid::from_u32(pid)]),
                true,
                refresh_kind(),
            ),
            RefreshScope::All => {
                self.sys
                    .refresh_processes_specifics(ProcessesToUpdate::All, true, refresh_kind())
            }
        };
        trace!(?scope, updated, "process table refreshed");
    }

    fn status(&mut self, handle: &ProcessHandle) -> Result<ProcessState, ProbeError> {
        self.live(handle).map(|p| map_status(p.status()))
    }

    fn read(&mut self, handle: &ProcessHandle) -> Result<ResourceSample, ProbeError> {
        let process = self.live(handle)?;
        if map_status(process.status()).has_exited() {
            return Err(ProbeError::ProcessGone { pid: handle.pid });
        }
        let io = platform::process_io(handle.pid).map_err(|err| io_failure(handle.pid, err))?;

        Ok(ResourceSample {
            cpu_percent: process.cpu_usage(),
            mem_resident_bytes: process.memory(),
            mem_virtual_bytes: process.virtual_memory(),
            io_read_bytes: io.read_bytes,
            io_write_bytes: io.write_bytes,
        })
    }

    fn descendants(&mut self, root: &ProcessHandle) -> Result<Vec<ProcessHandle>, ProbeError> {
        self.live(root).map_err(|_| ProbeError::Enumeration {
            pid: root.pid,
            reason: "root is no longer in the process table".to_string(),
        })?;

        let tree = self.process_table();
        let children = tree
            .descendants(root.pid)
            .ok_or_else(|| ProbeError::Enumeration {
                pid: root.pid,
                reason: "root missing from process tree".to_string(),
            })?;

        Ok(children
            .into_iter()
            .map(|e| ProcessHandle::new(e.pid, e.start_time, e.name.clone()))
            .collect())
    }
}
