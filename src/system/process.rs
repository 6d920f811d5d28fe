use std::collections::{HashMap, HashSet};

/// Identity of an OS process. The start time disambiguates recycled pids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessKey {
    pub pid: u32,
    pub start_time: u64,
}

/// Borrowed reference to an OS process plus the metadata cached when it was
/// discovered. Handles are cheap to clone; two handles for the same process
/// share a [`ProcessKey`] even when they come from different tree walks.
#[derive(Clone, Debug)]
pub struct ProcessHandle {
    pub pid: u32,
    pub start_time: u64,
    pub name: String,
}

impl ProcessHandle {
    pub fn new(pid: u32, start_time: u64, name: impl Into<String>) -> Self {
        Self {
            pid,
            start_time,
            name: name.into(),
        }
    }

    pub fn key(&self) -> ProcessKey {
        ProcessKey {
            pid: self.pid,
            start_time: self.start_time,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Sleeping,
    Idle,
    Stopped,
    Zombie,
    Dead,
    Other,
}

impl ProcessState {
    /// Zombie and dead processes will never produce another reading.
    pub fn has_exited(self) -> bool {
        matches!(self, ProcessState::Zombie | ProcessState::Dead)
    }
}

/// Descendants tracked for one run. Grows monotonically: a member stays in the
/// set even when a later enumeration no longer reports it.
#[derive(Clone, Debug, Default)]
pub struct ProcessSet {
    members: Vec<ProcessHandle>,
    keys: HashSet<ProcessKey>,
}

impl ProcessSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handle` unless a handle for the same process is already tracked.
    /// The existing handle is kept as-is.
    pub fn insert(&mut self, handle: ProcessHandle) -> bool {
        if !self.keys.insert(handle.key()) {
            return false;
        }
        self.members.push(handle);
        true
    }

    pub fn contains(&self, key: &ProcessKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &ProcessHandle> {
        self.members.iter()
    }

    pub fn keys(&self) -> &HashSet<ProcessKey> {
        &self.keys
    }
}

/// One row of the OS process table.
#[derive(Clone, Debug)]
pub struct ProcessEntry {
    pub pid: u32,
    pub ppid: u32,
    pub start_time: u64,
    pub name: String,
    pub children: Vec<u32>,
}

#[derive(Clone, Debug)]
pub struct ProcessTree {
    pub processes: HashMap<u32, ProcessEntry>,
}

impl ProcessTree {
    pub fn from_flat(entries: Vec<ProcessEntry>) -> Self {
        let mut by_pid = HashMap::with_capacity(entries.len());
        for mut entry in entries {
            // Build parent-child links from pid/ppid only.
            entry.children.clear();
            by_pid.insert(entry.pid, entry);
        }

        let pids: Vec<u32> = by_pid.keys().copied().collect();
        for pid in pids {
            let ppid = by_pid.get(&pid).map(|p| p.ppid).unwrap_or(0);
            if ppid == pid {
                continue;
            }
            if let Some(parent) = by_pid.get_mut(&ppid) {
                parent.children.push(pid);
            }
        }

        for entry in by_pid.values_mut() {
            entry.children.sort_unstable();
        }

        ProcessTree { processes: by_pid }
    }

    /// Every transitive child of `root`, breadth first, ascending pid within
    /// a level. Returns `None` when `root` is not in the table.
    pub fn descendants(&self, root: u32) -> Option<Vec<&ProcessEntry>> {
        let start = self.processes.get(&root)?;
        let mut out = Vec::new();
        let mut seen = HashSet::from([root]);
        let mut frontier: Vec<u32> = start.children.clone();

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for pid in frontier {
                if !seen.insert(pid) {
                    continue;
                }
                let Some(entry) = self.processes.get(&pid) else {
                    continue;
                };
                next.extend_from_slice(&entry.children);
                out.push(entry);
            }
            next.sort_unstable();
            frontier = next;
        }

        Some(out)
    }
}
