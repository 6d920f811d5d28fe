use std::io;

/// Cumulative bytes moved through the block layer since process start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IoStats {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

pub trait PlatformExtensions {
    /// `ErrorKind::NotFound` means the process no longer exists; any other
    /// error leaves the process alive but unreadable.
    fn process_io(pid: u32) -> io::Result<IoStats>;
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn process_io(pid: u32) -> io::Result<IoStats> {
    platform_impl::Platform::process_io(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_io_is_readable() {
        let pid = std::process::id();
        assert!(process_io(pid).is_ok());
    }
}
