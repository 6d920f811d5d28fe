use std::io;

use super::{IoStats, PlatformExtensions};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn process_io(pid: u32) -> io::Result<IoStats> {
        let contents = std::fs::read_to_string(format!("/proc/{pid}/io")).map_err(|err| {
            // ESRCH: the task vanished between open and read.
            if err.raw_os_error() == Some(3) {
                io::Error::new(io::ErrorKind::NotFound, err)
            } else {
                err
            }
        })?;
        parse_proc_io(&contents)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed /proc io file"))
    }
}

fn parse_proc_io(contents: &str) -> Option<IoStats> {
    let mut read_bytes = None;
    let mut write_bytes = None;
    for line in contents.lines() {
        if let Some(val) = line.strip_prefix("read_bytes: ") {
            read_bytes = val.trim().parse().ok();
        } else if let Some(val) = line.strip_prefix("write_bytes: ") {
            write_bytes = val.trim().parse().ok();
        }
    }
    Some(IoStats {
        read_bytes: read_bytes?,
        write_bytes: write_bytes?,
    })
}
