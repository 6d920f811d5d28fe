use std::io;

use libproc::libproc::pid_rusage::{RUsageInfoV2, pidrusage};

use super::{IoStats, PlatformExtensions};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn process_io(pid: u32) -> io::Result<IoStats> {
        let usage = pidrusage::<RUsageInfoV2>(pid as i32).map_err(|msg| {
            // proc_pid_rusage fails with ESRCH for pids that are gone.
            if msg.contains("No such process") {
                io::Error::new(io::ErrorKind::NotFound, msg)
            } else {
                io::Error::other(msg)
            }
        })?;
        Ok(IoStats {
            read_bytes: usage.ri_diskio_bytesread,
            write_bytes: usage.ri_diskio_byteswritten,
        })
    }
}
