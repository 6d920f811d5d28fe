use std::io;

use windows_sys::Win32::{
    Foundation::{CloseHandle, ERROR_INVALID_PARAMETER},
    System::Threading::{GetProcessIoCounters, IO_COUNTERS, OpenProcess, PROCESS_QUERY_INFORMATION},
};

use super::{IoStats, PlatformExtensions};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn process_io(pid: u32) -> io::Result<IoStats> {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_INFORMATION, 0, pid);
            if handle.is_null() {
                let err = io::Error::last_os_error();
                // OpenProcess reports an unknown pid as an invalid parameter.
                if err.raw_os_error() == Some(ERROR_INVALID_PARAMETER as i32) {
                    return Err(io::Error::new(io::ErrorKind::NotFound, err));
                }
                return Err(err);
            }
            let mut counters = std::mem::zeroed::<IO_COUNTERS>();
            let ok = GetProcessIoCounters(handle, &mut counters);
            let err = io::Error::last_os_error();
            CloseHandle(handle);
            if ok == 0 {
                return Err(err);
            }
            Ok(IoStats {
                read_bytes: counters.ReadTransferCount,
                write_bytes: counters.WriteTransferCount,
            })
        }
    }
}
