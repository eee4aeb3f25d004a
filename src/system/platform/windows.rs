use std::mem;
use std::path::PathBuf;

use windows_sys::Win32::Foundation::FILETIME;
use windows_sys::Win32::System::ProcessStatus::{K32GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS};
use windows_sys::Win32::System::Threading::{GetCurrentProcess, GetSystemTimes};

use super::{resident_with_fallback, sysinfo_host_memory};
use crate::SampleError;
use crate::system::memory::HostMemory;
use crate::system::source::CounterSource;
use crate::system::ticks::TickSnapshot;

const SYSTEM_TIMES: &str = "GetSystemTimes";
const PROCESS_MEMORY: &str = "GetProcessMemoryInfo";

/// Windows: system times for the aggregate, working set for the process.
///
/// No per-core or per-thread facility is read here, so the CPU chain stops
/// at the aggregate tier.
#[derive(Debug, Clone, Default)]
pub struct NativeSource;

impl NativeSource {
    pub fn new(_procfs_root: PathBuf) -> Self {
        NativeSource
    }
}

impl CounterSource for NativeSource {
    fn read_aggregate_ticks(&self) -> Result<TickSnapshot, SampleError> {
        let mut idle = zero_filetime();
        let mut kernel = zero_filetime();
        let mut user = zero_filetime();
        // SAFETY: all three pointers refer to live, writable FILETIMEs.
        let ok = unsafe { GetSystemTimes(&mut idle, &mut kernel, &mut user) };
        if ok == 0 {
            return Err(SampleError::unavailable(SYSTEM_TIMES, "call failed"));
        }
        let idle = filetime_ticks(&idle);
        // Kernel time includes idle time.
        let system = filetime_ticks(&kernel).saturating_sub(idle);
        Ok(TickSnapshot::new(filetime_ticks(&user), 0, system, idle))
    }

    fn read_host_memory(&self) -> Result<HostMemory, SampleError> {
        sysinfo_host_memory()
    }

    fn read_process_resident(&self) -> Result<u64, SampleError> {
        resident_with_fallback(working_set())
    }
}

fn working_set() -> Result<u64, SampleError> {
    // SAFETY: zeroed PROCESS_MEMORY_COUNTERS is a valid out-parameter and the
    // current-process pseudo handle needs no closing.
    unsafe {
        let mut counters = mem::zeroed::<PROCESS_MEMORY_COUNTERS>();
        let size = mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32;
        counters.cb = size;
        if K32GetProcessMemoryInfo(GetCurrentProcess(), &mut counters, size) == 0 {
            return Err(SampleError::unavailable(PROCESS_MEMORY, "call failed"));
        }
        Ok(counters.WorkingSetSize as u64)
    }
}

fn zero_filetime() -> FILETIME {
    FILETIME {
        dwLowDateTime: 0,
        dwHighDateTime: 0,
    }
}

fn filetime_ticks(time: &FILETIME) -> u64 {
    (u64::from(time.dwHighDateTime) << 32) | u64::from(time.dwLowDateTime)
}
