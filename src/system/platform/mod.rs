//! Per-OS counter readers behind [`CounterSource`](super::source::CounterSource).
//!
//! Exactly one implementation is compiled in and re-exported as
//! [`NativeSource`]. Host memory comes from `sysinfo` everywhere.

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

use super::memory::HostMemory;
use crate::SampleError;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux;
#[cfg(any(target_os = "macos", target_os = "ios"))]
mod apple;
#[cfg(target_os = "windows")]
mod windows;
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "windows"
)))]
mod generic;

#[cfg(any(target_os = "linux", target_os = "android"))]
use linux as platform_impl;
#[cfg(any(target_os = "macos", target_os = "ios"))]
use apple as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "ios",
    target_os = "windows"
)))]
use generic as platform_impl;

pub use platform_impl::NativeSource;

const HOST_API: &str = "host memory API";
const PROCESS_API: &str = "process table";

pub(crate) fn sysinfo_host_memory() -> Result<HostMemory, SampleError> {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return Err(SampleError::unavailable(HOST_API, "reported zero total memory"));
    }
    Ok(HostMemory {
        total,
        available: sys.available_memory(),
    })
}

/// Resident size of the current process through `sysinfo`'s process table.
pub(crate) fn sysinfo_process_resident() -> Result<u64, SampleError> {
    let pid = sysinfo::get_current_pid().map_err(|e| SampleError::unavailable(PROCESS_API, e))?;
    let mut sys = System::new();
    let pids = [pid];
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&pids),
        true,
        ProcessRefreshKind::nothing().with_memory(),
    );
    sys.process(pid)
        .map(|process| process.memory())
        .ok_or_else(|| SampleError::unavailable(PROCESS_API, "current process not listed"))
}

/// Native resident-size call first, then the process table.
pub(crate) fn resident_with_fallback(
    native: Result<u64, SampleError>,
) -> Result<u64, SampleError> {
    native.or_else(|err| {
        tracing::debug!(error = %err, "native resident size unavailable, using process table");
        sysinfo_process_resident()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::source::CounterSource;

    #[test]
    fn native_source_does_not_panic() {
        let source = NativeSource::default();
        let _ = source.read_per_core_ticks();
        let _ = source.read_aggregate_ticks();
        let _ = source.read_thread_usage();
        let _ = source.read_host_memory();
        let _ = source.read_meminfo_total();
        let _ = source.read_process_resident();
    }

    #[test]
    fn host_memory_is_consistent_when_available() {
        if let Ok(memory) = sysinfo_host_memory() {
            assert!(memory.total > 0);
        }
    }

    #[test]
    fn resident_fallback_keeps_native_value() {
        assert_eq!(resident_with_fallback(Ok(42)).unwrap(), 42);
    }
}
