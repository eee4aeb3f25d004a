use std::path::PathBuf;

use super::{resident_with_fallback, sysinfo_host_memory};
use crate::SampleError;
use crate::system::cpu::ThreadUsage;
use crate::system::memory::HostMemory;
use crate::system::procfs::{DEFAULT_ROOT, ProcFs};
use crate::system::source::CounterSource;
use crate::system::ticks::{TickFrame, TickSnapshot};

/// Linux and Android: procfs for ticks, threads and resident size, with
/// the `sysinfo` host memory API in front of `/proc/meminfo`.
#[derive(Debug, Clone)]
pub struct NativeSource {
    procfs: ProcFs,
}

impl Default for NativeSource {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_ROOT))
    }
}

impl NativeSource {
    pub fn new(procfs_root: PathBuf) -> Self {
        Self {
            procfs: ProcFs::new(procfs_root).with_clock_ticks(clock_ticks()),
        }
    }
}

impl CounterSource for NativeSource {
    fn read_per_core_ticks(&self) -> Result<Vec<TickSnapshot>, SampleError> {
        CounterSource::read_per_core_ticks(&self.procfs)
    }

    fn read_aggregate_ticks(&self) -> Result<TickSnapshot, SampleError> {
        CounterSource::read_aggregate_ticks(&self.procfs)
    }

    fn read_thread_usage(&self) -> Result<ThreadUsage, SampleError> {
        self.procfs.read_thread_usage()
    }

    fn read_host_memory(&self) -> Result<HostMemory, SampleError> {
        sysinfo_host_memory()
    }

    fn read_meminfo_total(&self) -> Result<u64, SampleError> {
        self.procfs.read_meminfo_total()
    }

    fn read_process_resident(&self) -> Result<u64, SampleError> {
        resident_with_fallback(self.procfs.read_resident())
    }

    fn read_tick_frame(&self) -> TickFrame {
        CounterSource::read_tick_frame(&self.procfs)
    }
}

fn clock_ticks() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 { ticks as u64 } else { 0 }
}
