use std::path::PathBuf;

use super::{sysinfo_host_memory, sysinfo_process_resident};
use crate::SampleError;
use crate::system::memory::HostMemory;
use crate::system::source::CounterSource;

/// Platforms without a dedicated reader: host memory and the process table
/// only. CPU sampling falls through to the memory-pressure estimate.
#[derive(Debug, Clone, Default)]
pub struct NativeSource;

impl NativeSource {
    pub fn new(_procfs_root: PathBuf) -> Self {
        NativeSource
    }
}

impl CounterSource for NativeSource {
    fn read_host_memory(&self) -> Result<HostMemory, SampleError> {
        sysinfo_host_memory()
    }

    fn read_process_resident(&self) -> Result<u64, SampleError> {
        sysinfo_process_resident()
    }
}
