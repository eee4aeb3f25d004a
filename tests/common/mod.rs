#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use perfprobe::SampleError;
use perfprobe::system::cpu::ThreadUsage;
use perfprobe::system::memory::HostMemory;
use perfprobe::system::source::CounterSource;
use perfprobe::system::ticks::TickSnapshot;

/// A counter source whose every facility is scripted; `None` means the
/// facility is unavailable.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    pub per_core: Option<Vec<TickSnapshot>>,
    pub aggregate: Option<TickSnapshot>,
    pub threads: Option<ThreadUsage>,
    pub host: Option<HostMemory>,
    pub meminfo_total: Option<u64>,
    pub resident: Option<u64>,
}

fn unavailable<T>() -> Result<T, SampleError> {
    Err(SampleError::SourceUnavailable {
        source_name: "scripted",
        reason: "switched off".into(),
    })
}

impl CounterSource for ScriptedSource {
    fn read_per_core_ticks(&self) -> Result<Vec<TickSnapshot>, SampleError> {
        self.per_core.clone().map_or_else(unavailable, Ok)
    }

    fn read_aggregate_ticks(&self) -> Result<TickSnapshot, SampleError> {
        self.aggregate.map_or_else(unavailable, Ok)
    }

    fn read_thread_usage(&self) -> Result<ThreadUsage, SampleError> {
        self.threads.map_or_else(unavailable, Ok)
    }

    fn read_host_memory(&self) -> Result<HostMemory, SampleError> {
        self.host.map_or_else(unavailable, Ok)
    }

    fn read_meminfo_total(&self) -> Result<u64, SampleError> {
        self.meminfo_total.map_or_else(unavailable, Ok)
    }

    fn read_process_resident(&self) -> Result<u64, SampleError> {
        self.resident.map_or_else(unavailable, Ok)
    }
}

/// A throwaway procfs tree under the temp dir, removed on drop.
pub struct FixtureProc {
    root: PathBuf,
}

impl FixtureProc {
    pub fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!("perfprobe_it_{name}"));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).expect("failed to create fixture root");
        FixtureProc { root }
    }

    pub fn write(&self, relative: &str, contents: &str) -> &Self {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create fixture dir");
        }
        fs::write(path, contents).expect("failed to write fixture file");
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for FixtureProc {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}
