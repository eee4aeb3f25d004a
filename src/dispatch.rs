//! Operation names a caller can request, and their answers.
//!
//! Names follow the method-channel convention (`getMemoryInfo`); each also
//! has a kebab-case alias for command lines (`memory-info`).

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::SampleError;
use crate::system::collector::Sampler;
use crate::system::cpu::CpuSample;
use crate::system::memory::MemorySample;
use crate::system::snapshot::PerfSnapshot;
use crate::system::source::CounterSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    MemoryInfo,
    CpuUsage,
    ProcessMemoryUsage,
    TotalMemory,
    CpuUsagePercent,
    All,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::MemoryInfo,
        Operation::CpuUsage,
        Operation::ProcessMemoryUsage,
        Operation::TotalMemory,
        Operation::CpuUsagePercent,
        Operation::All,
    ];

    pub fn method_name(self) -> &'static str {
        match self {
            Operation::MemoryInfo => "getMemoryInfo",
            Operation::CpuUsage => "getCpuUsage",
            Operation::ProcessMemoryUsage => "getProcessMemoryUsage",
            Operation::TotalMemory => "getTotalMemory",
            Operation::CpuUsagePercent => "getCpuUsagePercent",
            Operation::All => "getAll",
        }
    }

    pub fn alias(self) -> &'static str {
        match self {
            Operation::MemoryInfo => "memory-info",
            Operation::CpuUsage => "cpu-usage",
            Operation::ProcessMemoryUsage => "process-memory",
            Operation::TotalMemory => "total-memory",
            Operation::CpuUsagePercent => "cpu-percent",
            Operation::All => "all",
        }
    }

    /// Platform-prefixed names from the older method-channel API.
    pub fn legacy_names(self) -> &'static [&'static str] {
        match self {
            Operation::ProcessMemoryUsage => &["getAndroidMemoryUsage", "getWindowsMemoryUsage"],
            Operation::TotalMemory => &["getAndroidTotalMemory", "getWindowsTotalMemory"],
            Operation::CpuUsagePercent => &["getAndroidCPUUsage", "getWindowsCPUUsage"],
            Operation::MemoryInfo | Operation::CpuUsage | Operation::All => &[],
        }
    }

    /// Whether the answer contains a CPU sample.
    pub fn samples_cpu(self) -> bool {
        matches!(self, Operation::CpuUsage | Operation::All)
    }
}

impl FromStr for Operation {
    type Err = SampleError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| {
                op.method_name() == name || op.alias() == name || op.legacy_names().contains(&name)
            })
            .ok_or_else(|| SampleError::UnsupportedOperation(name.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// The value an operation answers with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Memory(MemorySample),
    Cpu(CpuSample),
    Bytes(u64),
    Percent(f64),
    Snapshot(PerfSnapshot),
}

/// Runs `operation` against `sampler`. Never fails: every sampling path
/// degrades to zeros.
pub fn dispatch<S: CounterSource>(sampler: &Sampler<S>, operation: Operation) -> Response {
    match operation {
        Operation::MemoryInfo => Response::Memory(sampler.sample_memory()),
        Operation::CpuUsage => Response::Cpu(sampler.sample_cpu()),
        Operation::ProcessMemoryUsage => Response::Bytes(sampler.process_memory_usage()),
        Operation::TotalMemory => Response::Bytes(sampler.total_memory()),
        Operation::CpuUsagePercent => Response::Percent(sampler.cpu_usage_percent()),
        Operation::All => Response::Snapshot(sampler.sample_all()),
    }
}

/// Parses `name` and runs it; unknown names are `UnsupportedOperation`.
pub fn dispatch_named<S: CounterSource>(
    sampler: &Sampler<S>,
    name: &str,
) -> Result<Response, SampleError> {
    let operation: Operation = name.parse()?;
    Ok(dispatch(sampler, operation))
}
