use serde::Serialize;

use super::cpu::CpuSample;
use super::memory::MemorySample;

/// Both metrics from one caller request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfSnapshot {
    pub memory: MemorySample,
    pub cpu: CpuSample,
}
