//! The capability interface every platform's counter readers implement.

use serde::Serialize;

use super::cpu::ThreadUsage;
use super::memory::HostMemory;
use super::ticks::{TickFrame, TickSnapshot};
use crate::SampleError;

/// How trustworthy a sample is, by the kind of facility that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceAvailability {
    /// The preferred counter facility answered.
    Primary,
    /// A less precise but still measured facility answered.
    Secondary,
    /// The value is an approximation shaped like a measurement.
    Estimated,
    /// Nothing answered; the sample holds zeros.
    Unavailable,
}

/// Raw counter access for one platform.
///
/// Every method opens, reads and releases its facility within the call.
/// Methods a platform cannot serve keep the default, which reports
/// `SourceUnavailable`.
pub trait CounterSource {
    /// One snapshot per logical core, in the platform's core order.
    fn read_per_core_ticks(&self) -> Result<Vec<TickSnapshot>, SampleError> {
        Err(SampleError::unsupported("per-core ticks"))
    }

    /// Host-wide tick snapshot.
    fn read_aggregate_ticks(&self) -> Result<TickSnapshot, SampleError> {
        Err(SampleError::unsupported("aggregate ticks"))
    }

    /// Summed usage of the current task's non-idle threads.
    fn read_thread_usage(&self) -> Result<ThreadUsage, SampleError> {
        Err(SampleError::unsupported("thread usage"))
    }

    /// Total and available physical memory from the host memory API.
    fn read_host_memory(&self) -> Result<HostMemory, SampleError> {
        Err(SampleError::unsupported("host memory"))
    }

    /// Total physical memory from the memory pseudo-file.
    fn read_meminfo_total(&self) -> Result<u64, SampleError> {
        Err(SampleError::unsupported("meminfo"))
    }

    /// Resident size of the current process in bytes.
    fn read_process_resident(&self) -> Result<u64, SampleError> {
        Err(SampleError::unsupported("process resident size"))
    }

    /// Aggregate and per-core ticks together, for interval sampling.
    ///
    /// Either half may be missing; an empty frame means no tick source
    /// answered.
    fn read_tick_frame(&self) -> TickFrame {
        TickFrame {
            aggregate: self.read_aggregate_ticks().ok(),
            per_core: self.read_per_core_ticks().unwrap_or_default(),
        }
    }
}

impl<S: CounterSource + ?Sized> CounterSource for &S {
    fn read_per_core_ticks(&self) -> Result<Vec<TickSnapshot>, SampleError> {
        (**self).read_per_core_ticks()
    }

    fn read_aggregate_ticks(&self) -> Result<TickSnapshot, SampleError> {
        (**self).read_aggregate_ticks()
    }

    fn read_thread_usage(&self) -> Result<ThreadUsage, SampleError> {
        (**self).read_thread_usage()
    }

    fn read_host_memory(&self) -> Result<HostMemory, SampleError> {
        (**self).read_host_memory()
    }

    fn read_meminfo_total(&self) -> Result<u64, SampleError> {
        (**self).read_meminfo_total()
    }

    fn read_process_resident(&self) -> Result<u64, SampleError> {
        (**self).read_process_resident()
    }

    fn read_tick_frame(&self) -> TickFrame {
        (**self).read_tick_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl CounterSource for Nothing {}

    #[test]
    fn defaults_report_unavailable() {
        let source = Nothing;
        assert!(matches!(
            source.read_per_core_ticks(),
            Err(SampleError::SourceUnavailable { .. })
        ));
        assert!(source.read_aggregate_ticks().is_err());
        assert!(source.read_thread_usage().is_err());
        assert!(source.read_host_memory().is_err());
        assert!(source.read_meminfo_total().is_err());
        assert!(source.read_process_resident().is_err());
        assert!(source.read_tick_frame().is_empty());
    }
}
