//! Tiered source selection for each metric.
//!
//! The chain is walked from scratch on every call. Each tier runs at most
//! once; a failed tier is logged and the next one is tried. The last tier
//! is a zero sample, so resolution itself cannot fail.

use super::cpu::{CpuSample, CpuSource};
use super::memory::{MemorySample, MemorySource};
use super::source::CounterSource;
use crate::SampleError;

/// Whose memory consumption counts as "used".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    /// Host-wide: used = total − available.
    #[default]
    Host,
    /// The current process: used = resident size.
    Process,
}

/// Walks the fallback chains against one counter source.
pub struct FallbackResolver<'a, S: CounterSource + ?Sized> {
    source: &'a S,
    scope: MemoryScope,
}

impl<'a, S: CounterSource + ?Sized> FallbackResolver<'a, S> {
    pub fn new(source: &'a S, scope: MemoryScope) -> Self {
        Self { source, scope }
    }

    /// Per-core ticks → aggregate ticks → thread usage → memory pressure → 0.
    pub fn resolve_cpu(&self) -> CpuSample {
        let _span = tracing::debug_span!("resolver.cpu").entered();

        if let Some(cores) = attempt("per-core ticks", || {
            let cores = self.source.read_per_core_ticks()?;
            if cores.is_empty() {
                return Err(SampleError::unavailable("per-core ticks", "no core lines"));
            }
            Ok(cores)
        }) {
            return CpuSample::from_core_ticks(&cores);
        }

        if let Some(aggregate) = attempt("aggregate ticks", || self.source.read_aggregate_ticks()) {
            return CpuSample::from_aggregate(
                aggregate.percentage(),
                CpuSource::AggregateTicks,
            );
        }

        self.resolve_cpu_without_ticks()
    }

    /// A single host-wide percentage: aggregate ticks → per-core mean →
    /// the untimed tiers.
    pub fn resolve_cpu_percent(&self) -> f64 {
        let _span = tracing::debug_span!("resolver.cpu_percent").entered();

        if let Some(aggregate) = attempt("aggregate ticks", || self.source.read_aggregate_ticks()) {
            return aggregate.percentage();
        }

        if let Some(cores) = attempt("per-core ticks", || {
            let cores = self.source.read_per_core_ticks()?;
            if cores.is_empty() {
                return Err(SampleError::unavailable("per-core ticks", "no core lines"));
            }
            Ok(cores)
        }) {
            return CpuSample::from_core_ticks(&cores).total_usage;
        }

        self.resolve_cpu_without_ticks().total_usage
    }

    /// The tiers of [`resolve_cpu`](Self::resolve_cpu) that do not read tick
    /// counters: thread usage → memory pressure → 0.
    pub fn resolve_cpu_without_ticks(&self) -> CpuSample {
        if let Some(usage) = attempt("thread usage", || self.source.read_thread_usage()) {
            return CpuSample::from_thread_usage(usage);
        }

        let memory = self.resolve_host_memory();
        if memory.source != MemorySource::Unavailable {
            return CpuSample::from_memory_pressure(memory.percent_used);
        }

        tracing::debug!("no cpu source answered");
        CpuSample::unavailable()
    }

    /// Host API → meminfo total → zeros, shaped by the memory scope.
    pub fn resolve_memory(&self) -> MemorySample {
        let _span = tracing::debug_span!("resolver.memory", scope = ?self.scope).entered();

        match self.scope {
            MemoryScope::Host => self.resolve_host_memory(),
            MemoryScope::Process => {
                let Some((total, source)) = self.resolve_total() else {
                    return MemorySample::unavailable();
                };
                let resident = self.resolve_process_resident();
                MemorySample::from_total_used(total, resident, source)
            }
        }
    }

    /// Host memory regardless of scope. Used by the CPU pressure estimate.
    pub fn resolve_host_memory(&self) -> MemorySample {
        if let Some(host) = attempt("host memory", || self.source.read_host_memory()) {
            return MemorySample::from_total_available(host.total, host.available, MemorySource::HostApi);
        }

        if let Some(total) = attempt("meminfo", || self.source.read_meminfo_total()) {
            // The pseudo-file tier only knows the total; charge the process's
            // resident size as used when it can be read.
            let resident = attempt("process resident size", || self.source.read_process_resident())
                .unwrap_or(0);
            return MemorySample::from_total_used(total, resident, MemorySource::MemInfoFile);
        }

        tracing::debug!("no memory source answered");
        MemorySample::unavailable()
    }

    /// Host total memory: host API → meminfo.
    pub fn resolve_total(&self) -> Option<(u64, MemorySource)> {
        if let Some(host) = attempt("host memory", || self.source.read_host_memory()) {
            return Some((host.total, MemorySource::HostApi));
        }
        attempt("meminfo", || self.source.read_meminfo_total())
            .map(|total| (total, MemorySource::MemInfoFile))
    }

    /// Resident size of the current process, or 0.
    pub fn resolve_process_resident(&self) -> u64 {
        attempt("process resident size", || self.source.read_process_resident()).unwrap_or(0)
    }
}

/// Runs one tier, turning its failure into `None`.
fn attempt<T>(tier: &'static str, read: impl FnOnce() -> Result<T, SampleError>) -> Option<T> {
    match read() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(tier, error = %err, "tier unavailable, falling back");
            None
        }
    }
}
