//! CPU utilization samples.

use serde::Serialize;

use super::source::SourceAvailability;
use super::ticks::TickSnapshot;

/// Cap of the memory-pressure CPU estimate, in percent.
pub const PRESSURE_ESTIMATE_CAP: f64 = 30.0;
/// Share of memory pressure reported as estimated CPU load.
pub const PRESSURE_ESTIMATE_FACTOR: f64 = 0.3;

/// Which facility produced a [`CpuSample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CpuSource {
    PerCoreTicks,
    AggregateTicks,
    /// Per-thread scheduler usage; the per-core sequence is synthetic.
    ThreadUsage,
    /// Derived from memory pressure; not a CPU measurement at all.
    MemoryPressure,
    Unavailable,
}

impl CpuSource {
    pub fn availability(self) -> SourceAvailability {
        match self {
            CpuSource::PerCoreTicks => SourceAvailability::Primary,
            CpuSource::AggregateTicks => SourceAvailability::Secondary,
            CpuSource::ThreadUsage | CpuSource::MemoryPressure => SourceAvailability::Estimated,
            CpuSource::Unavailable => SourceAvailability::Unavailable,
        }
    }
}

/// Summed usage of the non-idle threads of the current task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreadUsage {
    /// Sum of per-thread usage percentages. May exceed 100 on multi-core hosts.
    pub total_percent: f64,
    pub active_threads: usize,
}

/// CPU utilization, in percent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuSample {
    /// In `[0.0, 100.0]`. The mean of `per_core_usage` whenever that is
    /// non-empty.
    pub total_usage: f64,
    /// Each in `[0.0, 100.0]`; empty when the source has no per-unit data.
    pub per_core_usage: Vec<f64>,
    pub source: CpuSource,
}

impl CpuSample {
    /// The last-resort sample: zero load, no cores.
    pub fn unavailable() -> Self {
        Self {
            total_usage: 0.0,
            per_core_usage: Vec::new(),
            source: CpuSource::Unavailable,
        }
    }

    /// Builds a sample whose total is the mean of the per-core values.
    ///
    /// An empty sequence yields a zero total.
    pub fn from_per_core(per_core_usage: Vec<f64>, source: CpuSource) -> Self {
        let per_core_usage: Vec<f64> = per_core_usage
            .into_iter()
            .map(|v| v.clamp(0.0, 100.0))
            .collect();
        let total_usage = mean(&per_core_usage);
        Self {
            total_usage,
            per_core_usage,
            source,
        }
    }

    /// Cumulative per-core percentages from core snapshots.
    pub fn from_core_ticks(cores: &[TickSnapshot]) -> Self {
        Self::from_per_core(
            cores.iter().map(TickSnapshot::percentage).collect(),
            CpuSource::PerCoreTicks,
        )
    }

    /// A single host-wide figure with no per-core breakdown.
    pub fn from_aggregate(total_usage: f64, source: CpuSource) -> Self {
        Self {
            total_usage: total_usage.clamp(0.0, 100.0),
            per_core_usage: Vec::new(),
            source,
        }
    }

    /// Spreads thread usage over `max(active_threads, 1)` synthetic slots.
    ///
    /// Thread enumeration does not say which core ran what, so every slot
    /// holds the per-thread average. The total is that same average, which
    /// keeps it in range and equal to the mean of the slots.
    pub fn from_thread_usage(usage: ThreadUsage) -> Self {
        let slots = usage.active_threads.max(1);
        let average = usage.total_percent.max(0.0) / slots as f64;
        Self::from_per_core(vec![average; slots], CpuSource::ThreadUsage)
    }

    /// Bounded pseudo-CPU figure from memory pressure.
    pub fn from_memory_pressure(percent_used: f64) -> Self {
        let estimate = (percent_used * PRESSURE_ESTIMATE_FACTOR).clamp(0.0, PRESSURE_ESTIMATE_CAP);
        Self::from_aggregate(estimate, CpuSource::MemoryPressure)
    }

    pub fn availability(&self) -> SourceAvailability {
        self.source.availability()
    }

    /// `true` when the value is an approximation rather than a measurement.
    pub fn is_estimated(&self) -> bool {
        self.availability() == SourceAvailability::Estimated
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_core_total_is_mean() {
        let sample = CpuSample::from_per_core(vec![10.0, 40.0], CpuSource::PerCoreTicks);
        assert_eq!(sample.per_core_usage, vec![10.0, 40.0]);
        assert!((sample.total_usage - 25.0).abs() < 1e-9);
        assert_eq!(sample.availability(), SourceAvailability::Primary);
    }

    #[test]
    fn empty_per_core_has_zero_total() {
        let sample = CpuSample::from_per_core(Vec::new(), CpuSource::PerCoreTicks);
        assert_eq!(sample.total_usage, 0.0);
    }

    #[test]
    fn from_core_ticks_keeps_order() {
        let cores = [
            TickSnapshot::new(200, 0, 200, 600),
            TickSnapshot::new(50, 0, 50, 900),
        ];
        let sample = CpuSample::from_core_ticks(&cores);
        assert!((sample.per_core_usage[0] - 40.0).abs() < 1e-9);
        assert!((sample.per_core_usage[1] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn thread_usage_is_replicated() {
        let sample = CpuSample::from_thread_usage(ThreadUsage {
            total_percent: 90.0,
            active_threads: 3,
        });
        assert_eq!(sample.per_core_usage, vec![30.0, 30.0, 30.0]);
        assert!((sample.total_usage - 30.0).abs() < 1e-9);
        assert!(sample.is_estimated());
    }

    #[test]
    fn thread_usage_without_active_threads_has_one_zero_slot() {
        let sample = CpuSample::from_thread_usage(ThreadUsage {
            total_percent: 0.0,
            active_threads: 0,
        });
        assert_eq!(sample.per_core_usage, vec![0.0]);
        assert_eq!(sample.total_usage, 0.0);
    }

    #[test]
    fn memory_pressure_is_capped() {
        let low = CpuSample::from_memory_pressure(50.0);
        assert!((low.total_usage - 15.0).abs() < 1e-9);
        assert!(low.per_core_usage.is_empty());

        let high = CpuSample::from_memory_pressure(100.0);
        assert_eq!(high.total_usage, PRESSURE_ESTIMATE_CAP);
        assert!(high.is_estimated());
    }

    #[test]
    fn unavailable_is_zero() {
        let sample = CpuSample::unavailable();
        assert_eq!(sample.total_usage, 0.0);
        assert!(sample.per_core_usage.is_empty());
        assert_eq!(sample.availability(), SourceAvailability::Unavailable);
    }
}
