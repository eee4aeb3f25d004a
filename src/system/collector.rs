use super::cpu::{CpuSample, CpuSource};
use super::memory::MemorySample;
use super::platform::NativeSource;
use super::resolver::{FallbackResolver, MemoryScope};
use super::snapshot::PerfSnapshot;
use super::source::CounterSource;
use super::ticks::{TickFrame, delta_percentage};

/// Answers sampling requests from fresh counter reads.
///
/// Holds no state between calls; two calls never share a reading.
#[derive(Debug, Clone)]
pub struct Sampler<S = NativeSource> {
    source: S,
    scope: MemoryScope,
}

impl Default for Sampler<NativeSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler<NativeSource> {
    pub fn new() -> Self {
        Self::with_source(NativeSource::default())
    }
}

impl<S: CounterSource> Sampler<S> {
    pub fn with_source(source: S) -> Self {
        Sampler {
            source,
            scope: MemoryScope::default(),
        }
    }

    pub fn with_memory_scope(mut self, scope: MemoryScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn memory_scope(&self) -> MemoryScope {
        self.scope
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sample_memory(&self) -> MemorySample {
        let _span = tracing::debug_span!("sampler.sample_memory").entered();
        self.resolver().resolve_memory()
    }

    /// Cumulative utilization since boot; see [`DeltaCpuSampler`] for the
    /// load over an interval.
    pub fn sample_cpu(&self) -> CpuSample {
        let _span = tracing::debug_span!("sampler.sample_cpu").entered();
        self.resolver().resolve_cpu()
    }

    pub fn sample_all(&self) -> PerfSnapshot {
        PerfSnapshot {
            memory: self.sample_memory(),
            cpu: self.sample_cpu(),
        }
    }

    /// Resident size of the current process in bytes, 0 when unreadable.
    pub fn process_memory_usage(&self) -> u64 {
        let _span = tracing::debug_span!("sampler.process_memory_usage").entered();
        self.resolver().resolve_process_resident()
    }

    /// Host physical memory in bytes, 0 when unreadable.
    pub fn total_memory(&self) -> u64 {
        let _span = tracing::debug_span!("sampler.total_memory").entered();
        self.resolver().resolve_total().map_or(0, |(total, _)| total)
    }

    /// The host-wide tick percentage alone, or the per-core mean, or the
    /// untimed CPU tiers when no tick line can be read.
    pub fn cpu_usage_percent(&self) -> f64 {
        let _span = tracing::debug_span!("sampler.cpu_usage_percent").entered();
        self.resolver().resolve_cpu_percent()
    }

    fn resolver(&self) -> FallbackResolver<'_, S> {
        FallbackResolver::new(&self.source, self.scope)
    }
}

/// CPU utilization over the interval between two calls.
///
/// Keeps the previous tick frame as its only state. The first call, or any
/// call whose frame does not line up with the previous one (core count
/// changed, tick source vanished), reports the cumulative value instead.
#[derive(Debug, Clone)]
pub struct DeltaCpuSampler<S = NativeSource> {
    source: S,
    scope: MemoryScope,
    previous: Option<TickFrame>,
}

impl Default for DeltaCpuSampler<NativeSource> {
    fn default() -> Self {
        Self::with_source(NativeSource::default())
    }
}

impl<S: CounterSource> DeltaCpuSampler<S> {
    pub fn with_source(source: S) -> Self {
        DeltaCpuSampler {
            source,
            scope: MemoryScope::default(),
            previous: None,
        }
    }

    pub fn with_memory_scope(mut self, scope: MemoryScope) -> Self {
        self.scope = scope;
        self
    }

    /// Records a baseline frame without producing a sample.
    pub fn prime(&mut self) {
        let frame = self.source.read_tick_frame();
        if !frame.is_empty() {
            self.previous = Some(frame);
        }
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    pub fn sample(&mut self) -> CpuSample {
        let _span = tracing::debug_span!("sampler.sample_cpu_delta").entered();

        let current = self.source.read_tick_frame();
        if current.is_empty() {
            tracing::debug!("no tick frame, using untimed cpu tiers");
            return FallbackResolver::new(&self.source, self.scope).resolve_cpu_without_ticks();
        }

        let sample = self
            .previous
            .as_ref()
            .and_then(|previous| interval_sample(previous, &current))
            .unwrap_or_else(|| cumulative_sample(&current));
        self.previous = Some(current);
        sample
    }
}

fn interval_sample(previous: &TickFrame, current: &TickFrame) -> Option<CpuSample> {
    if !current.per_core.is_empty() && previous.per_core.len() == current.per_core.len() {
        let per_core = previous
            .per_core
            .iter()
            .zip(&current.per_core)
            .map(|(before, after)| delta_percentage(before, after))
            .collect();
        return Some(CpuSample::from_per_core(per_core, CpuSource::PerCoreTicks));
    }
    match (&previous.aggregate, &current.aggregate) {
        (Some(before), Some(after)) => Some(CpuSample::from_aggregate(
            delta_percentage(before, after),
            CpuSource::AggregateTicks,
        )),
        _ => None,
    }
}

fn cumulative_sample(frame: &TickFrame) -> CpuSample {
    if !frame.per_core.is_empty() {
        return CpuSample::from_core_ticks(&frame.per_core);
    }
    match &frame.aggregate {
        Some(aggregate) => CpuSample::from_aggregate(aggregate.percentage(), CpuSource::AggregateTicks),
        None => CpuSample::unavailable(),
    }
}
