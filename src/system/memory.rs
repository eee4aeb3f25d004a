//! Memory samples and the `/proc/meminfo`-style line format.

use std::io::BufRead;

use serde::Serialize;

use super::source::SourceAvailability;
use crate::SampleError;

/// Label of the total-memory line in the memory pseudo-file.
pub const MEM_TOTAL_LABEL: &str = "MemTotal:";

/// Host memory as reported by the host memory API, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostMemory {
    pub total: u64,
    pub available: u64,
}

/// Which facility produced a [`MemorySample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MemorySource {
    HostApi,
    MemInfoFile,
    Unavailable,
}

impl MemorySource {
    pub fn availability(self) -> SourceAvailability {
        match self {
            MemorySource::HostApi => SourceAvailability::Primary,
            MemorySource::MemInfoFile => SourceAvailability::Secondary,
            MemorySource::Unavailable => SourceAvailability::Unavailable,
        }
    }
}

/// Memory consumption, in bytes.
///
/// `used_memory == total_memory - available_memory` holds for every value
/// built through the constructors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySample {
    pub total_memory: u64,
    pub available_memory: u64,
    pub used_memory: u64,
    /// `used / total * 100`, or `0.0` when total is zero.
    pub percent_used: f64,
    pub source: MemorySource,
}

impl MemorySample {
    pub fn unavailable() -> Self {
        Self::from_total_available(0, 0, MemorySource::Unavailable)
    }

    /// Host view: used is whatever is not available. `available` is capped
    /// at `total`.
    pub fn from_total_available(total: u64, available: u64, source: MemorySource) -> Self {
        let available = available.min(total);
        let used = total - available;
        Self {
            total_memory: total,
            available_memory: available,
            used_memory: used,
            percent_used: percent(used, total),
            source,
        }
    }

    /// Process view: used is the resident size, available is the rest.
    pub fn from_total_used(total: u64, used: u64, source: MemorySource) -> Self {
        let used = used.min(total);
        Self::from_total_available(total, total - used, source)
    }

    pub fn availability(&self) -> SourceAvailability {
        self.source.availability()
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}

/// Scans `reader` line by line for `label` and returns its value in bytes.
///
/// Values are in kB, as in `/proc/meminfo` and `/proc/<pid>/status`.
/// Reading stops at the first matching line.
pub fn read_kb_field<R: BufRead>(
    reader: R,
    label: &str,
    source_name: &'static str,
) -> Result<u64, SampleError> {
    for line in reader.lines() {
        let line = line.map_err(|e| SampleError::io(source_name, e))?;
        let mut parts = line.split_whitespace();
        if parts.next() != Some(label) {
            continue;
        }
        let raw = parts
            .next()
            .ok_or_else(|| SampleError::parse(source_name, format!("{label} has no value")))?;
        let kb: u64 = raw.parse().map_err(|_| {
            SampleError::parse(source_name, format!("expected integer kB value, got '{raw}'"))
        })?;
        return Ok(kb.saturating_mul(1024));
    }
    Err(SampleError::parse(source_name, format!("{label} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MEMINFO: &str = "\
MemTotal:        3884292 kB
MemFree:          218456 kB
MemAvailable:    2456780 kB
Buffers:          123456 kB
";

    #[test]
    fn host_view_derives_used_and_percent() {
        let sample =
            MemorySample::from_total_available(8_000_000_000, 2_000_000_000, MemorySource::HostApi);
        assert_eq!(sample.used_memory, 6_000_000_000);
        assert!((sample.percent_used - 75.0).abs() < 1e-9);
        assert_eq!(sample.availability(), SourceAvailability::Primary);
    }

    #[test]
    fn zero_total_has_zero_percent() {
        let sample = MemorySample::from_total_available(0, 0, MemorySource::HostApi);
        assert_eq!(sample.percent_used, 0.0);
        assert_eq!(MemorySample::unavailable().total_memory, 0);
    }

    #[test]
    fn available_is_capped_at_total() {
        let sample = MemorySample::from_total_available(100, 250, MemorySource::HostApi);
        assert_eq!(sample.available_memory, 100);
        assert_eq!(sample.used_memory, 0);
    }

    #[test]
    fn process_view_uses_resident_size() {
        let sample = MemorySample::from_total_used(4_000, 1_000, MemorySource::HostApi);
        assert_eq!(sample.used_memory, 1_000);
        assert_eq!(sample.available_memory, 3_000);
        assert!((sample.percent_used - 25.0).abs() < 1e-9);

        let clipped = MemorySample::from_total_used(10, 50, MemorySource::HostApi);
        assert_eq!(clipped.used_memory, 10);
        assert_eq!(clipped.available_memory, 0);
    }

    #[test]
    fn reads_mem_total_in_bytes() {
        let total = read_kb_field(SAMPLE_MEMINFO.as_bytes(), MEM_TOTAL_LABEL, "test").unwrap();
        assert_eq!(total, 3884292 * 1024);
    }

    #[test]
    fn missing_or_malformed_label() {
        let err = read_kb_field("MemFree: 1 kB\n".as_bytes(), MEM_TOTAL_LABEL, "test");
        assert!(matches!(err, Err(SampleError::ParseError { .. })));

        let err = read_kb_field("MemTotal: lots kB\n".as_bytes(), MEM_TOTAL_LABEL, "test");
        assert!(matches!(err, Err(SampleError::ParseError { .. })));
    }
}
