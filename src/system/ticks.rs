//! Tick counters and the percentages derived from them.
//!
//! A tick line looks like `/proc/stat`'s cpu block:
//!
//! ```text
//! cpu  100 0 100 800 0 0 0 0 0 0
//! cpu0 50 0 50 900 0 0 0 0 0 0
//! ```
//!
//! Field 0 is the label, then `user nice system idle [iowait irq softirq ...]`.

use std::io::BufRead;

use crate::SampleError;

/// Label of the host-wide line; per-core lines append the core index.
pub const AGGREGATE_LABEL: &str = "cpu";

/// Counters before which a line is rejected: user, nice, system, idle.
const MIN_COUNTERS: usize = 4;

/// Cumulative time counters for the host or for one logical core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSnapshot {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

impl TickSnapshot {
    /// Builds a snapshot from the four mandatory counters; the rest are zero.
    pub fn new(user: u64, nice: u64, system: u64, idle: u64) -> Self {
        Self {
            user,
            nice,
            system,
            idle,
            ..Self::default()
        }
    }

    pub fn total(&self) -> u64 {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
        ]
        .iter()
        .fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    pub fn busy(&self) -> u64 {
        self.total().saturating_sub(self.idle)
    }

    /// Busy share of all ticks since boot, in `[0.0, 100.0]`.
    ///
    /// This is a single cumulative sample, not the load over an interval.
    /// Use [`delta_percentage`] with two snapshots for that.
    pub fn percentage(&self) -> f64 {
        ratio_percent(self.busy(), self.total())
    }

    /// Field-wise sum, used to build a host aggregate from per-core counters.
    pub fn saturating_add(&self, other: &TickSnapshot) -> TickSnapshot {
        TickSnapshot {
            user: self.user.saturating_add(other.user),
            nice: self.nice.saturating_add(other.nice),
            system: self.system.saturating_add(other.system),
            idle: self.idle.saturating_add(other.idle),
            iowait: self.iowait.saturating_add(other.iowait),
            irq: self.irq.saturating_add(other.irq),
            softirq: self.softirq.saturating_add(other.softirq),
        }
    }
}

/// Busy share of the ticks elapsed between two snapshots of the same scope.
///
/// Counters that went backwards (counter reset, hot-unplugged core) count as
/// no elapsed time and yield `0.0`.
pub fn delta_percentage(previous: &TickSnapshot, current: &TickSnapshot) -> f64 {
    let total = current.total().saturating_sub(previous.total());
    let idle = current.idle.saturating_sub(previous.idle);
    ratio_percent(total.saturating_sub(idle), total)
}

fn ratio_percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
}

/// What a tick line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuLabel {
    Aggregate,
    Core(usize),
}

impl CpuLabel {
    /// Classifies a line label. Anything that is neither `cpu` nor `cpu<N>`
    /// returns `None`.
    pub fn classify(label: &str) -> Option<CpuLabel> {
        if label == AGGREGATE_LABEL {
            return Some(CpuLabel::Aggregate);
        }
        let suffix = label.strip_prefix(AGGREGATE_LABEL)?;
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        suffix.parse().ok().map(CpuLabel::Core)
    }
}

/// Parses one tick line.
///
/// Returns `Ok(None)` for lines that are not cpu lines at all, and a
/// `ParseError` for cpu lines with too few or non-numeric counters.
pub fn parse_tick_line(
    line: &str,
    source_name: &'static str,
) -> Result<Option<(CpuLabel, TickSnapshot)>, SampleError> {
    let mut fields = line.split_whitespace();
    let Some(label) = fields.next().and_then(CpuLabel::classify) else {
        return Ok(None);
    };

    let mut counters = [0u64; 7];
    let mut seen = 0;
    for (slot, raw) in counters.iter_mut().zip(fields) {
        *slot = raw.parse().map_err(|_| {
            SampleError::parse(source_name, format!("non-numeric counter '{raw}' in '{line}'"))
        })?;
        seen += 1;
    }
    if seen < MIN_COUNTERS {
        return Err(SampleError::parse(
            source_name,
            format!("expected at least {MIN_COUNTERS} counters, got {seen} in '{line}'"),
        ));
    }

    let [user, nice, system, idle, iowait, irq, softirq] = counters;
    Ok(Some((
        label,
        TickSnapshot {
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
        },
    )))
}

/// All tick snapshots read from one pass over a tick source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickFrame {
    pub aggregate: Option<TickSnapshot>,
    /// Core snapshots in the order they appeared.
    pub per_core: Vec<TickSnapshot>,
}

impl TickFrame {
    /// Reads the cpu block from `reader`.
    ///
    /// Stops at the first non-cpu line after the block has started, so the
    /// rest of a large `/proc/stat` is never read. Malformed cpu lines,
    /// including ones that are not UTF-8, are skipped without affecting
    /// their siblings. Only a failing read aborts the frame.
    pub fn read<R: BufRead>(mut reader: R, source_name: &'static str) -> Result<Self, SampleError> {
        let mut frame = TickFrame::default();
        let mut in_block = false;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| SampleError::io(source_name, e))?;
            if read == 0 {
                break;
            }
            let parsed = match std::str::from_utf8(&buf) {
                Ok(line) => parse_tick_line(line.trim_end_matches(['\n', '\r']), source_name),
                Err(err) => Err(SampleError::parse(
                    source_name,
                    format!("line is not valid UTF-8: {err}"),
                )),
            };
            match parsed {
                Ok(Some((CpuLabel::Aggregate, snapshot))) => {
                    in_block = true;
                    frame.aggregate.get_or_insert(snapshot);
                }
                Ok(Some((CpuLabel::Core(_), snapshot))) => {
                    in_block = true;
                    frame.per_core.push(snapshot);
                }
                Ok(None) if in_block => break,
                Ok(None) => {}
                Err(err) => {
                    in_block = true;
                    tracing::debug!(error = %err, "skipping tick line");
                }
            }
        }

        Ok(frame)
    }

    pub fn is_empty(&self) -> bool {
        self.aggregate.is_none() && self.per_core.is_empty()
    }
}
