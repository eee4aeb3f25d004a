//! Counter readers over a procfs tree.
//!
//! Nothing here is tied to a target OS: the root is configurable, so the
//! readers also run against fixture trees in tests.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::cpu::ThreadUsage;
use super::memory::{MEM_TOTAL_LABEL, read_kb_field};
use super::source::CounterSource;
use super::ticks::{TickFrame, TickSnapshot};
use crate::SampleError;

pub const DEFAULT_ROOT: &str = "/proc";
/// `USER_HZ` on every mainstream Linux build.
pub const DEFAULT_CLOCK_TICKS: u64 = 100;

const STAT: &str = "/proc/stat";
const MEMINFO: &str = "/proc/meminfo";
const STATUS: &str = "/proc/self/status";
const TASKS: &str = "/proc/self/task";
const UPTIME: &str = "/proc/uptime";

const VM_RSS_LABEL: &str = "VmRSS:";

/// Scheduler counters of one thread, from `/proc/<pid>/task/<tid>/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadStat {
    pub state: char,
    /// `utime + stime`, in clock ticks.
    pub cpu_ticks: u64,
    /// Start time after boot, in clock ticks.
    pub start_ticks: u64,
}

impl ThreadStat {
    /// Usage over the thread's lifetime, in percent of one core.
    pub fn lifetime_percent(&self, uptime_ticks: u64) -> f64 {
        let lifetime = uptime_ticks.saturating_sub(self.start_ticks);
        if lifetime == 0 {
            return 0.0;
        }
        (self.cpu_ticks as f64 / lifetime as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Threads that never ran are idle for sampling purposes.
    pub fn is_idle(&self) -> bool {
        self.cpu_ticks == 0
    }
}

/// Parses a task `stat` line.
pub fn parse_thread_stat(contents: &str) -> Option<ThreadStat> {
    // comm may contain spaces and parens, so split after the last ')'.
    let after_comm = contents.rfind(')')? + 1;
    let fields: Vec<&str> = contents[after_comm..].split_whitespace().collect();
    // state(0) ... utime(11) stime(12) ... starttime(19)
    let state = fields.first()?.chars().next()?;
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    let start_ticks: u64 = fields.get(19)?.parse().ok()?;
    Some(ThreadStat {
        state,
        cpu_ticks: utime.saturating_add(stime),
        start_ticks,
    })
}

/// File-backed counters. Has no host memory API; pair it with one, as the
/// Linux native source does.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
    clock_ticks: u64,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock_ticks: DEFAULT_CLOCK_TICKS,
        }
    }

    /// Clock ticks per second used to turn thread tick counts into time.
    pub fn with_clock_ticks(mut self, clock_ticks: u64) -> Self {
        self.clock_ticks = clock_ticks;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads the cpu block of `stat`. The file handle is dropped on return.
    pub fn read_tick_frame(&self) -> Result<TickFrame, SampleError> {
        let file = self.open("stat", STAT)?;
        TickFrame::read(BufReader::new(file), STAT)
    }

    pub fn read_meminfo_total(&self) -> Result<u64, SampleError> {
        let file = self.open("meminfo", MEMINFO)?;
        read_kb_field(BufReader::new(file), MEM_TOTAL_LABEL, MEMINFO)
    }

    /// Resident set size of the current process.
    pub fn read_resident(&self) -> Result<u64, SampleError> {
        let file = self.open("self/status", STATUS)?;
        read_kb_field(BufReader::new(file), VM_RSS_LABEL, STATUS)
    }

    /// Sums lifetime usage of every non-idle thread of the current process.
    ///
    /// Threads that exit during enumeration are skipped.
    pub fn read_thread_usage(&self) -> Result<ThreadUsage, SampleError> {
        let clock_ticks = self.clock_ticks;
        if clock_ticks == 0 {
            return Err(SampleError::unavailable(TASKS, "clock tick rate is zero"));
        }
        let uptime_ticks = self.read_uptime_ticks(clock_ticks)?;
        let entries =
            fs::read_dir(self.root.join("self/task")).map_err(|e| SampleError::io(TASKS, e))?;

        let mut usage = ThreadUsage {
            total_percent: 0.0,
            active_threads: 0,
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let Ok(contents) = fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            let Some(stat) = parse_thread_stat(&contents) else {
                tracing::debug!(task = ?entry.file_name(), "skipping malformed task stat");
                continue;
            };
            if stat.is_idle() {
                continue;
            }
            usage.total_percent += stat.lifetime_percent(uptime_ticks);
            usage.active_threads += 1;
        }
        Ok(usage)
    }

    fn read_uptime_ticks(&self, clock_ticks: u64) -> Result<u64, SampleError> {
        let contents = fs::read_to_string(self.root.join("uptime"))
            .map_err(|e| SampleError::io(UPTIME, e))?;
        let seconds: f64 = contents
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SampleError::parse(UPTIME, format!("unexpected content '{contents}'")))?;
        Ok((seconds * clock_ticks as f64) as u64)
    }

    fn open(&self, relative: &str, source_name: &'static str) -> Result<File, SampleError> {
        File::open(self.root.join(relative)).map_err(|e| SampleError::io(source_name, e))
    }
}

impl CounterSource for ProcFs {
    fn read_per_core_ticks(&self) -> Result<Vec<TickSnapshot>, SampleError> {
        Ok(self.read_tick_frame()?.per_core)
    }

    fn read_aggregate_ticks(&self) -> Result<TickSnapshot, SampleError> {
        self.read_tick_frame()?
            .aggregate
            .ok_or_else(|| SampleError::parse(STAT, "no aggregate cpu line"))
    }

    fn read_thread_usage(&self) -> Result<ThreadUsage, SampleError> {
        ProcFs::read_thread_usage(self)
    }

    fn read_meminfo_total(&self) -> Result<u64, SampleError> {
        ProcFs::read_meminfo_total(self)
    }

    fn read_process_resident(&self) -> Result<u64, SampleError> {
        self.read_resident()
    }

    fn read_tick_frame(&self) -> TickFrame {
        ProcFs::read_tick_frame(self).unwrap_or_default()
    }
}
