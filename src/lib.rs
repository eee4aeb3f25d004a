//! # perfprobe
//!
//! On-demand memory and CPU sampling for the current process and its host.
//!
//! Raw counters come from whatever the platform offers (procfs tick lines,
//! Mach host and thread info, Windows system times, the `sysinfo` host
//! memory API). When the preferred facility is missing or unreadable the
//! engine falls back tier by tier, and in the worst case answers with
//! zeros. Sampling calls never fail.
//!
//! ```no_run
//! use perfprobe::Sampler;
//!
//! let sampler = Sampler::new();
//! let memory = sampler.sample_memory();
//! let cpu = sampler.sample_cpu();
//! println!("{:.1}% memory, {:.1}% cpu", memory.percent_used, cpu.total_usage);
//! ```

pub mod config;
pub mod dispatch;
mod error;
pub mod format;
pub mod system;

pub use dispatch::{Operation, Response};
pub use error::SampleError;
pub use system::collector::{DeltaCpuSampler, Sampler};
pub use system::cpu::{CpuSample, CpuSource};
pub use system::memory::{MemorySample, MemorySource};
pub use system::resolver::MemoryScope;
pub use system::source::{CounterSource, SourceAvailability};
