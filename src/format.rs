use std::fmt::Write;

use crate::dispatch::Response;
use crate::system::cpu::CpuSample;
use crate::system::memory::MemorySample;

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

pub fn render_memory(sample: &MemorySample) -> String {
    format!(
        "memory: {} used of {} ({}), {} available [{:?}]",
        format_bytes(sample.used_memory),
        format_bytes(sample.total_memory),
        format_percent(sample.percent_used),
        format_bytes(sample.available_memory),
        sample.source,
    )
}

pub fn render_cpu(sample: &CpuSample) -> String {
    let mut out = format!(
        "cpu: {} [{:?}]",
        format_percent(sample.total_usage),
        sample.source
    );
    if sample.is_estimated() {
        out.push_str(" (estimated)");
    }
    for (core, usage) in sample.per_core_usage.iter().enumerate() {
        let _ = write!(out, "\n  core {core}: {}", format_percent(*usage));
    }
    out
}

/// Human-readable rendering of an operation's answer.
pub fn render_text(response: &Response) -> String {
    match response {
        Response::Memory(sample) => render_memory(sample),
        Response::Cpu(sample) => render_cpu(sample),
        Response::Bytes(bytes) => format_bytes(*bytes),
        Response::Percent(value) => format_percent(*value),
        Response::Snapshot(snapshot) => {
            format!("{}\n{}", render_memory(&snapshot.memory), render_cpu(&snapshot.cpu))
        }
    }
}
