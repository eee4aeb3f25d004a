//! Headless self-measurement: times the engine's own sampling spans.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use color_eyre::eyre::{Result, eyre};
use serde::Serialize;
use serde_json::Value;

const TRACKED_SPANS: [&str; 4] = [
    "sampler.sample_cpu",
    "sampler.sample_memory",
    "resolver.cpu",
    "resolver.memory",
];

pub fn init_tracing_json(output_path: &Path) -> Result<()> {
    use tracing_subscriber::fmt::format::FmtSpan;

    ensure_parent_dir(output_path)?;
    let file = File::create(output_path)?;
    let make_writer = move || {
        file.try_clone()
            .expect("failed to clone perf tracing output file")
    };

    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(make_writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| eyre!("failed to set tracing subscriber: {e}"))?;
    Ok(())
}

/// Summarises the span log into `perf_baseline.json` and
/// `PERF_BASELINE.md` beside it. Returns the JSON path.
pub fn write_baseline_artifacts(span_log_path: &Path, iterations: usize) -> Result<PathBuf> {
    if iterations == 0 {
        return Err(eyre!("no sampling iterations captured during perf run"));
    }
    let spans = parse_span_stats(span_log_path)?;

    let baseline = PerfBaseline {
        generated_at_unix_s: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| eyre!("system clock is before UNIX_EPOCH: {e}"))?
            .as_secs(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        iterations,
        span_log_path: span_log_path.display().to_string(),
        spans,
    };

    let dir = span_log_path.parent().unwrap_or(Path::new("."));
    let json_path = dir.join("perf_baseline.json");
    let markdown_path = dir.join("PERF_BASELINE.md");

    fs::write(&json_path, serde_json::to_string_pretty(&baseline)?)?;
    fs::write(&markdown_path, render_markdown(&baseline))?;

    Ok(json_path)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn parse_span_stats(path: &Path) -> Result<BTreeMap<String, SpanStats>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut samples: HashMap<String, Vec<f64>> = HashMap::new();
    for &name in &TRACKED_SPANS {
        samples.insert(name.to_string(), Vec::new());
    }

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        let Some(span_name) = extract_span_name(&value) else {
            continue;
        };
        let Some(us) = extract_busy_duration(&value).and_then(parse_duration_to_us) else {
            continue;
        };
        if let Some(vec) = samples.get_mut(span_name) {
            vec.push(us);
        }
    }

    let mut out = BTreeMap::new();
    for &name in &TRACKED_SPANS {
        let mut values = samples.remove(name).unwrap_or_default();
        out.insert(name.to_string(), summarize_samples(&mut values));
    }
    Ok(out)
}

fn extract_span_name(value: &Value) -> Option<&str> {
    value
        .get("span")
        .and_then(|span| span.get("name"))
        .and_then(Value::as_str)
        .or_else(|| {
            value
                .get("spans")
                .and_then(Value::as_array)
                .and_then(|arr| arr.last())
                .and_then(|span| span.get("name"))
                .and_then(Value::as_str)
        })
}

fn extract_busy_duration(value: &Value) -> Option<&str> {
    value
        .get("fields")
        .and_then(|f| f.get("time.busy"))
        .and_then(Value::as_str)
}

fn parse_duration_to_us(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if let Some(v) = s.strip_suffix("ns") {
        return v.trim().parse::<f64>().ok().map(|n| n / 1000.0);
    }
    if let Some(v) = s.strip_suffix("µs").or_else(|| s.strip_suffix("μs")) {
        return v.trim().parse::<f64>().ok();
    }
    if let Some(v) = s.strip_suffix("us") {
        return v.trim().parse::<f64>().ok();
    }
    if let Some(v) = s.strip_suffix("ms") {
        return v.trim().parse::<f64>().ok().map(|ms| ms * 1000.0);
    }
    if let Some(v) = s.strip_suffix('s') {
        return v.trim().parse::<f64>().ok().map(|secs| secs * 1_000_000.0);
    }
    None
}

fn summarize_samples(values: &mut [f64]) -> SpanStats {
    if values.is_empty() {
        return SpanStats::default();
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let last = values.len() - 1;
    let p50_idx = ((last as f64) * 0.50).round() as usize;
    let p95_idx = ((last as f64) * 0.95).round() as usize;

    SpanStats {
        count: values.len(),
        p50_us: round_2(values[p50_idx]),
        p95_us: round_2(values[p95_idx]),
        max_us: round_2(values[last]),
    }
}

fn round_2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn render_markdown(baseline: &PerfBaseline) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Sampling Overhead Baseline");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Generated (unix): `{}`", baseline.generated_at_unix_s);
    let _ = writeln!(out, "- Platform: `{}` / `{}`", baseline.os, baseline.arch);
    let _ = writeln!(out, "- Iterations: `{}`", baseline.iterations);
    let _ = writeln!(out);
    let _ = writeln!(out, "| Span | Count | p50 | p95 | max |");
    let _ = writeln!(out, "| --- | ---: | ---: | ---: | ---: |");
    for (name, stats) in &baseline.spans {
        let _ = writeln!(
            out,
            "| `{}` | {} | {:.2} | {:.2} | {:.2} |",
            name, stats.count, stats.p50_us, stats.p95_us, stats.max_us
        );
    }
    out
}

#[derive(Debug, Serialize)]
struct PerfBaseline {
    generated_at_unix_s: u64,
    os: String,
    arch: String,
    iterations: usize,
    span_log_path: String,
    spans: BTreeMap<String, SpanStats>,
}

#[derive(Debug, Default, Serialize)]
struct SpanStats {
    count: usize,
    p50_us: f64,
    p95_us: f64,
    max_us: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_parsing_supported_units() {
        assert_eq!(parse_duration_to_us("100ns"), Some(0.1));
        assert_eq!(parse_duration_to_us("10us"), Some(10.0));
        assert_eq!(parse_duration_to_us("10µs"), Some(10.0));
        assert_eq!(parse_duration_to_us("2.5ms"), Some(2500.0));
        assert_eq!(parse_duration_to_us("1s"), Some(1_000_000.0));
        assert_eq!(parse_duration_to_us("soon"), None);
    }

    #[test]
    fn span_log_is_summarised() {
        let path = std::env::temp_dir().join("perfprobe_perf_spans.jsonl");
        let lines = [
            r#"{"span":{"name":"sampler.sample_cpu"},"fields":{"time.busy":"10µs"}}"#,
            r#"{"span":{"name":"sampler.sample_cpu"},"fields":{"time.busy":"30µs"}}"#,
            r#"{"span":{"name":"other"},"fields":{"time.busy":"5ms"}}"#,
            "not json",
        ];
        fs::write(&path, lines.join("\n")).unwrap();

        let stats = parse_span_stats(&path).unwrap();
        let cpu = &stats["sampler.sample_cpu"];
        assert_eq!(cpu.count, 2);
        assert_eq!(cpu.max_us, 30.0);
        assert_eq!(stats["resolver.memory"].count, 0);
        assert!(!stats.contains_key("other"));

        let _ = fs::remove_file(&path);
    }
}
