use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::system::procfs::DEFAULT_ROOT;
use crate::system::resolver::MemoryScope;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampler: SamplerConfig,
    pub sources: SourcesConfig,
    pub output: OutputConfig,
}

/// How CPU utilization is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuMode {
    /// One snapshot per request; utilization since boot.
    #[default]
    Cumulative,
    /// Two snapshots `delta_interval_ms` apart.
    Delta,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub cpu_mode: CpuMode,
    pub delta_interval_ms: u64,
    pub memory_scope: MemoryScope,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            cpu_mode: CpuMode::Cumulative,
            delta_interval_ms: 250,
            memory_scope: MemoryScope::Host,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub procfs_root: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        SourcesConfig {
            procfs_root: PathBuf::from(DEFAULT_ROOT),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("perfprobe").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), error = %err, "invalid config, using defaults");
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.sampler.cpu_mode, CpuMode::Cumulative);
        assert_eq!(config.sampler.delta_interval_ms, 250);
        assert_eq!(config.sampler.memory_scope, MemoryScope::Host);
        assert_eq!(config.sources.procfs_root, PathBuf::from("/proc"));
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[sampler]
delta_interval_ms = 1000
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sampler.delta_interval_ms, 1000);
        // Other fields should be defaults
        assert_eq!(config.sampler.cpu_mode, CpuMode::Cumulative);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[sampler]
cpu_mode = "delta"
delta_interval_ms = 500
memory_scope = "process"

[sources]
procfs_root = "/host/proc"

[output]
format = "json"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sampler.cpu_mode, CpuMode::Delta);
        assert_eq!(config.sampler.delta_interval_ms, 500);
        assert_eq!(config.sampler.memory_scope, MemoryScope::Process);
        assert_eq!(config.sources.procfs_root, PathBuf::from("/host/proc"));
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.sampler.delta_interval_ms, 250);
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("perfprobe_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.sampler.delta_interval_ms, 250);
        let _ = std::fs::remove_file(&temp);
    }

    #[test]
    fn unknown_mode_is_rejected_as_a_whole() {
        let temp = std::env::temp_dir().join("perfprobe_test_bad_mode.toml");
        std::fs::write(&temp, "[sampler]\ncpu_mode = \"sometimes\"\n").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.sampler.cpu_mode, CpuMode::Cumulative);
        let _ = std::fs::remove_file(&temp);
    }
}
