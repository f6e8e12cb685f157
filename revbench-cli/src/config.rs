//! Configuration loading from revbench.toml
//!
//! The file is discovered by walking up from the current directory. Command-line
//! flags override whatever it sets.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file
pub const CONFIG_FILE: &str = "revbench.toml";

/// revbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RevbenchConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Options forwarded to the selected executor
    #[serde(default)]
    pub executor: toml::Table,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// How subjects are run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Executor name: "microtime" or "trace"
    #[serde(default = "default_executor")]
    pub executor: String,
    /// Timeout for a single iteration (e.g., "60s", "5m")
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Override the iteration count of every subject
    #[serde(default)]
    pub iterations: Option<u32>,
    /// Override the revolutions of every subject
    #[serde(default)]
    pub revs: Option<u32>,
    /// Override the warmup of every subject
    #[serde(default)]
    pub warmup: Option<u32>,
    /// Override the rejection threshold, in percent
    #[serde(default)]
    pub retry_threshold: Option<f64>,
    /// Rounds of re-measuring rejected iterations
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Label stored on the suite
    #[serde(default)]
    pub context: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            executor: default_executor(),
            timeout: default_timeout(),
            iterations: None,
            revs: None,
            warmup: None,
            retry_threshold: None,
            max_retries: default_max_retries(),
            context: None,
        }
    }
}

fn default_executor() -> String {
    "microtime".to_string()
}
fn default_timeout() -> String {
    "60s".to_string()
}
fn default_max_retries() -> u32 {
    10
}

/// Where results go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Suite document written after each run
    #[serde(default = "default_dump_file")]
    pub dump_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dump_file: default_dump_file(),
        }
    }
}

fn default_dump_file() -> PathBuf {
    PathBuf::from("target/revbench/suite.xml")
}

impl RevbenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find `revbench.toml` by walking up from the current directory
    pub fn discover() -> Option<PathBuf> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Executor options as a JSON object
    pub fn executor_options(&self) -> anyhow::Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(&self.executor)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(anyhow::anyhow!("executor options must be a table, got {other}")),
        }
    }

    /// Timeout for a single iteration
    pub fn timeout(&self) -> anyhow::Result<Duration> {
        Ok(Duration::from_nanos(Self::parse_duration(&self.runner.timeout)?))
    }

    /// Generate a default configuration as TOML string
    #[cfg(test)]
    pub(crate) fn default_toml() -> String {
        r#"# revbench configuration

[runner]
# Executor: "microtime" (time + memory) or "trace" (per-revolution trace)
executor = "microtime"
# Timeout for a single iteration
timeout = "60s"
# Rounds of re-measuring rejected iterations
max_retries = 10
# Overrides applied to every subject (uncomment to enable)
# iterations = 5
# revs = 100
# warmup = 1
# retry_threshold = 5.0
# context = "nightly"

[executor]
# Options for the selected executor, e.g. for "trace":
# output_dir = "target/revbench/trace"
# keep_artifacts = false

[output]
# Suite document written after each run
dump_file = "target/revbench/suite.xml"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> anyhow::Result<u64> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Invalid duration: {}", s));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok((value * multiplier as f64) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RevbenchConfig::default();
        assert_eq!(config.runner.executor, "microtime");
        assert_eq!(config.runner.max_retries, 10);
        assert_eq!(config.timeout().unwrap(), Duration::from_secs(60));
        assert_eq!(config.output.dump_file, PathBuf::from("target/revbench/suite.xml"));
        assert!(config.executor_options().unwrap().is_empty());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(RevbenchConfig::parse_duration("3s").unwrap(), 3_000_000_000);
        assert_eq!(RevbenchConfig::parse_duration("500ms").unwrap(), 500_000_000);
        assert_eq!(RevbenchConfig::parse_duration("100us").unwrap(), 100_000);
        assert_eq!(RevbenchConfig::parse_duration("1000ns").unwrap(), 1000);
        assert_eq!(RevbenchConfig::parse_duration("2m").unwrap(), 120_000_000_000);
        assert_eq!(RevbenchConfig::parse_duration("1.5s").unwrap(), 1_500_000_000);
        assert_eq!(RevbenchConfig::parse_duration("7").unwrap(), 7_000_000_000);
        assert!(RevbenchConfig::parse_duration("").is_err());
        assert!(RevbenchConfig::parse_duration("3 fortnights").is_err());
        assert!(RevbenchConfig::parse_duration("-1s").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [runner]
            executor = "trace"
            revs = 50
            retry_threshold = 2.5

            [executor]
            output_dir = "/tmp/traces"
            keep_artifacts = true
        "#;

        let config: RevbenchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.executor, "trace");
        assert_eq!(config.runner.revs, Some(50));
        assert_eq!(config.runner.retry_threshold, Some(2.5));
        // Defaults should still apply
        assert_eq!(config.runner.timeout, "60s");

        let options = config.executor_options().unwrap();
        assert_eq!(options["output_dir"], serde_json::json!("/tmp/traces"));
        assert_eq!(options["keep_artifacts"], serde_json::json!(true));
    }

    #[test]
    fn test_default_toml_parses() {
        let config: RevbenchConfig = toml::from_str(&RevbenchConfig::default_toml()).unwrap();
        assert_eq!(config.runner.executor, "microtime");
        assert!(config.executor.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[runner]\ntimeout = \"250ms\"\n").unwrap();

        let config = RevbenchConfig::load(&path).unwrap();
        assert_eq!(config.timeout().unwrap(), Duration::from_millis(250));
    }
}
