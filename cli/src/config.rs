use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use wongus_bridge::BridgeConfig;

use crate::cli::CommonArgs;

/// TOML config file structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Bridge tuning
    pub bridge: BridgeSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    pub wait_secs: Option<u64>,
    pub pending_ttl_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub max_message_len: Option<usize>,
}

/// Merged configuration from file + CLI
pub struct MergedConfig {
    pub bridge: BridgeConfig,
    /// How long to wait for the host before giving up
    pub wait: Option<Duration>,
}

/// Load config from file
pub fn load_config(path: Option<&Path>) -> Result<FileConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            let config: FileConfig = toml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?;
            Ok(config)
        }
        None => Ok(FileConfig::default()),
    }
}

/// Merge file config with CLI args (CLI takes precedence)
pub fn merge_config(file: FileConfig, cli: &CommonArgs) -> Result<MergedConfig> {
    let file = file.bridge;
    let mut builder = BridgeConfig::builder();

    if let Some(secs) = cli.pending_ttl_secs.or(file.pending_ttl_secs) {
        builder = builder.pending_ttl(Duration::from_secs(secs));
    }

    if let Some(secs) = file.sweep_interval_secs {
        if secs == 0 {
            anyhow::bail!("sweep_interval_secs must be greater than zero");
        }
        builder = builder.sweep_interval(Duration::from_secs(secs));
    }

    if let Some(len) = cli.max_message_len.or(file.max_message_len) {
        builder = builder.max_message_len(len);
    }

    let wait = cli.wait_secs.or(file.wait_secs).map(Duration::from_secs);

    Ok(MergedConfig {
        bridge: builder.build(),
        wait,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wongus_bridge::DEFAULT_MAX_MESSAGE_LEN;

    fn parse(toml: &str) -> FileConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let merged = merge_config(FileConfig::default(), &CommonArgs::default()).unwrap();
        assert_eq!(merged.bridge.pending_ttl(), None);
        assert_eq!(merged.bridge.max_message_len(), DEFAULT_MAX_MESSAGE_LEN);
        assert_eq!(merged.wait, None);
    }

    #[test]
    fn test_file_values_apply() {
        let file = parse(
            r#"
            [bridge]
            wait_secs = 10
            pending_ttl_secs = 60
            sweep_interval_secs = 5
            max_message_len = 4096
            "#,
        );
        let merged = merge_config(file, &CommonArgs::default()).unwrap();
        assert_eq!(merged.wait, Some(Duration::from_secs(10)));
        assert_eq!(merged.bridge.pending_ttl(), Some(Duration::from_secs(60)));
        assert_eq!(merged.bridge.sweep_interval(), Duration::from_secs(5));
        assert_eq!(merged.bridge.max_message_len(), 4096);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = parse("[bridge]\nwait_secs = 10\npending_ttl_secs = 60\n");
        let cli = CommonArgs {
            wait_secs: Some(2),
            pending_ttl_secs: Some(30),
            max_message_len: None,
        };
        let merged = merge_config(file, &cli).unwrap();
        assert_eq!(merged.wait, Some(Duration::from_secs(2)));
        assert_eq!(merged.bridge.pending_ttl(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_rejects_zero_sweep_interval() {
        let file = parse("[bridge]\nsweep_interval_secs = 0\n");
        assert!(merge_config(file, &CommonArgs::default()).is_err());
    }

    #[test]
    fn test_unknown_sections_are_ignored() {
        let file = parse("[other]\nkey = 1\n");
        assert!(file.bridge.wait_secs.is_none());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/wongus-probe.toml"))).is_err());
    }
}
