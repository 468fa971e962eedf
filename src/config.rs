//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MIMETREE_CONFIG` (environment variable)
//! 2. `~/.config/mimetree/config.toml` (Linux/macOS)
//!    `%APPDATA%\mimetree\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::parser::part::DEFAULT_MAX_DEPTH;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Decoder limits.
    pub decoder: DecoderConfig,
    /// Export defaults.
    pub export: ExportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override directory for the log file.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Limits applied before and during decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Largest input accepted, in bytes (default: 67108864 = 64 MB).
    pub max_message_size: usize,
    /// Multipart nesting depth beyond which parts are kept as leaves.
    pub max_depth: usize,
    /// Drop a leading mbox `From ` separator line before decoding.
    pub strip_mbox_from_line: bool,
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default output directory for extracted parts.
    pub default_output_dir: Option<PathBuf>,
    /// Longest file name written for an extracted part.
    pub max_filename_len: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024 * 1024, // 64 MB
            max_depth: DEFAULT_MAX_DEPTH,
            strip_mbox_from_line: true,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_output_dir: None,
            max_filename_len: 150,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration from [`config_file_path`].
///
/// A missing file yields the defaults silently; an unreadable or invalid
/// one yields the defaults with a warning.
pub fn load_config() -> Config {
    let Some(path) = config_file_path().filter(|p| p.exists()) else {
        return Config::default();
    };

    match read_config(&path) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "Loaded config");
            cfg
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring config file, using defaults");
            Config::default()
        }
    }
}

/// Parse the TOML config at `path`.
pub fn read_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Write `config` to `path` as pretty TOML, creating parent directories.
pub fn write_config(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(config)?)?;
    Ok(())
}

/// Save configuration to [`config_file_path`].
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    write_config(config, &path)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MIMETREE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mimetree").join("config.toml"))
}

/// Directory for the log file.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mimetree")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.decoder.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(cfg.decoder.max_message_size, 64 * 1024 * 1024);
        assert!(cfg.decoder.strip_mbox_from_line);
        assert_eq!(cfg.export.max_filename_len, 150);
    }

    #[test]
    fn test_write_then_read_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.decoder.max_message_size = 1024;
        cfg.export.default_output_dir = Some(PathBuf::from("/tmp/parts"));
        write_config(&cfg, &path).unwrap();

        let parsed = read_config(&path).unwrap();
        assert_eq!(parsed.decoder.max_message_size, 1024);
        assert_eq!(parsed.export.default_output_dir, cfg.export.default_output_dir);
        assert_eq!(parsed.general.log_level, "warn");
    }

    #[test]
    fn test_read_invalid_config_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[decoder]\nmax_depth = \"deep\"\n").unwrap();
        assert!(read_config(&path).is_err());
        assert!(read_config(&tmp.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[decoder]
max_depth = 4
"#;
        let cfg: Config = toml::from_str(partial).unwrap();
        assert_eq!(cfg.decoder.max_depth, 4);
        assert!(cfg.decoder.strip_mbox_from_line);
        assert_eq!(cfg.general.log_level, "warn");
    }
}
