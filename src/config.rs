//! Configuration loading for error-trapper
//!
//! Reads `.error-trapper.toml`, found by walking up from a start directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::provider::DEFAULT_BUNDLE;

pub const CONFIG_FILE_NAME: &str = ".error-trapper.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrapperConfig {
    /// Grammar bundle handed to the syntax provider
    pub grammar: String,

    /// Local directory that file references (URLs, relative paths) map onto
    pub source_root: Option<PathBuf>,

    /// Extra substrings marking frames as non-application code
    pub internal_patterns: Vec<String>,

    /// Analyze files that contain syntax errors instead of failing
    pub tolerate_syntax_errors: bool,
}

impl Default for TrapperConfig {
    fn default() -> Self {
        Self {
            grammar: DEFAULT_BUNDLE.to_string(),
            source_root: None,
            internal_patterns: Vec::new(),
            tolerate_syntax_errors: false,
        }
    }
}

/// Find `.error-trapper.toml` starting from a path and walking up
pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
    let mut current = if start_path.is_file() {
        start_path.parent()?
    } else {
        start_path
    };

    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// Load configuration from a file. A relative `source_root` is taken
/// relative to the directory holding the file.
pub fn load_config(path: &Path) -> Result<TrapperConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config '{}'", path.display()))?;
    let mut config: TrapperConfig = toml::from_str(&content)
        .with_context(|| format!("invalid config '{}'", path.display()))?;

    if let (Some(root), Some(dir)) = (&config.source_root, path.parent()) {
        if root.is_relative() {
            config.source_root = Some(dir.join(root));
        }
    }
    debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Config found above `start`, or the defaults when there is none.
pub fn discover_config(start: &Path) -> Result<TrapperConfig> {
    match find_config_file(start) {
        Some(path) => load_config(&path),
        None => {
            debug!("no {CONFIG_FILE_NAME} above {}, using defaults", start.display());
            Ok(TrapperConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "grammar = \"js\"\n").unwrap();

        assert_eq!(find_config_file(dir.path()), Some(config_path.clone()));

        let nested = dir.path().join("src").join("lib");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_config_file(&nested), Some(config_path.clone()));

        let file = nested.join("app.js");
        fs::write(&file, "").unwrap();
        assert_eq!(find_config_file(&file), Some(config_path));
    }

    #[test]
    fn test_load_config() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let content = r#"
grammar = "jsx"
source_root = "public"
internal_patterns = ["/vendor/", "webpack/bootstrap"]
tolerate_syntax_errors = true
"#;
        fs::write(&config_path, content).unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.grammar, "jsx");
        assert_eq!(config.source_root, Some(dir.path().join("public")));
        assert_eq!(config.internal_patterns, vec!["/vendor/", "webpack/bootstrap"]);
        assert!(config.tolerate_syntax_errors);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "source_root = \"/srv/www\"\n").unwrap();

        let config = discover_config(dir.path()).unwrap();
        assert_eq!(config.grammar, DEFAULT_BUNDLE);
        assert_eq!(config.source_root, Some(PathBuf::from("/srv/www")));
        assert!(config.internal_patterns.is_empty());
    }

    #[test]
    fn test_invalid_config_reports_path() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "grammar = [").unwrap();

        let err = load_config(&config_path).unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }
}
