// Wrench Configuration
// Construction-time settings for a Context. Loadable from JSON (wrench.json).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::arena::{DEFAULT_NODE_ARENA_SIZE, DEFAULT_SOURCE_ARENA_SIZE};
use crate::error::{Error, Result};

pub const DEFAULT_BASE_PATH: &str = "./";
pub const DEFAULT_SCRIPT_EXTENSION: &str = "wren";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Capacity of the arena holding registry records and names
    pub node_arena_size: usize,
    /// Capacity of the arena holding module source text
    pub source_arena_size: usize,
    /// Prefix for native libraries and script files. Defaults to "./"
    pub base_path: Option<String>,
    pub foreign_library_loading: bool,
    /// Extension the default file reader appends to module names
    pub script_extension: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            node_arena_size: DEFAULT_NODE_ARENA_SIZE,
            source_arena_size: DEFAULT_SOURCE_ARENA_SIZE,
            base_path: None,
            foreign_library_loading: true,
            script_extension: DEFAULT_SCRIPT_EXTENSION.to_string(),
        }
    }
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_arena_size(mut self, size: usize) -> Self {
        self.node_arena_size = size;
        self
    }

    pub fn source_arena_size(mut self, size: usize) -> Self {
        self.source_arena_size = size;
        self
    }

    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    pub fn foreign_library_loading(mut self, enabled: bool) -> Self {
        self.foreign_library_loading = enabled;
        self
    }

    pub fn script_extension(mut self, extension: impl Into<String>) -> Self {
        self.script_extension = extension.into();
        self
    }

    pub fn resolved_base_path(&self) -> &str {
        self.base_path.as_deref().unwrap_or(DEFAULT_BASE_PATH)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.script_extension.is_empty() || self.script_extension.starts_with('.') {
            return Err(Error::config(format!(
                "script_extension must be a bare extension, got \"{}\"",
                self.script_extension
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ContextConfig::default();
        assert_eq!(config.node_arena_size, 1024 * 1024);
        assert_eq!(config.source_arena_size, 1024 * 1024);
        assert_eq!(config.resolved_base_path(), "./");
        assert!(config.foreign_library_loading);
        assert_eq!(config.script_extension, "wren");
    }

    #[test]
    fn test_builder_setters() {
        let config = ContextConfig::new()
            .node_arena_size(512)
            .base_path("lib/")
            .foreign_library_loading(false);
        assert_eq!(config.node_arena_size, 512);
        assert_eq!(config.resolved_base_path(), "lib/");
        assert!(!config.foreign_library_loading);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            ContextConfig::from_json_str(r#"{ "base_path": "mods/", "source_arena_size": 2048 }"#)
                .unwrap();
        assert_eq!(config.resolved_base_path(), "mods/");
        assert_eq!(config.source_arena_size, 2048);
        assert_eq!(config.node_arena_size, DEFAULT_NODE_ARENA_SIZE);
        assert!(config.foreign_library_loading);
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = ContextConfig::from_json_str("{ node_arena_size: }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = ContextConfig::from_json_str(r#"{ "script_extension": ".wren" }"#).unwrap_err();
        assert!(err.to_string().contains("bare extension"));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "foreign_library_loading": false }}"#).unwrap();

        let config = ContextConfig::from_json_file(file.path()).unwrap();
        assert!(!config.foreign_library_loading);

        let missing = ContextConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_json_output_reloads() {
        let config = ContextConfig::new().base_path("x/");
        let json = config.to_json_string().unwrap();
        assert_eq!(ContextConfig::from_json_str(&json).unwrap(), config);
    }
}
