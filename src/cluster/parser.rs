//! Cluster definition file parser

use super::config::ClusterConfig;
use crate::error::{FlotillaError, Result};
use std::path::Path;

/// Default definition file names
pub const DEFAULT_DEFINITION_FILES: &[&str] = &["cluster.yaml", "cluster.yml"];

/// Cluster definition parser
pub struct ClusterParser;

impl ClusterParser {
    /// Find a definition file in a directory
    pub fn find_definition_file(dir: &Path) -> Option<std::path::PathBuf> {
        for name in DEFAULT_DEFINITION_FILES {
            let path = dir.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }

    /// Parse a definition file from a path
    pub fn parse_file(path: &Path) -> Result<ClusterConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlotillaError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_str(&content)
    }

    /// Parse a definition from a string
    pub fn parse_str(content: &str) -> Result<ClusterConfig> {
        serde_yaml::from_str(content)
            .map_err(|e| FlotillaError::Config(format!("Failed to parse YAML: {}", e)))
    }
}
