use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the arranger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrangerConfig {
    #[serde(default)]
    pub project: ProjectDefaults,
    #[serde(default)]
    pub mixer: MixerDefaults,
}

impl ArrangerConfig {
    /// Parses a configuration document. Missing sections and fields fall back
    /// to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = ?path.as_ref(), "loaded arranger config");
        Self::from_json_str(&contents)
    }
}

/// Values stamped into freshly created projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectDefaults {
    pub name: String,
    pub bpm: f64,
    pub generator: String,
    pub format_version: String,
}

impl Default for ProjectDefaults {
    fn default() -> Self {
        Self {
            name: "Untitled Project".to_string(),
            bpm: 120.0,
            generator: "Strudel Music Coder".to_string(),
            format_version: "1.0".to_string(),
        }
    }
}

/// Configuration specific to the master volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerDefaults {
    pub volume: f64,
}

impl Default for MixerDefaults {
    fn default() -> Self {
        Self { volume: 1.0 }
    }
}
