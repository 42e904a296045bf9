//! Configuration management for attuned.
//!
//! Loads settings from /etc/attune/config.toml or uses defaults. Every
//! field is serde-defaulted so a partial file only overrides what it
//! names.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/attune/config.toml";

/// One workload signature: any keyword matching a running process name
/// activates the domain's reasoning unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureConfig {
    pub domain: String,
    pub keywords: Vec<String>,
}

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttuneConfig {
    /// Orchestration cadence in seconds
    #[serde(default = "default_cycle_seconds")]
    pub cycle_seconds: u64,

    /// Per-unit share ceiling on a contended dimension, 0.0-1.0
    #[serde(default = "default_resource_ceiling")]
    pub resource_ceiling: f64,

    /// Minimum confidence for a recommendation to be admitted
    #[serde(default = "default_admission_floor")]
    pub admission_floor: f64,

    /// Bound on simultaneously active attention vectors
    #[serde(default = "default_max_attention_vectors")]
    pub max_attention_vectors: usize,

    /// Per-unit reason() timeout in milliseconds
    #[serde(default = "default_reason_timeout_ms")]
    pub reason_timeout_ms: u64,

    /// Floor below which a conflicting unit's allocation is never cut
    #[serde(default = "default_min_viable_share")]
    pub min_viable_share: f64,

    /// Retire a unit after this many consecutive cycles without its
    /// signature; 0 keeps units indefinitely
    #[serde(default = "default_retire_after_cycles")]
    pub retire_after_cycles: u32,

    /// Workload signature table
    #[serde(default = "default_signatures")]
    pub signatures: Vec<SignatureConfig>,
}

fn default_cycle_seconds() -> u64 {
    5
}

fn default_resource_ceiling() -> f64 {
    0.30
}

fn default_admission_floor() -> f64 {
    0.6
}

fn default_max_attention_vectors() -> usize {
    3
}

fn default_reason_timeout_ms() -> u64 {
    300
}

fn default_min_viable_share() -> f64 {
    0.05
}

fn default_retire_after_cycles() -> u32 {
    0
}

fn default_signatures() -> Vec<SignatureConfig> {
    vec![
        SignatureConfig {
            domain: "gaming".to_string(),
            keywords: vec![
                "steam".to_string(),
                "lutris".to_string(),
                "wine".to_string(),
                "proton".to_string(),
                "gamescope".to_string(),
            ],
        },
        SignatureConfig {
            domain: "streaming".to_string(),
            keywords: vec![
                "obs".to_string(),
                "streamlabs".to_string(),
                "ffmpeg".to_string(),
            ],
        },
        SignatureConfig {
            domain: "development".to_string(),
            keywords: vec![
                "cargo".to_string(),
                "rustc".to_string(),
                "gcc".to_string(),
                "clang".to_string(),
                "make".to_string(),
                "node".to_string(),
            ],
        },
    ]
}

impl Default for AttuneConfig {
    fn default() -> Self {
        Self {
            cycle_seconds: default_cycle_seconds(),
            resource_ceiling: default_resource_ceiling(),
            admission_floor: default_admission_floor(),
            max_attention_vectors: default_max_attention_vectors(),
            reason_timeout_ms: default_reason_timeout_ms(),
            min_viable_share: default_min_viable_share(),
            retire_after_cycles: default_retire_after_cycles(),
            signatures: default_signatures(),
        }
    }
}

impl AttuneConfig {
    /// Load from the standard path, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_PATH))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        match toml::from_str::<Self>(&content) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                Ok(config.sanitized())
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                Err(e.into())
            }
        }
    }

    /// Clamp float knobs into their valid ranges.
    pub fn sanitized(mut self) -> Self {
        self.resource_ceiling = self.resource_ceiling.clamp(0.01, 1.0);
        self.admission_floor = self.admission_floor.clamp(0.0, 1.0);
        self.min_viable_share = self.min_viable_share.clamp(0.0, self.resource_ceiling);
        self.max_attention_vectors = self.max_attention_vectors.max(1);
        self.cycle_seconds = self.cycle_seconds.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AttuneConfig::default();
        assert_eq!(config.cycle_seconds, 5);
        assert_eq!(config.resource_ceiling, 0.30);
        assert_eq!(config.admission_floor, 0.6);
        assert_eq!(config.max_attention_vectors, 3);
        assert_eq!(config.retire_after_cycles, 0);
        assert_eq!(config.signatures.len(), 3);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AttuneConfig::load_from(Path::new("/nonexistent/attune.toml")).unwrap();
        assert_eq!(config.cycle_seconds, 5);
    }

    #[test]
    fn test_partial_file_overrides_named_fields_only() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cycle_seconds = 10\nadmission_floor = 0.8").unwrap();

        let config = AttuneConfig::load_from(file.path()).unwrap();
        assert_eq!(config.cycle_seconds, 10);
        assert_eq!(config.admission_floor, 0.8);
        assert_eq!(config.resource_ceiling, 0.30);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cycle_seconds = \"not a number\"").unwrap();
        assert!(AttuneConfig::load_from(file.path()).is_err());
    }

    #[test]
    fn test_sanitize_clamps_knobs() {
        let config = AttuneConfig {
            resource_ceiling: 2.0,
            admission_floor: -0.5,
            min_viable_share: 0.9,
            max_attention_vectors: 0,
            cycle_seconds: 0,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(config.resource_ceiling, 1.0);
        assert_eq!(config.admission_floor, 0.0);
        assert!(config.min_viable_share <= config.resource_ceiling);
        assert_eq!(config.max_attention_vectors, 1);
        assert_eq!(config.cycle_seconds, 1);
    }

    #[test]
    fn test_signature_table_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[signatures]]\ndomain = \"gaming\"\nkeywords = [\"mygame\"]"
        )
        .unwrap();

        let config = AttuneConfig::load_from(file.path()).unwrap();
        assert_eq!(config.signatures.len(), 1);
        assert_eq!(config.signatures[0].keywords, vec!["mygame"]);
    }
}
