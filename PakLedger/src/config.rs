//! Catalog configuration (`pakledger.toml`)
//!
//! Every field has a default, so an empty file (or no file at all) describes
//! the standard layout below the current directory:
//!
//! ```text
//! patches/<batch>/...           patch-batch directories
//! canonical/<store>/<pak>       symlinks into patch batches
//! checksums/<store>.sha256      per-store ledgers
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::hash::DigestAlgorithm;

/// Config file looked for in the working directory.
pub const CONFIG_FILE_NAME: &str = "pakledger.toml";

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_batch_dir() -> PathBuf {
    PathBuf::from("patches")
}
fn default_canonical_dir() -> PathBuf {
    PathBuf::from("canonical")
}
fn default_ledger_dir() -> PathBuf {
    PathBuf::from("checksums")
}
fn default_manifest_name() -> String {
    "manifest.txt".to_string()
}
fn default_audio_only_chunks() -> BTreeSet<u32> {
    // Chunks that only ever hold .wem audio
    [2, 3, 48, 49, 50, 51, 52, 53].into_iter().collect()
}

/// A storefront with its own canonical tree and ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum StoreId {
    Steam,
    Epic,
}

impl StoreId {
    pub const ALL: [StoreId; 2] = [StoreId::Steam, StoreId::Epic];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Steam => "steam",
            Self::Epic => "epic",
        }
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "steam" => Ok(Self::Steam),
            "epic" | "egs" => Ok(Self::Epic),
            _ => Err(Error::UnknownValue {
                kind: "storefront",
                value: s.to_string(),
            }),
        }
    }
}

/// Contents of `pakledger.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Base for every relative path below.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_batch_dir")]
    pub batch_dir: PathBuf,
    #[serde(default = "default_canonical_dir")]
    pub canonical_dir: PathBuf,
    #[serde(default = "default_ledger_dir")]
    pub ledger_dir: PathBuf,
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,
    #[serde(default)]
    pub digest: DigestAlgorithm,
    /// Hashing threads; 0 lets rayon decide.
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_audio_only_chunks")]
    pub audio_only_chunks: BTreeSet<u32>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            batch_dir: default_batch_dir(),
            canonical_dir: default_canonical_dir(),
            ledger_dir: default_ledger_dir(),
            manifest_name: default_manifest_name(),
            digest: DigestAlgorithm::default(),
            workers: 0,
            audio_only_chunks: default_audio_only_chunks(),
        }
    }
}

impl CatalogConfig {
    /// Parse a config file. A relative `root` is taken relative to the file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
        let mut config: Self = toml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if config.manifest_name.trim().is_empty() {
            return Err(Error::Config {
                path: path.to_path_buf(),
                message: "manifest_name must not be empty".to_string(),
            });
        }

        config.root = expand_path(&config.root);
        if config.root.is_relative()
            && let Some(parent) = path.parent()
        {
            config.root = parent.join(&config.root);
        }
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Find and load the configuration.
    ///
    /// Uses `explicit` if given; otherwise `./pakledger.toml`, then
    /// `<config dir>/pakledger/config.toml`, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Self::from_file(&local);
        }
        if let Some(user) = Self::user_config_path().filter(|p| p.is_file()) {
            return Self::from_file(&user);
        }
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pakledger").join("config.toml"))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        let path = expand_path(path);
        if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        }
    }

    pub fn batch_root(&self) -> PathBuf {
        self.resolve(&self.batch_dir)
    }

    /// Resolve a batch argument: an existing path, or a name under the batch root.
    pub fn batch_path(&self, batch: &Path) -> PathBuf {
        if batch.is_dir() || batch.components().count() > 1 {
            batch.to_path_buf()
        } else {
            self.batch_root().join(batch)
        }
    }

    /// Canonical symlink directory for a store.
    pub fn canonical_store_dir(&self, store: StoreId) -> PathBuf {
        self.resolve(&self.canonical_dir).join(store.as_str())
    }

    /// Ledger file for a store.
    pub fn ledger_path(&self, store: StoreId) -> PathBuf {
        self.resolve(&self.ledger_dir)
            .join(format!("{}.{}", store.as_str(), self.digest.as_str()))
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
