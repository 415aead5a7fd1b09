//! CLI configuration management.
//!
//! Handles chain defaults, keystore location and encryption parameters.

use anyhow::Context;
use keyforge_crypto::keystore::{Cipher, Kdf, KeystoreOptions};
use keyforge_crypto::DerivationPath;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest scrypt cost accepted in the config file.
const MAX_SCRYPT_LOG_N: u8 = 20;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Chain ID used when a request does not carry one
    pub chain_id: u64,
    /// Derivation path used when none is given
    pub default_path: String,
    /// Keystore directory
    pub keystore_dir: PathBuf,
    /// Log filter, e.g. "info" or "keyforge_crypto=debug"
    pub log_level: String,
    /// Emit logs as JSON
    pub log_json: bool,
    /// Keystore encryption parameters
    pub keystore: KeystoreConfig,
}

/// `[keystore]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeystoreConfig {
    pub kdf: KdfKind,
    pub scrypt_log_n: u8,
    pub scrypt_r: u32,
    pub scrypt_p: u32,
    pub pbkdf2_iterations: u32,
    pub cipher: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfKind {
    Scrypt,
    Pbkdf2,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            default_path: "m/44'/60'/0'/0/0".to_string(),
            keystore_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".keyforge")
                .join("keystore"),
            log_level: "warn".to_string(),
            log_json: false,
            keystore: KeystoreConfig::default(),
        }
    }
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            kdf: KdfKind::Scrypt,
            scrypt_log_n: 18,
            scrypt_r: 8,
            scrypt_p: 1,
            pbkdf2_iterations: 262_144,
            cipher: Cipher::Aes128Ctr.as_str().to_string(),
        }
    }
}

impl CliConfig {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing file yields the defaults. Values that fail validation are
    /// rejected here rather than at first use.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("parsing {}", config_path.display()))?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Default configuration file path.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".keyforge").join("config.toml"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chain_id == 0 {
            anyhow::bail!("chain_id must be positive");
        }
        self.derivation_path()?;
        self.keystore_options()?;
        Ok(())
    }

    pub fn derivation_path(&self) -> anyhow::Result<DerivationPath> {
        self.default_path
            .parse()
            .with_context(|| format!("invalid default_path {:?}", self.default_path))
    }

    pub fn keystore_options(&self) -> anyhow::Result<KeystoreOptions> {
        let ks = &self.keystore;
        let cipher: Cipher = ks.cipher.parse()?;
        let kdf = match ks.kdf {
            KdfKind::Scrypt => {
                if ks.scrypt_log_n == 0 || ks.scrypt_log_n > MAX_SCRYPT_LOG_N {
                    anyhow::bail!("scrypt_log_n must be between 1 and {}", MAX_SCRYPT_LOG_N);
                }
                if ks.scrypt_r == 0 || ks.scrypt_p == 0 {
                    anyhow::bail!("scrypt_r and scrypt_p must be positive");
                }
                Kdf::Scrypt {
                    log_n: ks.scrypt_log_n,
                    r: ks.scrypt_r,
                    p: ks.scrypt_p,
                }
            }
            KdfKind::Pbkdf2 => {
                if ks.pbkdf2_iterations == 0 {
                    anyhow::bail!("pbkdf2_iterations must be positive");
                }
                Kdf::Pbkdf2 {
                    iterations: ks.pbkdf2_iterations,
                }
            }
        };
        Ok(KeystoreOptions { kdf, cipher })
    }
}
