// Copyright 2026 danecert contributors
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default listen port for the issuance service.
pub const DEFAULT_PORT: u16 = 2588;

/// Default root directory for persisted certificates and keys.
pub const DEFAULT_ROOT: &str = "certificates";

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Port the HTTP service listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Root directory for issued artifacts.
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            root: default_root(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| Error::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config("port cannot be 0".into()));
        }
        if self.root.as_os_str().is_empty() {
            return Err(Error::Config("root directory cannot be empty".into()));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| Error::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Domain-scoped artifact layout: `root/<domain>/<domain>.crt` and `.key`.
#[derive(Debug, Clone)]
pub struct Paths {
    pub root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Build paths rooted at `root`, unless `DANECERT_ROOT` overrides it.
    pub fn from_env_or(root: PathBuf) -> Self {
        match std::env::var_os("DANECERT_ROOT") {
            Some(custom) => Self::new(PathBuf::from(custom)),
            None => Self::new(root),
        }
    }

    /// Reject domain strings that are unsafe as path components. The domain
    /// flows directly into the filesystem layout, so traversal sequences and
    /// separator characters must never reach `Path::join`.
    fn sanitize_domain_for_path(domain: &str) -> Result<String> {
        if domain.is_empty() {
            return Err(Error::InvalidDomain {
                domain: domain.to_string(),
                reason: "domain cannot be empty".into(),
            });
        }

        if domain.contains('\0') {
            return Err(Error::InvalidDomain {
                domain: domain.to_string(),
                reason: "domain contains null byte".into(),
            });
        }

        // Percent-encoded traversal could survive a naive check
        if domain.contains('%') {
            return Err(Error::InvalidDomain {
                domain: domain.to_string(),
                reason: "domain contains percent encoding (potential path traversal)".into(),
            });
        }

        if domain.contains("..") {
            return Err(Error::InvalidDomain {
                domain: domain.to_string(),
                reason: "domain contains path traversal sequence".into(),
            });
        }

        if domain.contains('/') || domain.contains('\\') {
            return Err(Error::InvalidDomain {
                domain: domain.to_string(),
                reason: "domain contains path separator".into(),
            });
        }

        if domain.starts_with('.') || domain.ends_with('.') {
            return Err(Error::InvalidDomain {
                domain: domain.to_string(),
                reason: "domain cannot start or end with a dot".into(),
            });
        }

        for c in domain.chars() {
            if !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != '_' {
                return Err(Error::InvalidDomain {
                    domain: domain.to_string(),
                    reason: format!("domain contains invalid character: '{c}'"),
                });
            }
        }

        Ok(domain.to_string())
    }

    /// Directory holding both artifacts for `domain`.
    pub fn domain_dir(&self, domain: &str) -> Result<PathBuf> {
        let safe = Self::sanitize_domain_for_path(domain)?;
        Ok(self.root.join(safe))
    }

    pub fn cert_path(&self, domain: &str) -> Result<PathBuf> {
        let safe = Self::sanitize_domain_for_path(domain)?;
        Ok(self.root.join(&safe).join(format!("{safe}.crt")))
    }

    pub fn key_path(&self, domain: &str) -> Result<PathBuf> {
        let safe = Self::sanitize_domain_for_path(domain)?;
        Ok(self.root.join(&safe).join(format!("{safe}.key")))
    }
}
