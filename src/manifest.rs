//! TOML module manifests.
//!
//! A manifest describes one guest module so it can be created without
//! writing Rust:
//!
//! ```toml
//! namespace = "myEnv"
//! wasm = "guest.wasm"            # relative to the manifest
//! hash = "8f4343...27aa4"        # optional SHA-256, hex
//! default_host_functions = true
//! inherit_stdio = true
//!
//! [fs]
//! host_dir = "./data"
//! guest_dir = "/data"            # defaults to "/"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[cfg(feature = "wasm")]
use crate::wasm::{FsConfig, ModuleConfig, Wasm};

/// Module manifest loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleManifest {
    /// Namespace user host functions are registered under.
    pub namespace: String,
    /// Path to the wasm binary.
    pub wasm: PathBuf,
    /// Expected SHA-256 of the binary (hex).
    #[serde(default)]
    pub hash: Option<String>,
    /// Directory to pre-open for the guest.
    #[serde(default)]
    pub fs: Option<FsManifest>,
    #[serde(default = "default_true")]
    pub default_host_functions: bool,
    #[serde(default = "default_true")]
    pub inherit_stdio: bool,

    /// Directory the manifest was loaded from; relative paths resolve against it.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

/// `[fs]` table of a manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FsManifest {
    pub host_dir: PathBuf,
    #[serde(default)]
    pub guest_dir: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ModuleManifest {
    /// Load a manifest from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::Io(path.display().to_string(), e))?;
        let mut manifest = Self::from_str(&content)?;
        manifest.base_dir = path.parent().map(Path::to_path_buf);
        Ok(manifest)
    }

    /// Parse a manifest from a TOML string. Relative paths resolve against
    /// the current directory.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(content)?;
        if manifest.namespace.is_empty() {
            return Err(ManifestError::Invalid("namespace must not be empty".to_string()));
        }
        Ok(manifest)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Resolved path of the wasm binary.
    pub fn wasm_path(&self) -> PathBuf {
        self.resolve(&self.wasm)
    }

    /// Read the binary and build a [`ModuleConfig`].
    #[cfg(feature = "wasm")]
    pub fn into_module_config(self) -> Result<ModuleConfig, ManifestError> {
        let wasm_path = self.wasm_path();
        let binary = std::fs::read(&wasm_path)
            .map_err(|e| ManifestError::Io(wasm_path.display().to_string(), e))?;

        let mut wasm = Wasm::new(binary);
        wasm.hash = self.hash.clone().filter(|h| !h.is_empty());

        let mut config = ModuleConfig::new(self.namespace.clone(), wasm)
            .default_host_functions(self.default_host_functions)
            .inherit_stdio(self.inherit_stdio);

        if let Some(fs) = &self.fs {
            let mut fs_config = FsConfig::new(self.resolve(&fs.host_dir));
            if let Some(guest_dir) = &fs.guest_dir {
                fs_config = fs_config.with_guest_dir(guest_dir.clone());
            }
            config = config.with_fs(fs_config);
        }
        Ok(config)
    }
}

/// Errors that can occur while loading a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read '{0}': {1}")]
    Io(String, #[source] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid manifest: {0}")]
    Invalid(String),
}
