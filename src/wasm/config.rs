//! Runtime and module configuration.

use std::fmt;
use std::path::{Path, PathBuf};

use super::host_function::HostFunction;

/// Engine-wide settings shared by every module created from a [`Runtime`](super::Runtime).
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Emit DWARF debug info for compiled guests.
    pub debug_info: bool,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug_info(mut self, enabled: bool) -> Self {
        self.debug_info = enabled;
        self
    }
}

/// A guest binary and its optional expected SHA-256 digest (hex).
#[derive(Clone, Default)]
pub struct Wasm {
    pub binary: Vec<u8>,
    pub hash: Option<String>,
}

impl Wasm {
    pub fn new(binary: impl Into<Vec<u8>>) -> Self {
        Self {
            binary: binary.into(),
            hash: None,
        }
    }

    /// Read a guest binary from disk.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::read(path).map(Self::new)
    }

    /// Require the binary to hash to `hash` before it is compiled.
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }
}

impl fmt::Debug for Wasm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wasm")
            .field("binary", &format_args!("<{} bytes>", self.binary.len()))
            .field("hash", &self.hash)
            .finish()
    }
}

/// A host directory pre-opened for the guest through WASI.
///
/// Nothing is attached unless `enabled` is set.
#[derive(Debug, Clone, Default)]
pub struct FsConfig {
    pub enabled: bool,
    pub host_dir: PathBuf,
    /// Path the guest sees. Defaults to `/` when empty.
    pub guest_dir: String,
}

impl FsConfig {
    /// Mount `host_dir` at the default guest path.
    pub fn new(host_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            host_dir: host_dir.into(),
            guest_dir: String::new(),
        }
    }

    pub fn with_guest_dir(mut self, guest_dir: impl Into<String>) -> Self {
        self.guest_dir = guest_dir.into();
        self
    }

    /// The guest-side mount point.
    pub fn guest_dir(&self) -> &str {
        if self.guest_dir.is_empty() {
            "/"
        } else {
            &self.guest_dir
        }
    }
}

/// Everything needed to create one guest module instance.
///
/// # Example
///
/// ```ignore
/// use wasify::wasm::{ModuleConfig, Wasm};
///
/// let config = ModuleConfig::new("myEnv", Wasm::from_file("guest.wasm")?)
///     .with_hash("8f434346648f6b96df89dda901c5176b10a6d83961dd3c1ac88b59b2dc327aa4")
///     .host_function(greet);
/// ```
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Import namespace the user host functions are registered under.
    pub namespace: String,
    pub wasm: Wasm,
    pub fs: FsConfig,
    pub host_functions: Vec<HostFunction>,
    /// Register the built-in `wasify` namespace (`log`).
    pub default_host_functions: bool,
    /// Forward the guest's stdin, stdout and stderr to the host process.
    pub inherit_stdio: bool,
}

impl ModuleConfig {
    pub fn new(namespace: impl Into<String>, wasm: Wasm) -> Self {
        Self {
            namespace: namespace.into(),
            wasm,
            fs: FsConfig::default(),
            host_functions: Vec::new(),
            default_host_functions: true,
            inherit_stdio: true,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.wasm.hash = Some(hash.into());
        self
    }

    pub fn with_fs(mut self, fs: FsConfig) -> Self {
        self.fs = fs;
        self
    }

    /// Register an additional host function under [`ModuleConfig::namespace`].
    pub fn host_function(mut self, function: HostFunction) -> Self {
        self.host_functions.push(function);
        self
    }

    pub fn with_host_functions(mut self, functions: impl IntoIterator<Item = HostFunction>) -> Self {
        self.host_functions.extend(functions);
        self
    }

    pub fn default_host_functions(mut self, enabled: bool) -> Self {
        self.default_host_functions = enabled;
        self
    }

    pub fn inherit_stdio(mut self, enabled: bool) -> Self {
        self.inherit_stdio = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_dir_defaults_to_root() {
        let fs = FsConfig::new("/tmp");
        assert!(fs.enabled);
        assert_eq!(fs.guest_dir(), "/");
        assert_eq!(fs.with_guest_dir("/data").guest_dir(), "/data");
        assert!(!FsConfig::default().enabled);
    }

    #[test]
    fn test_module_config_builder() {
        let config = ModuleConfig::new("env", Wasm::new(vec![0, 1]))
            .with_hash("abc")
            .default_host_functions(false)
            .inherit_stdio(false);
        assert_eq!(config.namespace, "env");
        assert_eq!(config.wasm.hash.as_deref(), Some("abc"));
        assert!(!config.default_host_functions);
        assert!(!config.inherit_stdio);
        assert!(format!("{:?}", config.wasm).contains("<2 bytes>"));
    }
}
