//! Engine setup and module creation.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use wasmtime::{Caller, Config, Engine, Extern, Linker, Module, Store, Val};
use wasmtime_wasi::p1::{self, WasiP1Ctx};
use wasmtime_wasi::{DirPerms, FilePerms, WasiCtxBuilder};

use super::config::{FsConfig, ModuleConfig, RuntimeConfig, Wasm};
use super::defaults::{WASIFY_NAMESPACE, default_host_functions};
use super::error::WasmError;
use super::host_function::HostFunction;
use super::memory::{GuestExports, InstanceMemory};
use super::module::GuestModule;
use crate::abi::HandleTable;
use crate::logging::{debug, error, info};

/// Per-instance store data.
pub struct HostState {
    pub(crate) wasi: WasiP1Ctx,
    pub(crate) exports: Option<GuestExports>,
    pub(crate) handles: HandleTable,
}

/// A wasmtime engine from which guest modules are created.
///
/// # Example
///
/// ```ignore
/// use wasify::wasm::{ModuleConfig, Runtime, RuntimeConfig, Wasm};
///
/// let runtime = Runtime::new(RuntimeConfig::default())?;
/// let mut module = runtime.create(ModuleConfig::new("myEnv", Wasm::from_file("guest.wasm")?))?;
///
/// let mut result = module.guest_function("greet").invoke(["wasify".into()]);
/// let reply = result.read_string_pack(0)?;
/// result.close()?;
/// ```
pub struct Runtime {
    engine: Engine,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Result<Self, WasmError> {
        let mut wasmtime_config = Config::new();
        wasmtime_config.debug_info(config.debug_info);
        let engine = Engine::new(&wasmtime_config)?;
        info!(debug_info = config.debug_info, "runtime created");
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Verify, compile, link and instantiate a guest module.
    ///
    /// The hash check runs before anything is compiled. A guest that exports
    /// `_initialize` (a WASI reactor) has it called once before this returns.
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    pub fn create(&self, config: ModuleConfig) -> Result<GuestModule, WasmError> {
        verify(&config.wasm).inspect_err(|e| {
            error!(namespace = %config.namespace, error = %e, "module verification failed");
        })?;

        let module = Module::new(&self.engine, &config.wasm.binary)?;

        let mut linker: Linker<HostState> = Linker::new(&self.engine);
        p1::add_to_linker_sync(&mut linker, |state: &mut HostState| &mut state.wasi)?;

        if config.default_host_functions {
            for function in default_host_functions() {
                self.define(&mut linker, WASIFY_NAMESPACE, function)?;
            }
        }
        for function in &config.host_functions {
            debug!(namespace = %config.namespace, function = function.name(), "registering host function");
            self.define(&mut linker, &config.namespace, function.clone())?;
        }

        let state = HostState {
            wasi: wasi_context(&config)?,
            exports: None,
            handles: HandleTable::new(),
        };
        let mut store = Store::new(&self.engine, state);
        let instance = linker.instantiate(&mut store, &module)?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| WasmError::MissingExport("memory".to_string()))?;
        let exports = GuestExports {
            memory,
            malloc: instance.get_func(&mut store, "malloc"),
            free: instance.get_func(&mut store, "free"),
        };
        store.data_mut().exports = Some(exports);

        if let Some(initialize) = instance.get_func(&mut store, "_initialize") {
            initialize.call(&mut store, &[], &mut [])?;
        }

        info!(namespace = %config.namespace, "module created");
        Ok(GuestModule::new(config.namespace, store, instance, exports))
    }

    /// Register `function` under `namespace`, trapping the guest on failure.
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    fn define(
        &self,
        linker: &mut Linker<HostState>,
        namespace: &str,
        function: HostFunction,
    ) -> Result<(), WasmError> {
        let ty = function.func_type(&self.engine);
        let name = function.name().to_string();
        linker.func_new(
            namespace,
            &name,
            ty,
            move |mut caller: Caller<'_, HostState>, params: &[Val], results: &mut [Val]| {
                let slots: Vec<u64> = params
                    .iter()
                    .map(|v| v.i64().map_or(0, |word| word as u64))
                    .collect();
                let exports = caller_exports(&mut caller).map_err(wasmtime::Error::new)?;
                let mut memory = InstanceMemory::new(&mut caller, exports);
                let word = function.dispatch(&mut memory, &slots).map_err(|e| {
                    error!(function = function.name(), error = %e, "host function failed");
                    wasmtime::Error::new(e)
                })?;
                if let Some(slot) = results.first_mut() {
                    *slot = Val::I64(word as i64);
                }
                Ok(())
            },
        )?;
        Ok(())
    }
}

/// Exports of the calling instance. Falls back to a direct lookup while the
/// instance is still being initialized.
fn caller_exports(caller: &mut Caller<'_, HostState>) -> Result<GuestExports, WasmError> {
    if let Some(exports) = caller.data().exports {
        return Ok(exports);
    }
    let memory = caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .ok_or_else(|| WasmError::MissingExport("memory".to_string()))?;
    Ok(GuestExports {
        memory,
        malloc: caller.get_export("malloc").and_then(Extern::into_func),
        free: caller.get_export("free").and_then(Extern::into_func),
    })
}

fn wasi_context(config: &ModuleConfig) -> Result<WasiP1Ctx, WasmError> {
    let mut builder = WasiCtxBuilder::new();
    if config.inherit_stdio {
        builder.inherit_stdio();
    }
    let FsConfig {
        enabled, host_dir, ..
    } = &config.fs;
    if *enabled {
        builder
            .preopened_dir(host_dir, config.fs.guest_dir(), DirPerms::all(), FilePerms::all())
            .map_err(|e| {
                WasmError::Wasi(format!(
                    "can't pre-open {} as {}: {e}",
                    host_dir.display(),
                    config.fs.guest_dir()
                ))
            })?;
    }
    Ok(builder.build_p1())
}

/// SHA-256 digest of a wasm binary, hex encoded.
pub fn hash_wasm(binary: &[u8]) -> String {
    hex::encode(Sha256::digest(binary))
}

/// Compare the binary against its expected hash, if one is set.
fn verify(wasm: &Wasm) -> Result<(), WasmError> {
    let Some(expected) = wasm.hash.as_deref().filter(|h| !h.is_empty()) else {
        return Ok(());
    };
    let actual = hash_wasm(&wasm.binary);
    if constant_time_eq(expected.to_ascii_lowercase().as_bytes(), actual.as_bytes()) {
        Ok(())
    } else {
        Err(WasmError::Integrity {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Equality whose running time depends only on the input lengths.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_wasm_is_sha256_hex() {
        assert_eq!(
            hash_wasm(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_verify() {
        let wasm = Wasm::new(b"".to_vec());
        assert!(verify(&wasm).is_ok());

        let ok = wasm.clone().with_hash(
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855",
        );
        assert!(verify(&ok).is_ok());

        let empty = wasm.clone().with_hash("");
        assert!(verify(&empty).is_ok());

        let bad = wasm.with_hash("00");
        assert!(verify(&bad).unwrap_err().is_integrity());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
        assert!(constant_time_eq(b"", b""));
    }
}
