//! Calling exported guest functions with typed arguments.

use super::error::WasmError;
use super::memory::{native_arg, native_word};
use super::module::GuestModule;
use super::result::GuestFunctionResult;
use crate::abi::{Allocator, Handle, Memory, MultiPackedData, Value};
use crate::logging::{debug, error, warn};

/// A guest export bound to its module, ready to be invoked once.
pub struct GuestFunction<'m> {
    module: &'m mut GuestModule,
    name: String,
}

/// Outcome of a call that reached the guest and returned.
struct Completed {
    values: Vec<Handle>,
    arguments: Vec<u32>,
}

impl<'m> GuestFunction<'m> {
    pub(crate) fn new(module: &'m mut GuestModule, name: String) -> Self {
        Self { module, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write `args` into guest memory, call the export and decode its result.
    ///
    /// Every argument is allocated, written and packed in order. If one of
    /// them fails, or the call itself traps, the arguments written so far are
    /// released and the result carries only the error. On success the
    /// arguments stay allocated until the result is closed, since returned
    /// values may point into them.
    ///
    /// A returned word that is not a multi-pack (including `0`) yields no
    /// values and no error.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut result = module
    ///     .guest_function("guestTest")
    ///     .invoke([Value::from(b"bytes!".as_slice()), 32u32.into(), 32.0f32.into(), "Wasify".into()]);
    /// if let Some(err) = result.error() {
    ///     eprintln!("{err}");
    /// }
    /// result.close()?;
    /// ```
    #[cfg_attr(not(feature = "logging"), allow(unused_variables))]
    pub fn invoke<I>(self, args: I) -> GuestFunctionResult<'m>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let Self { module, name } = self;
        let args: Vec<Value> = args.into_iter().map(Into::into).collect();
        debug!(
            namespace = %module.namespace(),
            function = %name,
            args = args.len(),
            "calling guest function"
        );

        match call(module, &name, &args) {
            Ok(Completed { values, arguments }) => {
                debug!(function = %name, values = values.len(), "guest function returned");
                GuestFunctionResult::new(module, name, values, arguments)
            }
            Err(err) => {
                error!(function = %name, error = %err, "guest function failed");
                GuestFunctionResult::failed(module, name, err)
            }
        }
    }
}

fn call(module: &mut GuestModule, name: &str, args: &[Value]) -> Result<Completed, WasmError> {
    let instance = module.instance();
    let func = instance
        .get_func(module.store_mut(), name)
        .ok_or_else(|| WasmError::FunctionNotFound(name.to_string()))?;

    let mut arguments = Vec::with_capacity(args.len());
    let mut words = Vec::with_capacity(args.len());
    {
        let mut memory = module.memory();
        for (index, arg) in args.iter().enumerate() {
            match memory.write_any_pack(arg) {
                Ok(packed) => {
                    arguments.push(packed.offset());
                    words.push(packed.to_wire());
                }
                Err(source) => {
                    release_arguments(&mut memory, name, &arguments);
                    return Err(WasmError::Argument {
                        function: name.to_string(),
                        index,
                        source,
                    });
                }
            }
        }
    }

    let ty = func.ty(module.store_mut());
    if ty.params().len() != words.len() {
        release_arguments(&mut module.memory(), name, &arguments);
        return Err(WasmError::Call {
            function: name.to_string(),
            reason: format!(
                "expected {} arguments, got {}",
                ty.params().len(),
                words.len()
            ),
        });
    }
    let params: Vec<_> = ty
        .params()
        .zip(&words)
        .map(|(ty, word)| native_arg(&ty, *word))
        .collect();
    let mut results: Vec<_> = ty.results().map(|ty| native_arg(&ty, 0)).collect();

    if let Err(e) = func.call(module.store_mut(), &params, &mut results) {
        release_arguments(&mut module.memory(), name, &arguments);
        return Err(WasmError::Call {
            function: name.to_string(),
            reason: format!("{e:#}"),
        });
    }

    let word = results.first().and_then(native_word).unwrap_or(0);
    if !MultiPackedData::is_pack_word(word) {
        return Ok(Completed {
            values: Vec::new(),
            arguments,
        });
    }

    let mut memory = module.memory();
    let decoded =
        MultiPackedData::from_wire(word).and_then(|multi| memory.read_multi_pack(multi));
    match decoded {
        Ok(packed) => Ok(Completed {
            values: packed.into_iter().map(|pd| memory.adopt(pd)).collect(),
            arguments,
        }),
        Err(source) => {
            release_arguments(&mut memory, name, &arguments);
            Err(WasmError::Decode {
                function: name.to_string(),
                source,
            })
        }
    }
}

/// Release a call's argument group, logging instead of masking the primary error.
#[cfg_attr(not(feature = "logging"), allow(unused_variables))]
fn release_arguments(memory: &mut dyn Memory, function: &str, offsets: &[u32]) {
    if offsets.is_empty() {
        return;
    }
    if let Err(e) = memory.free(offsets) {
        warn!(function, error = %e, "failed to release arguments");
    }
}
