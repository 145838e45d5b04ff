//! Host functions registered under the reserved `wasify` namespace.

use super::error::WasmError;
use super::host_function::HostFunction;
use crate::abi::{Memory, MultiPackedData, PackedData, ValueType};
use crate::logging::{LogSeverity, debug, error, info, warn};

/// Import namespace of the built-in host functions.
pub const WASIFY_NAMESPACE: &str = "wasify";

/// The built-in host functions.
///
/// `log(message: string, severity: byte)` routes a guest log line to the
/// host logger.
pub fn default_host_functions() -> Vec<HostFunction> {
    vec![HostFunction::new(
        "log",
        [ValueType::String, ValueType::Byte],
        [],
        guest_log,
    )]
}

fn guest_log(memory: &mut dyn Memory, params: &[PackedData]) -> Result<MultiPackedData, WasmError> {
    let [message, severity] = params else {
        return Err(WasmError::ParamsMismatch {
            function: "log".to_string(),
            expected: 2,
            received: params.len(),
        });
    };
    let message = memory.read_string_pack(*message)?;
    let severity = LogSeverity::from(memory.read_byte_pack(*severity)?);
    emit(severity, &message);
    Ok(MultiPackedData::EMPTY)
}

#[cfg_attr(not(feature = "logging"), allow(unused_variables))]
fn emit(severity: LogSeverity, message: &str) {
    match severity {
        LogSeverity::Debug => {
            debug!(target: "wasify::guest", "{message}");
        }
        LogSeverity::Info => {
            info!(target: "wasify::guest", "{message}");
        }
        LogSeverity::Warning => {
            warn!(target: "wasify::guest", "{message}");
        }
        LogSeverity::Error => {
            error!(target: "wasify::guest", "{message}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::abi::LinearMemory;

    #[test]
    fn test_log_reads_message_and_severity() {
        let mut memory = LinearMemory::new();
        let message = memory.write_string_pack("guest says hi").unwrap();
        let severity = memory.write_byte_pack(LogSeverity::Warning as u8).unwrap();

        let functions = default_host_functions();
        let log = functions.first().unwrap();
        assert_eq!(log.name(), "log");
        assert!(log.results().is_empty());

        let word = log
            .dispatch(&mut memory, &[message.to_wire(), severity.to_wire()])
            .unwrap();
        assert_eq!(word, 0);
        // The bridge leaves the guest's values alone.
        assert_eq!(memory.live_allocations(), 2);
    }

    #[test]
    fn test_log_accepts_every_severity() {
        let log = default_host_functions().remove(0);
        for byte in [0u8, 1, 2, 3, 4, 9] {
            let mut memory = LinearMemory::new();
            let message = memory.write_string_pack("level check").unwrap();
            let severity = memory.write_byte_pack(byte).unwrap();
            let word = log
                .dispatch(&mut memory, &[message.to_wire(), severity.to_wire()])
                .unwrap();
            assert_eq!(word, 0);
        }
    }

    #[test]
    fn test_log_rejects_out_of_range_message() {
        let mut memory = LinearMemory::with_limits(64, 64);
        let message = PackedData::new(ValueType::String, 60, 16).unwrap();
        let severity = PackedData::new(ValueType::Byte, 0, 1).unwrap();
        let log = default_host_functions().remove(0);
        let err = log
            .dispatch(&mut memory, &[message.to_wire(), severity.to_wire()])
            .unwrap_err();
        assert!(err.abi().is_some_and(|e| e.is_out_of_range()));
    }
}
