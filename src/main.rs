use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use wasify::manifest::ModuleManifest;
use wasify::wasm::{FsConfig, ModuleConfig, Runtime, RuntimeConfig, Wasm, hash_wasm};
use wasify::{Value, ValueType};

/// Output format for returned values.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// One `kind:value` line per value.
    #[default]
    Text,
    /// A JSON array of `{type, value}` objects.
    Json,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "wasify")]
#[command(about = "Call WebAssembly guest functions with typed, packed arguments")]
struct Cli {
    /// Log filter directive (e.g. "info", "wasify=debug").
    #[arg(long, global = true, env = "WASIFY_LOG", default_value = "warn")]
    log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Invoke a guest function and print the values it returns
    Call(CallArgs),

    /// Print the SHA-256 digest of a wasm binary
    Hash {
        /// Path to the wasm binary
        wasm: PathBuf,
    },
}

#[derive(Args)]
struct CallArgs {
    /// Path to the wasm binary
    #[arg(short, long, conflicts_with = "manifest", required_unless_present = "manifest")]
    module: Option<PathBuf>,

    /// Path to a TOML module manifest
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Namespace for host functions (ignored with --manifest)
    #[arg(short, long, default_value = "wasify-cli")]
    namespace: String,

    /// Expected SHA-256 of the binary (hex)
    #[arg(long, conflicts_with = "manifest")]
    hash: Option<String>,

    /// Host directory to pre-open for the guest
    #[arg(long, conflicts_with = "manifest")]
    fs_host: Option<PathBuf>,

    /// Guest path of the pre-opened directory
    #[arg(long, requires = "fs_host", conflicts_with = "manifest")]
    fs_guest: Option<String>,

    /// Output format for returned values
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Exported function to call
    function: String,

    /// Arguments as kind:value (bytes, byte, i32, i64, f32, f64, string)
    args: Vec<String>,
}

fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level).context("invalid log filter")?;
    let layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE)
        .with_writer(io::stderr);

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_ansi(io::stderr().is_terminal()))
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init(),
    }
    Ok(())
}

fn module_config(args: &CallArgs) -> anyhow::Result<ModuleConfig> {
    if let Some(path) = &args.manifest {
        let manifest = ModuleManifest::from_file(path)?;
        return Ok(manifest.into_module_config()?);
    }
    let Some(path) = &args.module else {
        bail!("either --module or --manifest must be specified");
    };

    let mut wasm =
        Wasm::from_file(path).with_context(|| format!("failed to read {}", path.display()))?;
    wasm.hash = args.hash.clone();

    let mut config = ModuleConfig::new(args.namespace.clone(), wasm);
    if let Some(host_dir) = &args.fs_host {
        let mut fs = FsConfig::new(host_dir);
        if let Some(guest_dir) = &args.fs_guest {
            fs = fs.with_guest_dir(guest_dir.clone());
        }
        config = config.with_fs(fs);
    }
    Ok(config)
}

fn value_json(value: &Value) -> serde_json::Value {
    let ty = value.value_type().name();
    match value {
        Value::Bytes(b) => json!({ "type": ty, "value": hex::encode(b) }),
        Value::Byte(v) => json!({ "type": ty, "value": v }),
        Value::I32(v) => json!({ "type": ty, "value": v }),
        Value::I64(v) => json!({ "type": ty, "value": v }),
        Value::F32(v) => json!({ "type": ty, "value": v }),
        Value::F64(v) => json!({ "type": ty, "value": v }),
        Value::String(s) => json!({ "type": ty, "value": s }),
    }
}

fn call(args: CallArgs) -> anyhow::Result<()> {
    let values = args
        .args
        .iter()
        .map(|arg| Value::parse_typed(arg))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| {
            let kinds: Vec<&str> = ValueType::ALL.iter().map(|ty| ty.name()).collect();
            format!("arguments must be kind:value with kind one of {}", kinds.join(", "))
        })?;

    let config = module_config(&args)?;
    let runtime = Runtime::new(RuntimeConfig::default())?;
    let mut module = runtime.create(config)?;

    let mut result = module
        .guest_function(args.function.as_str())
        .invoke(values)
        .into_result()?;
    let returned = result.read_all()?;
    result.close()?;
    module.close();

    match args.output {
        OutputFormat::Text => {
            for value in &returned {
                println!("{value}");
            }
        }
        OutputFormat::Json => {
            let array: Vec<_> = returned.iter().map(value_json).collect();
            println!("{}", serde_json::to_string_pretty(&array)?);
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::Call(args) => call(args),
        Commands::Hash { wasm } => {
            let binary =
                std::fs::read(&wasm).with_context(|| format!("failed to read {}", wasm.display()))?;
            println!("{}", hash_wasm(&binary));
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("wasify").chain(args.iter().copied()))
    }

    #[test]
    fn test_call_with_module() {
        let cli = parse(&["call", "-m", "guest.wasm", "--hash", "ab", "greet", "string:hi"]).unwrap();
        let Commands::Call(args) = cli.command else {
            panic!("expected call");
        };
        assert_eq!(args.function, "greet");
        assert_eq!(args.args, vec!["string:hi".to_string()]);
        assert_eq!(args.hash.as_deref(), Some("ab"));
    }

    #[test]
    fn test_manifest_rejects_module_flags() {
        for flags in [
            &["--hash", "ab"][..],
            &["--fs-host", "data"][..],
            &["--fs-host", "data", "--fs-guest", "/data"][..],
            &["-m", "guest.wasm"][..],
        ] {
            let mut args = vec!["call", "--manifest", "module.toml"];
            args.extend_from_slice(flags);
            args.push("greet");
            assert!(parse(&args).is_err(), "{flags:?} should conflict with --manifest");
        }
        assert!(parse(&["call", "--manifest", "module.toml", "greet"]).is_ok());
    }
}
