use std::ffi::OsString;
use std::io::Write;
use std::time::Duration;

use clap::Parser;
use eb_core::{ContextOptions, EngineKind};

mod bench;
mod cli_args;
mod demo;
mod error_map;

pub(crate) use bench::run_bench;
pub(crate) use cli_args::{BenchArgs, Cli, DemoArgs, EngineArgs, Mode};
#[cfg(test)]
pub(crate) use cli_args::EngineChoice;
pub(crate) use demo::run_demo;
pub use error_map::CliError;
pub(crate) use error_map::emit_error;

/// Logs go to stderr so stdout stays machine-readable. Filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };

    let mut output = Vec::new();
    match run(cli, &mut output) {
        Ok(code) => {
            println!("RESULT:OK");
            print!("{}", String::from_utf8_lossy(&output));
            code
        }
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli, out: &mut dyn Write) -> Result<i32, CliError> {
    match cli.command {
        Mode::Demo(args) => run_demo_command(args, out),
        Mode::Bench(args) => run_bench_command(args, out),
    }
}

fn run_demo_command(args: DemoArgs, out: &mut dyn Write) -> Result<i32, CliError> {
    for kind in args.engines.engine.kinds() {
        run_demo(kind, options_for(kind, &args.engines), out)?;
    }
    Ok(0)
}

fn run_bench_command(args: BenchArgs, out: &mut dyn Write) -> Result<i32, CliError> {
    for kind in args.engines.engine.kinds() {
        run_bench(kind, options_for(kind, &args.engines), args.iterations, out)?;
    }
    Ok(0)
}

/// Applies `--timeout-ms` only where the engine can enforce it.
pub(crate) fn options_for(kind: EngineKind, args: &EngineArgs) -> ContextOptions {
    let options = ContextOptions::default();
    let Some(timeout_ms) = args.timeout_ms else {
        return options;
    };
    if !kind.capabilities().interrupt {
        tracing::info!(engine = %kind, "engine cannot interrupt scripts; running without a deadline");
        return options;
    }
    options.with_timeout(Duration::from_millis(timeout_ms))
}

#[cfg(test)]
mod tests;
