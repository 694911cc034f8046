use clap::{Args, Parser, Subcommand, ValueEnum};
use eb_core::EngineKind;

#[derive(Debug, Parser)]
#[command(name = "embedbridge")]
#[command(about = "Host/guest bridge demos and benchmarks over Rhai, Boa and QuickJS")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Walk through binding, running and exporting on each engine.
    Demo(DemoArgs),
    /// Time the add and sum workloads.
    Bench(BenchArgs),
}

#[derive(Debug, Args)]
pub(crate) struct EngineArgs {
    #[arg(long = "engine", value_enum, default_value_t = EngineChoice::All)]
    pub(crate) engine: EngineChoice,
    /// Per-run deadline, applied on engines that can interrupt a script.
    #[arg(long = "timeout-ms")]
    pub(crate) timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub(crate) struct DemoArgs {
    #[command(flatten)]
    pub(crate) engines: EngineArgs,
}

#[derive(Debug, Args)]
pub(crate) struct BenchArgs {
    #[command(flatten)]
    pub(crate) engines: EngineArgs,
    #[arg(
        long = "iterations",
        default_value_t = 100,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub(crate) iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum EngineChoice {
    Rhai,
    Boa,
    Quickjs,
    All,
}

impl EngineChoice {
    pub(crate) fn kinds(self) -> Vec<EngineKind> {
        match self {
            Self::Rhai => vec![EngineKind::Rhai],
            Self::Boa => vec![EngineKind::Boa],
            Self::Quickjs => vec![EngineKind::QuickJs],
            Self::All => EngineKind::ALL.to_vec(),
        }
    }
}
