use std::io::Write;
use std::time::Instant;

use eb_core::{ContextOptions, EngineKind};
use eb_runtime::workloads::WorkloadRunner;

use crate::CliError;

/// Runs every workload of `kind` `iterations` times, a fresh context each
/// time, and prints the last result with the mean wall time.
pub(crate) fn run_bench(
    kind: EngineKind,
    options: ContextOptions,
    iterations: u32,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let runner = WorkloadRunner::new(kind, options)?;
    for workload in runner.workloads() {
        let started = Instant::now();
        let mut result = 0;
        for _ in 0..iterations {
            result = runner.run(workload)?;
        }
        let mean = started.elapsed() / iterations.max(1);

        if result != workload.expected() {
            return Err(CliError::Mismatch {
                engine: kind.to_string(),
                workload: workload.to_string(),
                expected: workload.expected(),
                actual: result,
            });
        }
        tracing::debug!(engine = %kind, %workload, iterations, ?mean, "workload timed");
        writeln!(
            out,
            "BENCH:{}|{}|iterations={}|result={}|mean_us={}",
            kind,
            workload,
            iterations,
            result,
            mean.as_micros()
        )?;
    }
    Ok(())
}
