//! Scripts and runners shared by the demo, the `bench` command and the
//! criterion benches. Rhai has its own dialect; Boa and QuickJS both run
//! JavaScript.

use std::fmt;

use eb_core::{BridgeError, CallArgs, ContextOptions, EngineKind, HostValue};

use crate::context::Context;
use crate::shared::SharedRuntime;

/// `0 + 1 + ... + 99_999`.
pub const SUM_EXPECTED: i64 = 4_999_950_000;
pub const ADD_EXPECTED: i64 = 3;

pub const ADD_SCRIPT: &str = "Add(1, 2)";

/// Host `Add(a, b)`: integer addition that fails instead of wrapping.
pub fn host_add(args: &CallArgs) -> Result<HostValue, BridgeError> {
    let a = args.integer(0)?;
    let b = args.integer(1)?;
    let sum = a
        .checked_add(b)
        .ok_or_else(|| BridgeError::conversion(format!("Add({}, {}) overflows", a, b)))?;
    HostValue::integer(sum)
}

pub fn sum_script(kind: EngineKind) -> &'static str {
    match kind {
        EngineKind::Rhai => "let sum = 0; for i in 0..100000 { sum += i; } sum",
        EngineKind::Boa | EngineKind::QuickJs => {
            "var i = 0, sum = 0; for (; i < 100000; i++) { sum += i; } sum"
        }
    }
}

/// Defines `sub(a, b)` in the guest.
pub fn sub_definition(kind: EngineKind) -> &'static str {
    match kind {
        EngineKind::Rhai => "fn sub(a, b) { a - b }",
        EngineKind::Boa | EngineKind::QuickJs => "function sub(a, b) { return a - b; }",
    }
}

/// A script that never finishes on its own.
pub fn endless_script(kind: EngineKind) -> &'static str {
    match kind {
        EngineKind::Rhai => "let n = 0; loop { n += 1; }",
        EngineKind::Boa | EngineKind::QuickJs => "var n = 0; for (;;) { n++; }",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// Fresh context, bind `Add`, run `Add(1, 2)`.
    Add,
    /// Fresh context, guest loop summing `0..100000`.
    Sum,
    /// `Add` on a context from a shared runtime whose template carries it.
    SharedAdd,
    SharedSum,
}

impl Workload {
    pub fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sum => "sum",
            Self::SharedAdd => "shared-add",
            Self::SharedSum => "shared-sum",
        }
    }

    pub fn expected(self) -> i64 {
        match self {
            Self::Add | Self::SharedAdd => ADD_EXPECTED,
            Self::Sum | Self::SharedSum => SUM_EXPECTED,
        }
    }

    fn is_shared(self) -> bool {
        matches!(self, Self::SharedAdd | Self::SharedSum)
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs workloads for one engine. Engines whose contexts share a heap also
/// get the shared-runtime variants, backed by one runtime built up front.
pub struct WorkloadRunner {
    kind: EngineKind,
    options: ContextOptions,
    shared: Option<SharedRuntime>,
}

impl WorkloadRunner {
    pub fn new(kind: EngineKind, options: ContextOptions) -> Result<Self, BridgeError> {
        let shared = if kind.capabilities().shared_heap {
            let runtime = SharedRuntime::new(kind, options)?;
            runtime.bind("Add", host_add)?;
            Some(runtime)
        } else {
            None
        };
        Ok(Self {
            kind,
            options,
            shared,
        })
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn workloads(&self) -> Vec<Workload> {
        let mut workloads = vec![Workload::Add, Workload::Sum];
        if self.shared.is_some() {
            workloads.extend([Workload::SharedAdd, Workload::SharedSum]);
        }
        workloads
    }

    /// Runs one iteration and returns the script result as an integer.
    pub fn run(&self, workload: Workload) -> Result<i64, BridgeError> {
        let mut context = self.context_for(workload)?;
        let result = match workload {
            Workload::Add => {
                context.bind("Add", host_add)?;
                context.run(ADD_SCRIPT)?
            }
            Workload::SharedAdd => context.run(ADD_SCRIPT)?,
            Workload::Sum | Workload::SharedSum => context.run(sum_script(self.kind))?,
        };
        context.close()?;
        result.as_i64()
    }

    fn context_for(&self, workload: Workload) -> Result<Context, BridgeError> {
        match (&self.shared, workload.is_shared()) {
            (Some(runtime), true) => runtime.create_context(),
            (None, true) => Err(BridgeError::engine_init(format!(
                "engine \"{}\" has no shared runtime",
                self.kind
            ))),
            (_, false) => Context::create(self.kind, self.options),
        }
    }
}
