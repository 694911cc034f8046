use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::rc::Rc;

use eb_core::{BridgeError, CallArgs, ContextOptions, EngineKind, HostValue, Mutability};
use eb_runtime::workloads::{host_add, sub_definition, ADD_SCRIPT};
use eb_runtime::{Context, HostFunction, SharedRuntime};

use crate::CliError;

/// Host `echo`: joins its arguments with spaces, keeps the line and hands
/// the guest back a fixed string.
struct Echo {
    lines: Rc<RefCell<Vec<String>>>,
}

impl HostFunction for Echo {
    fn call(&self, args: &CallArgs) -> Result<HostValue, BridgeError> {
        let line = args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(target: "echo", "{}", line);
        self.lines.borrow_mut().push(line);
        Ok(HostValue::from("something"))
    }
}

fn assign_script(kind: EngineKind) -> &'static str {
    match kind {
        EngineKind::Rhai => "let abc = Add(1, 2); obj.abc",
        EngineKind::Boa | EngineKind::QuickJs => "abc = Add(1, 2); obj.abc",
    }
}

fn echo_script(kind: EngineKind) -> &'static str {
    match kind {
        EngineKind::Rhai => "echo(\"abc\", 123, #{abc: 123}); echo(abc)",
        EngineKind::Boa | EngineKind::QuickJs => "echo(\"abc\", 123, {abc: 123}); echo(abc)",
    }
}

fn step(out: &mut dyn Write, name: &str, value: &HostValue) -> Result<(), CliError> {
    writeln!(out, "STEP:{}|{}", name, serde_json::to_string(value)?)?;
    Ok(())
}

pub(crate) fn run_demo(
    kind: EngineKind,
    options: ContextOptions,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    tracing::debug!(engine = %kind, "demo starting");
    writeln!(out, "ENGINE:{}", kind)?;

    let mut context = Context::create(kind, options)?;
    let four = context.run("2 + 2")?.as_i64()?;
    step(out, "eval", &HostValue::integer(four)?)?;

    context.bind("Add", host_add)?;
    step(out, "add", &context.run(ADD_SCRIPT)?)?;

    context.run(sub_definition(kind))?;
    let nine = context
        .export_function("sub")?
        .call(&[HostValue::from(10), HostValue::from(1)])?;
    step(out, "sub", &nine)?;
    context.close()?;

    let mut context = Context::create(kind, options)?;
    context.bind("Add", host_add)?;
    let object = BTreeMap::from([("abc".to_string(), HostValue::from(123))]);
    context.bind_value("obj", object, Mutability::ReadOnly)?;
    step(out, "obj.abc", &context.run(assign_script(kind))?)?;
    step(out, "abc", &context.get("abc")?)?;
    context.close()?;

    let lines = Rc::new(RefCell::new(Vec::new()));
    let runtime = SharedRuntime::new(kind, options)?;
    runtime.bind(
        "echo",
        Echo {
            lines: Rc::clone(&lines),
        },
    )?;
    runtime.bind_value("abc", 456, Mutability::ReadOnly)?;
    let mut context = runtime.create_context()?;
    let echoed = context.run(echo_script(kind))?;
    for line in lines.borrow().iter() {
        writeln!(out, "ECHO_JSON:{}", serde_json::to_string(line)?)?;
    }
    step(out, "echo", &echoed)?;
    step(out, "abc + 321", &context.run("abc + 321")?)?;
    context.close()?;
    runtime.close()?;
    Ok(())
}
