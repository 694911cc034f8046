use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use eb_core::{BridgeError, ContextOptions, HostValue, Mutability};
use rquickjs::context::EvalOptions;
use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, Object, Value};

use super::{lexical_lookup, EngineBackend};
use crate::host::{invoke, HostFunction};

/// A QuickJS runtime plus the deadline its interrupt handler watches.
/// Cloning shares the same runtime, heap and deadline.
#[derive(Clone)]
pub(crate) struct QuickJsRuntime {
    runtime: rquickjs::Runtime,
    deadline: Arc<Mutex<Option<Instant>>>,
    interrupted: Arc<AtomicBool>,
}

impl QuickJsRuntime {
    pub(crate) fn new(options: &ContextOptions) -> Result<Self, BridgeError> {
        let runtime = rquickjs::Runtime::new().map_err(|error| {
            BridgeError::engine_init(format!("failed to create QuickJS runtime: {}", error))
        })?;
        if let Some(limit) = options.memory_limit {
            runtime.set_memory_limit(limit);
        }

        let deadline: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
        let interrupted = Arc::new(AtomicBool::new(false));
        if options.timeout.is_some() {
            let deadline = Arc::clone(&deadline);
            let interrupted = Arc::clone(&interrupted);
            runtime.set_interrupt_handler(Some(Box::new(move || {
                let expired = deadline
                    .lock()
                    .map(|slot| matches!(*slot, Some(at) if Instant::now() >= at))
                    .unwrap_or(false);
                if expired {
                    interrupted.store(true, Ordering::SeqCst);
                }
                expired
            })));
        }

        Ok(Self {
            runtime,
            deadline,
            interrupted,
        })
    }

    fn arm(&self, deadline: Option<Instant>) {
        self.interrupted.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.deadline.lock() {
            *slot = deadline;
        }
    }

    /// Clears the deadline and reports whether the handler fired.
    fn disarm(&self) -> bool {
        if let Ok(mut slot) = self.deadline.lock() {
            *slot = None;
        }
        self.interrupted.swap(false, Ordering::SeqCst)
    }
}

/// Hidden global called ahead of every script. QuickJS compiles and runs in
/// one step, so an exception thrown before the call is a compile error.
const STARTED_MARKER: &str = "__embedbridge_started";

pub(crate) struct QuickJsBackend {
    runtime: QuickJsRuntime,
    context: rquickjs::Context,
    started: Rc<Cell<bool>>,
}

impl QuickJsBackend {
    pub(crate) fn new(runtime: QuickJsRuntime) -> Result<Self, BridgeError> {
        let context = rquickjs::Context::full(&runtime.runtime).map_err(|error| {
            BridgeError::engine_init(format!("failed to create QuickJS context: {}", error))
        })?;
        let started = Rc::new(Cell::new(false));
        context
            .with(|ctx| {
                let started = Rc::clone(&started);
                let marker = Function::new(ctx.clone(), move || started.set(true))?;
                define_global(&ctx, STARTED_MARKER, marker.into_value(), false, true)
            })
            .map_err(|error| {
                BridgeError::engine_init(format!("failed to prepare QuickJS context: {}", error))
            })?;
        Ok(Self {
            runtime,
            context,
            started,
        })
    }
}

impl EngineBackend for QuickJsBackend {
    fn bind_function(
        &mut self,
        name: &str,
        function: Rc<dyn HostFunction>,
    ) -> Result<(), BridgeError> {
        self.context
            .with(|ctx| {
                let function = host_function(&ctx, name, function)?;
                ctx.globals().set(name, function)
            })
            .map_err(|error| {
                BridgeError::engine_init(format!("failed to bind \"{}\": {}", name, error))
            })
    }

    fn bind_value(
        &mut self,
        name: &str,
        value: &HostValue,
        mutability: Mutability,
    ) -> Result<(), BridgeError> {
        self.context.with(|ctx| {
            let value = host_to_js(&ctx, value)?;
            let writable = mutability == Mutability::Mutable;
            define_global(&ctx, name, value, writable, false).map_err(|error| {
                BridgeError::engine_init(format!("failed to bind \"{}\": {}", name, error))
            })
        })
    }

    fn set_value(&mut self, name: &str, value: &HostValue) -> Result<(), BridgeError> {
        self.context.with(|ctx| {
            let value = host_to_js(&ctx, value)?;
            ctx.globals()
                .set(name, value)
                .map_err(|error| guest_error(&ctx, error))
        })
    }

    fn run(&mut self, source: &str, deadline: Option<Instant>) -> Result<HostValue, BridgeError> {
        // Same line, so positions in error messages still match the source.
        let source = format!("{}();{}", STARTED_MARKER, source);
        let started = Rc::clone(&self.started);
        started.set(false);
        self.runtime.arm(deadline);
        let result = self.context.with(|ctx| {
            ctx.eval_with_options::<Value, _>(source, sloppy())
                .map_err(|error| {
                    let message = describe(&ctx, error);
                    if started.get() {
                        BridgeError::runtime(message)
                    } else {
                        BridgeError::syntax(message)
                    }
                })
                .and_then(|value| js_to_host(&ctx, value))
        });
        timed_out(self.runtime.disarm(), result)
    }

    fn is_function(&mut self, name: &str) -> Result<bool, BridgeError> {
        self.context.with(|ctx| Ok(lookup(&ctx, name)?.is_function()))
    }

    fn call_function(
        &mut self,
        name: &str,
        args: &[HostValue],
        deadline: Option<Instant>,
    ) -> Result<HostValue, BridgeError> {
        self.runtime.arm(deadline);
        let result = self.context.with(|ctx| {
            let Some(function) = lookup(&ctx, name)?.into_function() else {
                return Err(BridgeError::conversion(format!(
                    "\"{}\" is not a function",
                    name
                )));
            };
            let args = args
                .iter()
                .map(|arg| host_to_js(&ctx, arg))
                .collect::<Result<Vec<_>, _>>()?;
            function
                .call::<_, Value>((Rest(args),))
                .map_err(|error| guest_error(&ctx, error))
                .and_then(|value| js_to_host(&ctx, value))
        });
        timed_out(self.runtime.disarm(), result)
    }

    fn get(&mut self, name: &str) -> Result<HostValue, BridgeError> {
        self.context.with(|ctx| {
            let value = lookup(&ctx, name)?;
            js_to_host(&ctx, value)
        })
    }
}

/// Non-strict global code, so plain assignment creates a global.
fn sloppy() -> EvalOptions {
    let mut options = EvalOptions::default();
    options.strict = false;
    options
}

/// A global object property, falling back to the global lexical scope.
fn lookup<'js>(ctx: &Ctx<'js>, name: &str) -> Result<Value<'js>, BridgeError> {
    let globals = ctx.globals();
    let present = globals
        .contains_key(name)
        .map_err(|error| guest_error(ctx, error))?;
    if present {
        return globals.get(name).map_err(|error| guest_error(ctx, error));
    }
    let Some(source) = lexical_lookup(name) else {
        return Ok(Value::new_undefined(ctx.clone()));
    };
    // Reserved words and uninitialized bindings read as undefined.
    ctx.eval_with_options::<Value, _>(source, sloppy())
        .or_else(|error| {
            if matches!(error, rquickjs::Error::Exception) {
                ctx.catch();
            }
            Ok(Value::new_undefined(ctx.clone()))
        })
}

fn host_function<'js>(
    ctx: &Ctx<'js>,
    name: &str,
    function: Rc<dyn HostFunction>,
) -> rquickjs::Result<Function<'js>> {
    let name = name.to_string();
    Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            let outcome = args
                .0
                .into_iter()
                .map(|arg| js_to_host(&ctx, arg))
                .collect::<Result<Vec<_>, _>>()
                .and_then(|values| invoke(function.as_ref(), &name, values))
                .and_then(|result| host_to_js(&ctx, &result));
            outcome.map_err(|error| Exception::throw_message(&ctx, &error.to_string()))
        },
    )
}

/// Goes through `Object.defineProperty` so a read-only global can later be
/// replaced by a mutable one and the other way round. Hidden globals are
/// neither enumerable nor configurable.
fn define_global<'js>(
    ctx: &Ctx<'js>,
    name: &str,
    value: Value<'js>,
    writable: bool,
    hidden: bool,
) -> rquickjs::Result<()> {
    let object: Object = ctx.globals().get("Object")?;
    let define: Function = object.get("defineProperty")?;
    let descriptor = Object::new(ctx.clone())?;
    descriptor.set("value", value)?;
    descriptor.set("writable", writable)?;
    descriptor.set("enumerable", !hidden)?;
    descriptor.set("configurable", !hidden)?;
    define.call::<_, Value>((ctx.globals(), name, descriptor))?;
    Ok(())
}

fn host_to_js<'js>(ctx: &Ctx<'js>, value: &HostValue) -> Result<Value<'js>, BridgeError> {
    let converted = match value {
        HostValue::Undefined => Ok(Value::new_undefined(ctx.clone())),
        HostValue::Null => Ok(Value::new_null(ctx.clone())),
        HostValue::Bool(value) => Ok(Value::new_bool(ctx.clone(), *value)),
        HostValue::Number(value) => Ok(Value::new_number(ctx.clone(), *value)),
        HostValue::String(value) => {
            rquickjs::String::from_str(ctx.clone(), value).map(|value| value.into_value())
        }
        HostValue::Array(_) | HostValue::Map(_) => {
            let text = serde_json::to_string(value)
                .map_err(|error| BridgeError::conversion(error.to_string()))?;
            ctx.json_parse(text)
        }
    };
    converted.map_err(|error| BridgeError::conversion(error.to_string()))
}

fn js_to_host<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> Result<HostValue, BridgeError> {
    if value.is_undefined() {
        return Ok(HostValue::Undefined);
    }
    if value.is_null() {
        return Ok(HostValue::Null);
    }
    if let Some(value) = value.as_bool() {
        return Ok(HostValue::Bool(value));
    }
    if let Some(value) = value.as_number() {
        return Ok(HostValue::Number(value));
    }
    if let Some(value) = value.as_string() {
        return value
            .to_string()
            .map(HostValue::String)
            .map_err(|error| BridgeError::conversion(error.to_string()));
    }
    if value.is_function() {
        return Err(BridgeError::conversion(
            "QuickJS functions cannot cross into the host",
        ));
    }
    if value.is_array() || value.is_object() {
        let text = ctx
            .json_stringify(value)
            .map_err(|error| BridgeError::conversion(describe(ctx, error)))?;
        let Some(text) = text else {
            return Ok(HostValue::Undefined);
        };
        let text = text
            .to_string()
            .map_err(|error| BridgeError::conversion(error.to_string()))?;
        let json = serde_json::from_str::<serde_json::Value>(&text)
            .map_err(|error| BridgeError::conversion(error.to_string()))?;
        return Ok(HostValue::from_json(json));
    }

    Err(BridgeError::conversion(format!(
        "QuickJS value of type {:?} cannot cross into the host",
        value.type_of()
    )))
}

fn guest_error(ctx: &Ctx<'_>, error: rquickjs::Error) -> BridgeError {
    BridgeError::runtime(describe(ctx, error))
}

/// Takes the pending exception, if any, and renders it as `name: message`.
fn describe(ctx: &Ctx<'_>, error: rquickjs::Error) -> String {
    if !matches!(error, rquickjs::Error::Exception) {
        return error.to_string();
    }

    let caught = ctx.catch();
    let Some(object) = caught.as_object() else {
        let thrown = js_to_host(ctx, caught.clone())
            .map(|value| value.to_string())
            .unwrap_or_else(|_| "non-plain value".to_string());
        return format!("uncaught exception: {}", thrown);
    };
    let name = object
        .get::<_, Option<String>>("name")
        .ok()
        .flatten()
        .unwrap_or_else(|| "Error".to_string());
    let message = object
        .get::<_, Option<String>>("message")
        .ok()
        .flatten()
        .unwrap_or_default();
    format!("{}: {}", name, message)
}

fn timed_out(
    interrupted: bool,
    result: Result<HostValue, BridgeError>,
) -> Result<HostValue, BridgeError> {
    match result {
        Err(_) if interrupted => Err(BridgeError::timeout(
            "script exceeded its deadline and was interrupted",
        )),
        other => other,
    }
}
