use std::rc::Rc;
use std::time::Instant;

use boa_engine::property::Attribute;
use boa_engine::{
    Context, JsNativeError, JsResult, JsString, JsValue, NativeFunction, Script, Source,
};
use boa_gc::{Finalize, Trace};
use eb_core::{BridgeError, HostValue, Mutability};

use super::{lexical_lookup, EngineBackend};
use crate::host::{invoke, HostFunction};

/// What a bound native function carries. Neither field holds Boa values.
#[derive(Trace, Finalize)]
struct HostCapture {
    #[unsafe_ignore_trace]
    function: Rc<dyn HostFunction>,
    #[unsafe_ignore_trace]
    name: String,
}

/// Boa has no way to stop a running script from the outside, so deadlines
/// passed in here are ignored; `ContextOptions::validate_for` rejects them
/// before a Boa context is created.
pub(crate) struct BoaBackend {
    context: Context,
}

impl BoaBackend {
    pub(crate) fn new() -> Result<Self, BridgeError> {
        let context = Context::builder().build().map_err(|error| {
            BridgeError::engine_init(format!("failed to create Boa context: {}", error))
        })?;
        Ok(Self { context })
    }

    /// A global object property, falling back to the global lexical scope.
    fn global(&mut self, name: &str) -> Result<JsValue, BridgeError> {
        let key = JsString::from(name);
        let global = self.context.global_object();
        let present = global
            .has_property(key.clone(), &mut self.context)
            .map_err(|error| BridgeError::runtime(error.to_string()))?;
        if present {
            return global
                .get(key, &mut self.context)
                .map_err(|error| BridgeError::runtime(error.to_string()));
        }
        let Some(source) = lexical_lookup(name) else {
            return Ok(JsValue::undefined());
        };
        // Reserved words and uninitialized bindings read as undefined.
        let value = Script::parse(Source::from_bytes(&source), None, &mut self.context)
            .and_then(|script| script.evaluate(&mut self.context))
            .unwrap_or_else(|_| JsValue::undefined());
        Ok(value)
    }
}

impl EngineBackend for BoaBackend {
    fn bind_function(
        &mut self,
        name: &str,
        function: Rc<dyn HostFunction>,
    ) -> Result<(), BridgeError> {
        let native = NativeFunction::from_copy_closure_with_captures(
            |_this: &JsValue, args: &[JsValue], capture: &HostCapture, context: &mut Context| {
                call_host(capture.function.as_ref(), &capture.name, args, context)
            },
            HostCapture {
                function,
                name: name.to_string(),
            },
        );
        self.context
            .register_global_callable(JsString::from(name), 0, native)
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
        let value = host_to_js(value, &mut self.context)?;
        let attribute = match mutability {
            Mutability::Mutable => Attribute::all(),
            Mutability::ReadOnly => Attribute::ENUMERABLE | Attribute::CONFIGURABLE,
        };
        self.context
            .register_global_property(JsString::from(name), value, attribute)
            .map_err(|error| {
                BridgeError::engine_init(format!("failed to bind \"{}\": {}", name, error))
            })
    }

    fn set_value(&mut self, name: &str, value: &HostValue) -> Result<(), BridgeError> {
        let value = host_to_js(value, &mut self.context)?;
        self.context
            .global_object()
            .set(JsString::from(name), value, true, &mut self.context)
            .map(|_| ())
            .map_err(|error| BridgeError::runtime(error.to_string()))
    }

    fn run(&mut self, source: &str, _deadline: Option<Instant>) -> Result<HostValue, BridgeError> {
        let script = Script::parse(Source::from_bytes(source), None, &mut self.context)
            .map_err(|error| BridgeError::syntax(error.to_string()))?;
        let value = script
            .evaluate(&mut self.context)
            .map_err(|error| BridgeError::runtime(error.to_string()))?;
        js_to_host(&value, &mut self.context)
    }

    fn is_function(&mut self, name: &str) -> Result<bool, BridgeError> {
        Ok(self.global(name)?.is_callable())
    }

    fn call_function(
        &mut self,
        name: &str,
        args: &[HostValue],
        _deadline: Option<Instant>,
    ) -> Result<HostValue, BridgeError> {
        let value = self.global(name)?;
        let Some(function) = value.as_callable() else {
            return Err(BridgeError::conversion(format!(
                "\"{}\" is not a function",
                name
            )));
        };
        let args = args
            .iter()
            .map(|arg| host_to_js(arg, &mut self.context))
            .collect::<Result<Vec<_>, _>>()?;
        let result = function
            .call(&JsValue::undefined(), &args, &mut self.context)
            .map_err(|error| BridgeError::runtime(error.to_string()))?;
        js_to_host(&result, &mut self.context)
    }

    fn get(&mut self, name: &str) -> Result<HostValue, BridgeError> {
        let value = self.global(name)?;
        js_to_host(&value, &mut self.context)
    }
}

fn call_host(
    function: &dyn HostFunction,
    name: &str,
    args: &[JsValue],
    context: &mut Context,
) -> JsResult<JsValue> {
    let outcome = args
        .iter()
        .map(|arg| js_to_host(arg, context))
        .collect::<Result<Vec<_>, _>>()
        .and_then(|values| invoke(function, name, values))
        .and_then(|result| host_to_js(&result, context));
    outcome.map_err(|error| JsNativeError::error().with_message(error.to_string()).into())
}

fn host_to_js(value: &HostValue, context: &mut Context) -> Result<JsValue, BridgeError> {
    match value {
        HostValue::Undefined => Ok(JsValue::undefined()),
        HostValue::Null => Ok(JsValue::null()),
        HostValue::Bool(value) => Ok(JsValue::from(*value)),
        HostValue::Number(value) => Ok(JsValue::from(*value)),
        HostValue::String(value) => Ok(JsValue::from(JsString::from(value.as_str()))),
        HostValue::Array(_) | HostValue::Map(_) => JsValue::from_json(&value.to_json(), context)
            .map_err(|error| BridgeError::conversion(error.to_string())),
    }
}

fn js_to_host(value: &JsValue, context: &mut Context) -> Result<HostValue, BridgeError> {
    if value.is_undefined() {
        return Ok(HostValue::Undefined);
    }
    if value.is_null() {
        return Ok(HostValue::Null);
    }
    if let Some(value) = value.as_boolean() {
        return Ok(HostValue::Bool(value));
    }
    if let Some(value) = value.as_number() {
        return Ok(HostValue::Number(value));
    }
    if let Some(value) = value.as_string() {
        return Ok(HostValue::String(value.to_std_string_escaped()));
    }
    if value.is_callable() {
        return Err(BridgeError::conversion(
            "Boa functions cannot cross into the host",
        ));
    }
    if value.is_object() {
        let json = value
            .to_json(context)
            .map_err(|error| BridgeError::conversion(error.to_string()))?;
        return Ok(HostValue::from_json(json));
    }

    Err(BridgeError::conversion(
        "Boa symbols and big integers cannot cross into the host",
    ))
}
