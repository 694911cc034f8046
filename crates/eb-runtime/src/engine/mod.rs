use std::rc::Rc;
use std::time::Instant;

use eb_core::{BridgeError, ContextOptions, EngineKind, HostValue, Mutability};

use crate::host::HostFunction;

mod boa_backend;
mod quickjs_backend;
mod rhai_backend;

pub(crate) use quickjs_backend::QuickJsRuntime;

/// What every engine offers the bridge. Backends do not track context state;
/// `Context` enforces ordering and closing before calling in here.
pub(crate) trait EngineBackend {
    fn bind_function(
        &mut self,
        name: &str,
        function: Rc<dyn HostFunction>,
    ) -> Result<(), BridgeError>;

    fn bind_value(
        &mut self,
        name: &str,
        value: &HostValue,
        mutability: Mutability,
    ) -> Result<(), BridgeError>;

    fn set_value(&mut self, name: &str, value: &HostValue) -> Result<(), BridgeError>;

    fn run(&mut self, source: &str, deadline: Option<Instant>) -> Result<HostValue, BridgeError>;

    fn is_function(&mut self, name: &str) -> Result<bool, BridgeError>;

    fn call_function(
        &mut self,
        name: &str,
        args: &[HostValue],
        deadline: Option<Instant>,
    ) -> Result<HostValue, BridgeError>;

    fn get(&mut self, name: &str) -> Result<HostValue, BridgeError>;
}

pub(crate) fn create_backend(
    kind: EngineKind,
    options: &ContextOptions,
    shared: Option<&QuickJsRuntime>,
) -> Result<Box<dyn EngineBackend>, BridgeError> {
    match kind {
        EngineKind::Rhai => Ok(Box::new(rhai_backend::RhaiBackend::new(options))),
        EngineKind::Boa => Ok(Box::new(boa_backend::BoaBackend::new()?)),
        EngineKind::QuickJs => {
            let runtime = match shared {
                Some(runtime) => runtime.clone(),
                None => QuickJsRuntime::new(options)?,
            };
            Ok(Box::new(quickjs_backend::QuickJsBackend::new(runtime)?))
        }
    }
}

/// JavaScript that reads `name` from the global lexical scope, where
/// top-level `let` and `const` live, and yields `undefined` for unknown
/// names. `None` when `name` is not a plain identifier.
pub(crate) fn lexical_lookup(name: &str) -> Option<String> {
    let mut chars = name.chars();
    let first = chars.next()?;
    let leading = first.is_ascii_alphabetic() || first == '_' || first == '$';
    if !leading || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return None;
    }
    Some(format!("typeof {0} === 'undefined' ? undefined : {0}", name))
}
