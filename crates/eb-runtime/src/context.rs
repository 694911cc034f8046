use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;

use eb_core::{
    BridgeError, Capabilities, ContextOptions, ContextState, EngineKind, ErrorKind, HostValue,
    Mutability,
};

use crate::engine::{create_backend, EngineBackend};
use crate::host::HostFunction;
use crate::shared::SharedRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Function,
    Value(Mutability),
}

/// One engine instance with its own global namespace.
///
/// Names bound here are visible to every later script. A context is not
/// `Send`; run distinct contexts on distinct threads by creating each on the
/// thread that uses it.
pub struct Context {
    kind: EngineKind,
    options: ContextOptions,
    state: ContextState,
    namespace: BTreeMap<String, Binding>,
    backend: Option<Box<dyn EngineBackend>>,
    runtime: Option<SharedRuntime>,
}

impl Context {
    pub fn create(kind: EngineKind, options: ContextOptions) -> Result<Self, BridgeError> {
        options.validate_for(kind)?;
        let backend = create_backend(kind, &options, None)?;
        tracing::debug!(engine = %kind, "context created");
        Ok(Self::with_backend(kind, options, backend, None))
    }

    pub(crate) fn with_backend(
        kind: EngineKind,
        options: ContextOptions,
        backend: Box<dyn EngineBackend>,
        runtime: Option<SharedRuntime>,
    ) -> Self {
        Self {
            kind,
            options,
            state: ContextState::Created,
            namespace: BTreeMap::new(),
            backend: Some(backend),
            runtime,
        }
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn options(&self) -> ContextOptions {
        self.options
    }

    pub fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_none()
    }

    /// Binds a host function under `name`.
    ///
    /// The function sees missing arguments as `undefined` and may ignore extra
    /// ones. An `Err` it returns, or a panic, is thrown into the guest.
    pub fn bind<F>(&mut self, name: &str, function: F) -> Result<(), BridgeError>
    where
        F: HostFunction + 'static,
    {
        self.install_function(name, Rc::new(function))
    }

    pub fn bind_value(
        &mut self,
        name: &str,
        value: impl Into<HostValue>,
        mutability: Mutability,
    ) -> Result<(), BridgeError> {
        let value = value.into();
        self.install_value(name, &value, mutability)
    }

    pub(crate) fn install_function(
        &mut self,
        name: &str,
        function: Rc<dyn HostFunction>,
    ) -> Result<(), BridgeError> {
        self.check_bindable(name)?;
        self.backend()?.bind_function(name, function)?;
        self.record(name, Binding::Function);
        tracing::debug!(engine = %self.kind, name, "bound host function");
        Ok(())
    }

    pub(crate) fn install_value(
        &mut self,
        name: &str,
        value: &HostValue,
        mutability: Mutability,
    ) -> Result<(), BridgeError> {
        self.check_bindable(name)?;
        self.backend()?.bind_value(name, value, mutability)?;
        self.record(name, Binding::Value(mutability));
        tracing::debug!(engine = %self.kind, name, ?mutability, "bound host value");
        Ok(())
    }

    /// Replaces the value of a mutable binding; the next script sees it.
    pub fn set_value(
        &mut self,
        name: &str,
        value: impl Into<HostValue>,
    ) -> Result<(), BridgeError> {
        self.backend()?;
        match self.namespace.get(name) {
            Some(Binding::Value(Mutability::Mutable)) => {}
            Some(Binding::Value(Mutability::ReadOnly)) => {
                return Err(BridgeError::binding(format!(
                    "\"{}\" is bound read-only",
                    name
                )));
            }
            Some(Binding::Function) => {
                return Err(BridgeError::binding(format!(
                    "\"{}\" is bound to a host function",
                    name
                )));
            }
            None => {
                return Err(BridgeError::binding(format!("\"{}\" is not bound", name)));
            }
        }
        let value = value.into();
        self.backend()?.set_value(name, &value)
    }

    /// Compiles and runs `source` to completion and returns the value of its
    /// last expression.
    ///
    /// A syntax error leaves the context as it was. Any other outcome counts
    /// as a run, after which bound names can no longer be replaced.
    pub fn run(&mut self, source: &str) -> Result<HostValue, BridgeError> {
        let deadline = self.deadline();
        let kind = self.kind;
        let result = self.backend()?.run(source, deadline);
        match &result {
            Ok(_) => tracing::debug!(engine = %kind, "script finished"),
            Err(error) => tracing::debug!(engine = %kind, %error, "script failed"),
        }
        if !matches!(&result, Err(error) if error.kind == ErrorKind::Syntax) {
            self.state = ContextState::Executed;
        }
        result
    }

    /// Looks up a function the guest defined and returns a handle that calls
    /// it with host arguments.
    pub fn export_function(&mut self, name: &str) -> Result<ExportedFunction<'_>, BridgeError> {
        if !self.backend()?.is_function(name)? {
            return Err(BridgeError::conversion(format!(
                "\"{}\" is not a guest function",
                name
            )));
        }
        Ok(ExportedFunction {
            context: self,
            name: name.to_string(),
        })
    }

    /// Reads a global back into the host. Unknown names read as `Undefined`.
    pub fn get(&mut self, name: &str) -> Result<HostValue, BridgeError> {
        self.backend()?.get(name)
    }

    pub fn close(&mut self) -> Result<(), BridgeError> {
        if self.is_closed() {
            return Err(closed_error());
        }
        self.release();
        tracing::debug!(engine = %self.kind, "context closed");
        Ok(())
    }

    fn call_exported(&mut self, name: &str, args: &[HostValue]) -> Result<HostValue, BridgeError> {
        let deadline = self.deadline();
        let result = self.backend()?.call_function(name, args, deadline);
        self.state = ContextState::Executed;
        result
    }

    fn backend(&mut self) -> Result<&mut Box<dyn EngineBackend>, BridgeError> {
        self.backend.as_mut().ok_or_else(closed_error)
    }

    fn deadline(&self) -> Option<Instant> {
        self.options.timeout.map(|timeout| Instant::now() + timeout)
    }

    fn check_bindable(&mut self, name: &str) -> Result<(), BridgeError> {
        self.backend()?;
        if self.state != ContextState::Executed {
            return Ok(());
        }
        if self.namespace.contains_key(name) {
            return Err(BridgeError::binding(format!(
                "\"{}\" is already bound and a script has run",
                name
            )));
        }
        if !self.capabilities().late_binding {
            return Err(BridgeError::binding(format!(
                "engine \"{}\" cannot bind \"{}\" after a script has run",
                self.kind, name
            )));
        }
        Ok(())
    }

    fn record(&mut self, name: &str, binding: Binding) {
        self.namespace.insert(name.to_string(), binding);
        if self.state == ContextState::Created {
            self.state = ContextState::Bound;
        }
    }

    fn release(&mut self) {
        self.backend = None;
        self.namespace.clear();
        self.state = ContextState::Closed;
        if let Some(runtime) = self.runtime.take() {
            runtime.release();
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.release();
        }
    }
}

fn closed_error() -> BridgeError {
    BridgeError::use_after_close("context is closed")
}

/// A guest function exported to the host. Borrows its context, so the
/// context cannot be closed while the handle is alive.
pub struct ExportedFunction<'ctx> {
    context: &'ctx mut Context,
    name: String,
}

impl ExportedFunction<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&mut self, args: &[HostValue]) -> Result<HostValue, BridgeError> {
        self.context.call_exported(&self.name, args)
    }
}
