use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use eb_core::{
    BridgeError, Capabilities, ContextOptions, EngineKind, ErrorKind, HostValue, Mutability,
};

use crate::context::Context;
use crate::engine::{create_backend, QuickJsRuntime};
use crate::host::HostFunction;

#[derive(Clone)]
enum TemplateBinding {
    Function(Rc<dyn HostFunction>),
    Value(HostValue, Mutability),
}

struct Inner {
    kind: EngineKind,
    options: ContextOptions,
    template: RefCell<BTreeMap<String, TemplateBinding>>,
    quickjs: RefCell<Option<QuickJsRuntime>>,
    live: Cell<usize>,
    closed: Cell<bool>,
}

/// Engine-level state reused by many contexts.
///
/// Bindings made here are installed into every context created afterwards.
/// With QuickJS the contexts also share one engine heap, memory limit and
/// interrupt deadline; other engines get a fresh instance per context.
///
/// Cloning yields another handle to the same runtime. Each context holds one,
/// so the runtime outlives its contexts.
#[derive(Clone)]
pub struct SharedRuntime {
    inner: Rc<Inner>,
}

impl SharedRuntime {
    pub fn new(kind: EngineKind, options: ContextOptions) -> Result<Self, BridgeError> {
        options.validate_for(kind)?;
        let quickjs = match kind {
            EngineKind::QuickJs => Some(QuickJsRuntime::new(&options)?),
            EngineKind::Rhai | EngineKind::Boa => None,
        };
        tracing::debug!(engine = %kind, "shared runtime created");
        Ok(Self {
            inner: Rc::new(Inner {
                kind,
                options,
                template: RefCell::new(BTreeMap::new()),
                quickjs: RefCell::new(quickjs),
                live: Cell::new(0),
                closed: Cell::new(false),
            }),
        })
    }

    pub fn kind(&self) -> EngineKind {
        self.inner.kind
    }

    pub fn options(&self) -> ContextOptions {
        self.inner.options
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.kind.capabilities()
    }

    /// Number of contexts created from this runtime that are still open.
    pub fn live_contexts(&self) -> usize {
        self.inner.live.get()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Adds a host function to the template. Contexts that already exist do
    /// not see it.
    pub fn bind<F>(&self, name: &str, function: F) -> Result<(), BridgeError>
    where
        F: HostFunction + 'static,
    {
        self.ensure_open()?;
        self.inner.template.borrow_mut().insert(
            name.to_string(),
            TemplateBinding::Function(Rc::new(function)),
        );
        Ok(())
    }

    pub fn bind_value(
        &self,
        name: &str,
        value: impl Into<HostValue>,
        mutability: Mutability,
    ) -> Result<(), BridgeError> {
        self.ensure_open()?;
        self.inner.template.borrow_mut().insert(
            name.to_string(),
            TemplateBinding::Value(value.into(), mutability),
        );
        Ok(())
    }

    pub fn create_context(&self) -> Result<Context, BridgeError> {
        self.ensure_open()?;
        let backend = {
            let quickjs = self.inner.quickjs.borrow();
            create_backend(self.inner.kind, &self.inner.options, quickjs.as_ref())?
        };
        self.inner.live.set(self.inner.live.get() + 1);
        let mut context = Context::with_backend(
            self.inner.kind,
            self.inner.options,
            backend,
            Some(self.clone()),
        );

        let template = self.inner.template.borrow().clone();
        for (name, binding) in template {
            match binding {
                TemplateBinding::Function(function) => {
                    context.install_function(&name, function)?
                }
                TemplateBinding::Value(value, mutability) => {
                    context.install_value(&name, &value, mutability)?
                }
            }
        }
        tracing::debug!(
            engine = %self.inner.kind,
            live = self.inner.live.get(),
            "context created from shared runtime"
        );
        Ok(context)
    }

    /// Releases the engine runtime. Fails while any context created from it
    /// is still open.
    pub fn close(&self) -> Result<(), BridgeError> {
        self.ensure_open()?;
        let live = self.inner.live.get();
        if live > 0 {
            return Err(BridgeError::new(
                ErrorKind::RuntimeInUse,
                format!("{} context(s) created from this runtime are still open", live),
            ));
        }
        self.inner.closed.set(true);
        self.inner.template.borrow_mut().clear();
        self.inner.quickjs.borrow_mut().take();
        tracing::debug!(engine = %self.inner.kind, "shared runtime closed");
        Ok(())
    }

    pub(crate) fn release(&self) {
        self.inner.live.set(self.inner.live.get().saturating_sub(1));
    }

    fn ensure_open(&self) -> Result<(), BridgeError> {
        if self.is_closed() {
            return Err(BridgeError::use_after_close("shared runtime is closed"));
        }
        Ok(())
    }
}
