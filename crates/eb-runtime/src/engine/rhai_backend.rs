use std::any::TypeId;
use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::Instant;

use eb_core::{BridgeError, ContextOptions, HostValue, Mutability};
use rhai::{Dynamic, Engine, EvalAltResult, NativeCallContext, Position, Scope, AST};

use super::EngineBackend;
use crate::helpers::rhai_bridge::{dynamic_to_host, host_to_dynamic};
use crate::host::{invoke, HostFunction};

/// Rhai resolves functions by name and arity, so each host function is
/// registered once per arity up to this bound.
pub(crate) const MAX_HOST_ARITY: usize = 8;

pub(crate) struct RhaiBackend {
    engine: Engine,
    scope: Scope<'static>,
    /// Scope entries below this index are host bindings.
    bound: usize,
    /// Functions defined by scripts run so far; statements are dropped.
    library: AST,
    deadline: Rc<Cell<Option<Instant>>>,
}

impl RhaiBackend {
    pub(crate) fn new(options: &ContextOptions) -> Self {
        let mut engine = Engine::new();
        let deadline: Rc<Cell<Option<Instant>>> = Rc::new(Cell::new(None));
        if options.timeout.is_some() {
            let deadline = Rc::clone(&deadline);
            engine.on_progress(move |_operations| match deadline.get() {
                Some(at) if Instant::now() >= at => Some(Dynamic::UNIT),
                _ => None,
            });
        }

        Self {
            engine,
            scope: Scope::new(),
            bound: 0,
            library: AST::empty(),
            deadline,
        }
    }

    /// Keeps only the latest guest variable of each name and drops guest
    /// variables named like a host binding. The scope stays bounded across
    /// runs and bound names keep reaching their bindings.
    fn settle_scope(&mut self) {
        let declared = self
            .scope
            .iter()
            .skip(self.bound)
            .map(|(name, constant, value)| (name.to_string(), constant, value))
            .collect::<Vec<_>>();
        self.scope.rewind(self.bound);

        let mut seen = self
            .scope
            .iter()
            .map(|(name, _, _)| name.to_string())
            .collect::<BTreeSet<_>>();
        let mut kept = Vec::new();
        for (name, constant, value) in declared.into_iter().rev() {
            if seen.insert(name.clone()) {
                kept.push((name, constant, value));
            }
        }
        for (name, constant, value) in kept.into_iter().rev() {
            if constant {
                self.scope.push_constant_dynamic(name, value);
            } else {
                self.scope.push_dynamic(name, value);
            }
        }
    }
}

impl EngineBackend for RhaiBackend {
    fn bind_function(
        &mut self,
        name: &str,
        function: Rc<dyn HostFunction>,
    ) -> Result<(), BridgeError> {
        for arity in 0..=MAX_HOST_ARITY {
            let function = Rc::clone(&function);
            let function_name = name.to_string();
            self.engine.register_raw_fn(
                name,
                vec![TypeId::of::<Dynamic>(); arity],
                move |_context: NativeCallContext,
                      args: &mut [&mut Dynamic]|
                      -> Result<Dynamic, Box<EvalAltResult>> {
                    let values = args
                        .iter_mut()
                        .map(|arg| dynamic_to_host(std::mem::take(&mut **arg)))
                        .collect::<Result<Vec<_>, _>>();
                    values
                        .and_then(|values| invoke(function.as_ref(), &function_name, values))
                        .map(|result| host_to_dynamic(&result))
                        .map_err(|error| {
                            EvalAltResult::ErrorRuntime(error.to_string().into(), Position::NONE)
                                .into()
                        })
                },
            );
        }
        Ok(())
    }

    fn bind_value(
        &mut self,
        name: &str,
        value: &HostValue,
        mutability: Mutability,
    ) -> Result<(), BridgeError> {
        let value = host_to_dynamic(value);
        match mutability {
            Mutability::ReadOnly => self.scope.push_constant_dynamic(name.to_string(), value),
            Mutability::Mutable => self.scope.push_dynamic(name.to_string(), value),
        };
        self.bound = self.scope.len();
        Ok(())
    }

    fn set_value(&mut self, name: &str, value: &HostValue) -> Result<(), BridgeError> {
        // After `settle_scope` the last entry for a bound name is the binding.
        match self.scope.is_constant(name) {
            Some(false) => {
                self.scope.set_value(name.to_string(), host_to_dynamic(value));
                Ok(())
            }
            Some(true) => Err(BridgeError::binding(format!(
                "\"{}\" is bound read-only",
                name
            ))),
            None => Err(BridgeError::binding(format!("\"{}\" is not bound", name))),
        }
    }

    fn run(&mut self, source: &str, deadline: Option<Instant>) -> Result<HostValue, BridgeError> {
        let ast = self
            .engine
            .compile(source)
            .map_err(|error| BridgeError::syntax(error.to_string()))?;
        let program = self.library.merge(&ast);

        self.deadline.set(deadline);
        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut self.scope, &program);
        self.deadline.set(None);

        self.library = program.clone_functions_only();
        self.settle_scope();
        dynamic_to_host(result.map_err(guest_error)?)
    }

    fn is_function(&mut self, name: &str) -> Result<bool, BridgeError> {
        Ok(self
            .library
            .iter_functions()
            .any(|function| function.name == name))
    }

    fn call_function(
        &mut self,
        name: &str,
        args: &[HostValue],
        deadline: Option<Instant>,
    ) -> Result<HostValue, BridgeError> {
        let args = args.iter().map(host_to_dynamic).collect::<Vec<_>>();

        self.deadline.set(deadline);
        let result = self
            .engine
            .call_fn::<Dynamic>(&mut self.scope, &self.library, name, args);
        self.deadline.set(None);

        dynamic_to_host(result.map_err(guest_error)?)
    }

    fn get(&mut self, name: &str) -> Result<HostValue, BridgeError> {
        match self.scope.get_value::<Dynamic>(name) {
            Some(value) => dynamic_to_host(value),
            None => Ok(HostValue::Undefined),
        }
    }
}

fn guest_error(error: Box<EvalAltResult>) -> BridgeError {
    match *error {
        EvalAltResult::ErrorParsing(..) => BridgeError::syntax(error.to_string()),
        EvalAltResult::ErrorTerminated(..) => {
            BridgeError::timeout("script exceeded its deadline and was terminated")
        }
        _ => BridgeError::runtime(error.to_string()),
    }
}

#[cfg(test)]
mod rhai_backend_tests {
    use super::*;

    #[test]
    fn repeated_runs_do_not_grow_the_scope() {
        let mut backend = RhaiBackend::new(&ContextOptions::default());
        backend
            .bind_value("abc", &HostValue::from(1), Mutability::Mutable)
            .expect("bind abc");
        for _ in 0..3 {
            backend
                .run("let tmp = 1; let abc = 2; let tmp = 3; tmp", None)
                .expect("run");
        }
        assert_eq!(backend.scope.len(), 2);
        assert_eq!(backend.get("tmp").expect("get tmp"), HostValue::Number(3.0));
        assert_eq!(backend.get("abc").expect("get abc"), HostValue::Number(1.0));

        backend
            .set_value("abc", &HostValue::from(9))
            .expect("set abc");
        assert_eq!(backend.run("abc", None).expect("run"), HostValue::Number(9.0));
    }

    #[test]
    fn set_value_refuses_constants_and_unknown_names() {
        let mut backend = RhaiBackend::new(&ContextOptions::default());
        backend
            .bind_value("ro", &HostValue::from(1), Mutability::ReadOnly)
            .expect("bind ro");
        let error = backend
            .set_value("ro", &HostValue::from(2))
            .expect_err("constant");
        assert_eq!(error.kind, eb_core::ErrorKind::Binding);
        let error = backend
            .set_value("nope", &HostValue::from(2))
            .expect_err("unknown");
        assert_eq!(error.kind, eb_core::ErrorKind::Binding);
    }
}
