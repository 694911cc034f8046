use std::panic::{self, AssertUnwindSafe};

use eb_core::{BridgeError, CallArgs, HostValue};

/// A native function callable from guest scripts.
///
/// State the function needs lives in the implementing type, so what a binding
/// captures is visible at the registration site. Plain functions and closures
/// with the matching signature implement it too.
pub trait HostFunction {
    fn call(&self, args: &CallArgs) -> Result<HostValue, BridgeError>;
}

impl<F> HostFunction for F
where
    F: Fn(&CallArgs) -> Result<HostValue, BridgeError>,
{
    fn call(&self, args: &CallArgs) -> Result<HostValue, BridgeError> {
        self(args)
    }
}

/// Calls a host function on behalf of a guest. Panics stay on the host side
/// of the boundary and come back as runtime errors, which each engine then
/// throws into the guest.
pub(crate) fn invoke(
    function: &dyn HostFunction,
    name: &str,
    values: Vec<HostValue>,
) -> Result<HostValue, BridgeError> {
    let args = CallArgs::new(values);
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| function.call(&args))) {
        Ok(outcome) => outcome,
        Err(_) => Err(BridgeError::runtime(format!(
            "host function \"{}\" panicked",
            name
        ))),
    };
    if let Err(error) = &outcome {
        tracing::warn!(function = name, %error, "host function failed");
    }
    outcome
}

#[cfg(test)]
mod host_tests {
    use super::*;
    use eb_core::ErrorKind;

    struct Offset {
        by: i64,
    }

    impl HostFunction for Offset {
        fn call(&self, args: &CallArgs) -> Result<HostValue, BridgeError> {
            HostValue::integer(args.integer(0)? + self.by)
        }
    }

    #[test]
    fn capture_structs_and_closures_are_both_callable() {
        let offset = Offset { by: 10 };
        let result = invoke(&offset, "offset", vec![HostValue::from(5)]).expect("offset");
        assert_eq!(result, HostValue::Number(15.0));

        let closure = |args: &CallArgs| -> Result<HostValue, BridgeError> {
            Ok(HostValue::from(args.len() as u32))
        };
        let result = invoke(&closure, "count", vec![HostValue::Null; 3]).expect("count");
        assert_eq!(result, HostValue::Number(3.0));
    }

    #[test]
    fn panics_become_runtime_errors() {
        let exploding = |_: &CallArgs| -> Result<HostValue, BridgeError> { panic!("boom") };
        let error = invoke(&exploding, "explode", Vec::new()).expect_err("panic should map");
        assert_eq!(error.kind, ErrorKind::Runtime);
        assert!(error.message.contains("explode"));
    }
}
