use crate::error::BridgeError;
use crate::value::HostValue;

static UNDEFINED: HostValue = HostValue::Undefined;

/// Arguments of one guest-to-host call, in call-site order.
///
/// Reading past the end yields `undefined`, so a host function declared with
/// two parameters still works when the script passes one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    values: Vec<HostValue>,
}

impl CallArgs {
    pub fn new(values: Vec<HostValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn argument(&self, index: usize) -> &HostValue {
        self.values.get(index).unwrap_or(&UNDEFINED)
    }

    pub fn integer(&self, index: usize) -> Result<i64, BridgeError> {
        self.argument(index).to_integer()
    }

    pub fn number(&self, index: usize) -> f64 {
        self.argument(index).to_number()
    }

    pub fn string(&self, index: usize) -> String {
        self.argument(index).to_string()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HostValue> {
        self.values.iter()
    }

    pub fn as_slice(&self) -> &[HostValue] {
        &self.values
    }
}

impl From<Vec<HostValue>> for CallArgs {
    fn from(values: Vec<HostValue>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod call_tests {
    use super::*;

    #[test]
    fn missing_arguments_read_as_undefined() {
        let args = CallArgs::new(vec![HostValue::from(7)]);
        assert_eq!(args.len(), 1);
        assert_eq!(args.integer(0).expect("first"), 7);
        assert!(args.argument(1).is_undefined());
        assert_eq!(args.integer(1).expect("missing"), 0);
        assert!(args.number(5).is_nan());
        assert_eq!(args.string(2), "undefined");
    }

    #[test]
    fn iteration_sees_every_argument() {
        let args = CallArgs::from(vec![HostValue::from("abc"), HostValue::from(123)]);
        let rendered = args.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(rendered, vec!["abc", "123"]);
        assert!(!args.is_empty());
        assert_eq!(args.as_slice().len(), 2);
    }
}
