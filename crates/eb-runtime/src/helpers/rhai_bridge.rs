use std::collections::BTreeMap;

use eb_core::{BridgeError, HostValue, MAX_SAFE_INTEGER, MIN_SAFE_INTEGER};
use rhai::{Array, Dynamic, ImmutableString, Map, FLOAT, INT};

/// Integral numbers inside the safe range become `INT` so they work as loop
/// bounds and array indices; everything else becomes `FLOAT`.
pub(crate) fn host_to_dynamic(value: &HostValue) -> Dynamic {
    match value {
        HostValue::Undefined | HostValue::Null => Dynamic::UNIT,
        HostValue::Bool(value) => Dynamic::from_bool(*value),
        HostValue::Number(value) => match exact_int(*value) {
            Some(integer) => Dynamic::from_int(integer),
            None => Dynamic::from_float(*value as FLOAT),
        },
        HostValue::String(value) => Dynamic::from(value.clone()),
        HostValue::Array(values) => {
            Dynamic::from_array(values.iter().map(host_to_dynamic).collect::<Array>())
        }
        HostValue::Map(values) => {
            let mut map = Map::new();
            for (key, value) in values {
                map.insert(key.as_str().into(), host_to_dynamic(value));
            }
            Dynamic::from_map(map)
        }
    }
}

pub(crate) fn dynamic_to_host(value: Dynamic) -> Result<HostValue, BridgeError> {
    if value.is_unit() {
        return Ok(HostValue::Undefined);
    }
    if value.is::<bool>() {
        return Ok(HostValue::Bool(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        let integer = value.cast::<INT>();
        if !(MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&integer) {
            return Err(BridgeError::conversion(format!(
                "Rhai integer {} is outside the safe integer range",
                integer
            )));
        }
        return Ok(HostValue::Number(integer as f64));
    }
    if value.is::<FLOAT>() {
        return Ok(HostValue::Number(value.cast::<FLOAT>()));
    }
    if value.is::<ImmutableString>() {
        return Ok(HostValue::String(
            value.cast::<ImmutableString>().to_string(),
        ));
    }
    if value.is::<char>() {
        return Ok(HostValue::String(value.cast::<char>().to_string()));
    }
    if value.is::<Array>() {
        let array = value.cast::<Array>();
        let mut out = Vec::with_capacity(array.len());
        for item in array {
            out.push(dynamic_to_host(item)?);
        }
        return Ok(HostValue::Array(out));
    }
    if value.is::<Map>() {
        let map = value.cast::<Map>();
        let mut out = BTreeMap::new();
        for (key, value) in map {
            out.insert(key.to_string(), dynamic_to_host(value)?);
        }
        return Ok(HostValue::Map(out));
    }

    Err(BridgeError::conversion(format!(
        "Rhai value of type {} cannot cross into the host",
        value.type_name()
    )))
}

fn exact_int(value: f64) -> Option<INT> {
    let in_range = value.abs() <= MAX_SAFE_INTEGER as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as INT)
}

#[cfg(test)]
mod rhai_bridge_tests {
    use super::*;
    use eb_core::ErrorKind;

    #[test]
    fn integral_numbers_become_rhai_integers() {
        assert!(host_to_dynamic(&HostValue::Number(3.0)).is::<INT>());
        assert!(host_to_dynamic(&HostValue::Number(2.5)).is::<FLOAT>());
        assert!(host_to_dynamic(&HostValue::Number(1e300)).is::<FLOAT>());
        assert!(host_to_dynamic(&HostValue::Undefined).is_unit());
    }

    #[test]
    fn composite_values_keep_their_shape() {
        let value = HostValue::Map(BTreeMap::from([(
            "k".to_string(),
            HostValue::Array(vec![HostValue::Bool(false), HostValue::from("x")]),
        )]));
        let dynamic = host_to_dynamic(&value);
        assert!(dynamic.is::<Map>());
        assert_eq!(dynamic_to_host(dynamic).expect("back to host"), value);
    }

    #[test]
    fn unit_reads_as_undefined() {
        assert_eq!(
            dynamic_to_host(Dynamic::UNIT).expect("unit"),
            HostValue::Undefined
        );
        assert_eq!(
            dynamic_to_host(Dynamic::from('c')).expect("char"),
            HostValue::from("c")
        );
    }

    #[test]
    fn integers_beyond_safe_range_are_rejected() {
        let error = dynamic_to_host(Dynamic::from_int(INT::MAX)).expect_err("too large");
        assert_eq!(error.kind, ErrorKind::Conversion);
        assert_eq!(
            dynamic_to_host(Dynamic::from_int(4_999_950_000)).expect("fits"),
            HostValue::Number(4_999_950_000.0)
        );
    }

    #[test]
    fn unsupported_values_fail_conversion() {
        let error = dynamic_to_host(Dynamic::from(std::time::Duration::from_secs(1)))
            .expect_err("custom type");
        assert!(error.message.contains("cannot cross"));
    }
}
