//! Replacements for the sample modules

use crate::samples::network_request_signature;
use bond_runtime::{Callable, ClassObject, ClassRef, Opaque, RaisedError, Signature, Value};
use chrono::Utc;

/// Stands in for `other_package.write_to_disk(x)`
pub fn mock_write_to_disk() -> Callable {
    Callable::builder("mock_write_to_disk")
        .signature(Signature::new().positional("x"))
        .body(|_| Ok(Value::from("Wrote to disk!")))
}

/// Stands in for `other_package.make_a_network_request`; answers `{"result": x * 2}`
pub fn mock_make_a_network_request() -> Callable {
    Callable::builder("mock_make_a_network_request")
        .signature(network_request_signature())
        .body(|call| {
            let x = call
                .param(0, "x")
                .and_then(Value::as_int)
                .ok_or_else(|| RaisedError::type_error("'x' must be an int"))?;
            Ok(Value::dict([("result", x * 2)]))
        })
}

/// A frozen clock reading
pub fn mock_now() -> Value {
    Value::Opaque(Opaque::new(Utc::now()))
}

fn frozen_now(now: Value) -> Callable {
    Callable::builder("now")
        .signature(Signature::new().positional_with_default("tz"))
        .body(move |_| Ok(now.clone()))
}

/// `datetime` replacement exposing only `now(tz=None)`
pub fn create_mock_datetime(now: Value) -> ClassRef {
    ClassObject::builder("MockDatetime").method(frozen_now(now)).build()
}

/// `datetime` replacement with the full surface of the sample class
pub fn create_strict_mock_datetime(now: Value) -> ClassRef {
    let fromtimestamp = Callable::builder("fromtimestamp")
        .native()
        .body(|_| Err(RaisedError::new("NotImplementedError", "frozen clock")));

    ClassObject::builder("StrictMockDatetime")
        .attribute("resolution", 1e-6)
        .method(frozen_now(now))
        .method(fromtimestamp)
        .build()
}
