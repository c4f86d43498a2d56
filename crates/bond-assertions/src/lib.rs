//! Bond Assertions
//!
//! Predicates over the recorded calls of instrumented callables. Each one
//! reads [`bond_core::calls`] and fails with [`BondError::NotInstrumented`]
//! for anything that was never wrapped, so a forgotten spy is never mistaken
//! for "not called".
//!
//! Argument filters take `None` to mean "don't check this part".
//!
//! # Example
//!
//! ```rust
//! use bond_assertions::{called_with_args, times_called};
//! use bond_core::{wrap, SnapshotPolicy};
//! use bond_runtime::{Callable, Signature, Value};
//!
//! let echo = Callable::builder("echo")
//!     .signature(Signature::new().positional("x"))
//!     .body(|call| Ok(call.args[0].clone()));
//! let proxy = Value::Callable(wrap(&echo, SnapshotPolicy::default()));
//!
//! proxy.call(&bond_runtime::CallArgs::positional([Value::from(7)])).unwrap();
//! assert!(times_called(&proxy, 1).unwrap());
//! assert!(called_with_args(&proxy, Some(&[Value::from(7)][..]), None).unwrap());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

use bond_core::{calls, BondError};
use bond_runtime::{Kwargs, Value};

/// Called at least once
///
/// # Errors
/// [`BondError::NotInstrumented`] if `f` was never wrapped.
pub fn was_called(f: &Value) -> Result<bool, BondError> {
    Ok(!calls(f)?.is_empty())
}

/// Called exactly `n` times
///
/// # Errors
/// [`BondError::NotInstrumented`] if `f` was never wrapped.
pub fn times_called(f: &Value, n: usize) -> Result<bool, BondError> {
    Ok(calls(f)?.len() == n)
}

/// Some call matched both filters
///
/// # Errors
/// [`BondError::NotInstrumented`] if `f` was never wrapped.
pub fn called_with_args(
    f: &Value,
    args: Option<&[Value]>,
    kwargs: Option<&Kwargs>,
) -> Result<bool, BondError> {
    Ok(calls(f)?.iter().any(|record| record.matches(args, kwargs)))
}

/// Called exactly once, and that call matched both filters
///
/// # Errors
/// [`BondError::NotInstrumented`] if `f` was never wrapped.
pub fn called_exactly_once_with_args(
    f: &Value,
    args: Option<&[Value]>,
    kwargs: Option<&Kwargs>,
) -> Result<bool, BondError> {
    let records = calls(f)?;
    Ok(records.len() == 1 && records[0].matches(args, kwargs))
}

/// Every call matched the corresponding entry, position for position
///
/// False when there were no calls at all.
///
/// # Errors
/// [`BondError::NotInstrumented`] if `f` was never wrapped.
pub fn called_with_exact_args_list(
    f: &Value,
    args_list: Option<&[Vec<Value>]>,
    kwargs_list: Option<&[Kwargs]>,
) -> Result<bool, BondError> {
    let records = calls(f)?;
    if records.is_empty() {
        return Ok(false);
    }
    let args_match = args_list.map_or(true, |expected| {
        expected.len() == records.len()
            && expected.iter().zip(&records).all(|(e, r)| r.args() == e.as_slice())
    });
    let kwargs_match = kwargs_list.map_or(true, |expected| {
        expected.len() == records.len()
            && expected.iter().zip(&records).all(|(e, r)| r.kwargs() == e)
    });
    Ok(args_match && kwargs_match)
}
