//! Instrumentation policy
//!
//! Decides whether a replacement may stand in for an original and builds the
//! proxy that gets installed:
//!
//! | original | replacement | result |
//! |----------|-------------|--------|
//! | callable | callable | signature check under strict mode, then one recording proxy |
//! | callable | anything else | [`BondError::ExpectedCallable`] |
//! | class-like | class-like | attribute, method and per-method checks under strict mode, then a proxy class with every method recorded |
//! | class-like | anything else | [`BondError::ExpectedClass`] |
//! | anything else | - | [`BondError::UnsupportedTarget`] |

use crate::config::SnapshotPolicy;
use crate::error::BondError;
use crate::recorder;
use crate::signature::SignatureComparator;
use bond_runtime::{ClassLike, ClassObject, ClassRef, Value};
use std::fmt;

/// Non-fatal finding from building a proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    /// Methods whose signatures could not be compared
    UncheckedMethods {
        /// Original class name
        class: String,
        /// Method names, sorted
        methods: Vec<String>,
    },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UncheckedMethods { class, methods } => write!(
                f,
                "The following methods' signatures cannot be checked on {class}: {methods:?}."
            ),
        }
    }
}

/// A proxy ready to install, plus what was learned building it
#[derive(Debug, Clone)]
pub struct Instrumented {
    /// Value to install in place of the original
    pub value: Value,
    /// Non-fatal findings
    pub advisories: Vec<Advisory>,
}

/// Builds proxies according to target kind
#[derive(Debug, Clone, Copy)]
pub struct InstrumentationPolicy<'c> {
    comparator: &'c SignatureComparator,
    snapshot: SnapshotPolicy,
}

impl<'c> InstrumentationPolicy<'c> {
    /// Create policy
    #[must_use]
    pub fn new(comparator: &'c SignatureComparator, snapshot: SnapshotPolicy) -> Self {
        Self {
            comparator,
            snapshot,
        }
    }

    /// Validate `replacement` against `original` and build its proxy
    ///
    /// With `strict` off every compatibility check is skipped; wrapping still
    /// happens.
    ///
    /// # Errors
    /// See the table in the module documentation. Under strict mode, also any
    /// incompatibility, or [`BondError::Uninspectable`] when a top-level
    /// callable cannot be described.
    pub fn build(
        &self,
        original: &Value,
        replacement: &Value,
        strict: bool,
    ) -> Result<Instrumented, BondError> {
        match (original, replacement) {
            (Value::Callable(original), Value::Callable(replacement)) => {
                if strict && !self.comparator.compatible(original, replacement)? {
                    return Err(BondError::IncompatibleSignature {
                        name: original.name().to_string(),
                    });
                }
                Ok(Instrumented {
                    value: Value::Callable(recorder::wrap_replacing(
                        Some(original),
                        replacement,
                        self.snapshot,
                    )),
                    advisories: Vec::new(),
                })
            }
            (Value::Callable(original), other) => Err(BondError::ExpectedCallable {
                name: original.name().to_string(),
                found: other.type_name(),
            }),
            (Value::Class(original), Value::Class(replacement)) => {
                let advisories = if strict {
                    self.check_class(&**original, &**replacement)?
                } else {
                    Vec::new()
                };
                Ok(Instrumented {
                    value: Value::Class(self.proxy_class(&**original, replacement)),
                    advisories,
                })
            }
            (Value::Class(original), other) => Err(BondError::ExpectedClass {
                name: original.name().to_string(),
                found: other.type_name(),
            }),
            (other, _) => Err(BondError::UnsupportedTarget {
                type_name: other.type_name(),
            }),
        }
    }

    fn check_class(
        &self,
        original: &dyn ClassLike,
        replacement: &dyn ClassLike,
    ) -> Result<Vec<Advisory>, BondError> {
        let (ours, theirs) = (original.list_attributes(), replacement.list_attributes());
        if ours != theirs {
            return Err(BondError::IncompatibleAttributes {
                class: original.name().to_string(),
                stub: replacement.name().to_string(),
                original: ours,
                provided: theirs,
            });
        }

        let (ours, theirs) = (original.list_methods(), replacement.list_methods());
        if ours != theirs {
            return Err(BondError::incompatible_methods(
                original.name(),
                replacement.name(),
                ours,
                theirs,
            ));
        }

        let mut unchecked = Vec::new();
        for method in &ours {
            let (Some(Value::Callable(a)), Some(Value::Callable(b))) =
                (original.get_member(method), replacement.get_member(method))
            else {
                continue;
            };
            match self.comparator.compatible(&a, &b) {
                Ok(true) => {}
                Ok(false) => {
                    return Err(BondError::IncompatibleMethodSignature {
                        class: original.name().to_string(),
                        stub: replacement.name().to_string(),
                        method: method.clone(),
                    })
                }
                Err(BondError::Uninspectable { .. }) => unchecked.push(method.clone()),
                Err(err) => return Err(err),
            }
        }

        if unchecked.is_empty() {
            return Ok(Vec::new());
        }
        let advisory = Advisory::UncheckedMethods {
            class: original.name().to_string(),
            methods: unchecked,
        };
        tracing::warn!("{advisory}");
        Ok(vec![advisory])
    }

    /// New class carrying the replacement's attributes and a recording proxy
    /// for each of its methods, linked to the original's method of that name
    fn proxy_class(&self, original: &dyn ClassLike, replacement: &ClassRef) -> ClassRef {
        let mut builder = ClassObject::builder(replacement.name()).module_opt(replacement.module());
        for name in replacement.list_attributes() {
            if let Some(value) = replacement.get_member(&name) {
                builder = builder.member(name, value);
            }
        }
        for name in replacement.list_methods() {
            if let Some(Value::Callable(method)) = replacement.get_member(&name) {
                let replaced = match original.get_member(&name) {
                    Some(Value::Callable(replaced)) => Some(replaced),
                    _ => None,
                };
                let proxy = recorder::wrap_replacing(replaced.as_ref(), &method, self.snapshot);
                builder = builder.member(name, Value::Callable(proxy));
            }
        }
        builder.build()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use bond_runtime::{Callable, Signature};
    use std::collections::BTreeSet;

    fn func(name: &str, signature: Signature) -> Callable {
        Callable::builder(name).signature(signature).body(|_| Ok(Value::None))
    }

    fn one_arg(name: &str) -> Value {
        Value::Callable(func(name, Signature::new().positional("x")))
    }

    fn build(original: &Value, replacement: &Value, strict: bool) -> Result<Instrumented, BondError> {
        let comparator = SignatureComparator::new();
        InstrumentationPolicy::new(&comparator, SnapshotPolicy::default()).build(
            original,
            replacement,
            strict,
        )
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn matching_callable_is_wrapped() {
        let built = build(&one_arg("write_to_disk"), &one_arg("stub"), true).unwrap();
        assert!(recorder::is_instrumented(&built.value));
        assert!(built.advisories.is_empty());
    }

    #[test]
    fn mismatched_callable_names_original() {
        let zero = Value::Callable(func("stub", Signature::new()));
        let err = build(&one_arg("write_to_disk"), &zero, true).unwrap_err();
        assert_eq!(err.to_string(), "Stub does not match the signature of write_to_disk.");
    }

    #[test]
    fn lenient_mode_skips_checks() {
        let zero = Value::Callable(func("stub", Signature::new()));
        assert!(build(&one_arg("write_to_disk"), &zero, false).is_ok());
    }

    #[test]
    fn callable_needs_callable_replacement() {
        let err = build(&one_arg("write_to_disk"), &Value::from("not callable"), false).unwrap_err();
        assert_eq!(
            err,
            BondError::ExpectedCallable {
                name: "write_to_disk".into(),
                found: "str".into()
            }
        );
    }

    #[test]
    fn unsupported_targets_are_named() {
        let err = build(&Value::from("text"), &Value::from("text"), true).unwrap_err();
        assert_eq!(err.to_string(), "Object of type 'str' is not supported by bond.");
    }

    #[test]
    fn class_needs_class_replacement() {
        let class = Value::Class(ClassObject::builder("Clock").build());
        let err = build(&class, &one_arg("now"), true).unwrap_err();
        assert!(matches!(err, BondError::ExpectedClass { .. }));
    }

    #[test]
    fn class_method_sets_must_match() {
        let original = Value::Class(
            ClassObject::builder("Original")
                .method(func("a", Signature::new()))
                .method(func("b", Signature::new()))
                .build(),
        );
        let stub = Value::Class(
            ClassObject::builder("Stub")
                .method(func("a", Signature::new()))
                .build(),
        );

        let err = build(&original, &stub, true).unwrap_err();
        let BondError::IncompatibleMethods { missing, .. } = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(missing, &names(&["b"]));
        assert!(build(&original, &stub, false).is_ok());
    }

    #[test]
    fn class_attribute_sets_must_match() {
        let original = Value::Class(ClassObject::builder("Original").attribute("min", 0).build());
        let stub = Value::Class(ClassObject::builder("Stub").build());
        let err = build(&original, &stub, true).unwrap_err();
        assert!(matches!(err, BondError::IncompatibleAttributes { .. }));
    }

    #[test]
    fn class_method_signatures_are_compared() {
        let original = Value::Class(
            ClassObject::builder("Original")
                .method(func("now", Signature::new().positional_with_default("tz")))
                .build(),
        );
        let stub = Value::Class(
            ClassObject::builder("Stub")
                .method(func("now", Signature::new()))
                .build(),
        );
        let err = build(&original, &stub, true).unwrap_err();
        assert_eq!(
            err,
            BondError::IncompatibleMethodSignature {
                class: "Original".into(),
                stub: "Stub".into(),
                method: "now".into()
            }
        );
    }

    #[test]
    fn uninspectable_methods_become_advisories() {
        let native = Callable::builder("fromtimestamp").native().body(|_| Ok(Value::None));
        let original = Value::Class(ClassObject::builder("Original").method(native.clone()).build());
        let stub = Value::Class(ClassObject::builder("Stub").method(native).build());

        let built = build(&original, &stub, true).unwrap();
        assert_eq!(
            built.advisories,
            vec![Advisory::UncheckedMethods {
                class: "Original".into(),
                methods: vec!["fromtimestamp".into()]
            }]
        );
    }

    #[test]
    fn class_proxy_wraps_every_method() {
        let stub = ClassObject::builder("Stub")
            .attribute("resolution", 1)
            .method(func("now", Signature::new()))
            .method(func("today", Signature::new()))
            .build();
        let built = build(&Value::Class(stub.clone()), &Value::Class(stub), false).unwrap();

        let proxy = built.value.as_class().unwrap();
        assert_eq!(proxy.list_methods(), names(&["now", "today"]));
        assert_eq!(proxy.get_member("resolution"), Some(Value::from(1)));
        for method in proxy.list_methods() {
            assert!(recorder::is_instrumented(&proxy.get_member(&method).unwrap()));
        }
    }

    #[test]
    fn class_proxy_methods_link_to_original_methods() {
        let now = func("now", Signature::new());
        let original = ClassObject::builder("Clock").method(now.clone()).build();
        let stub = ClassObject::builder("FakeClock")
            .method(func("now", Signature::new()))
            .method(func("extra", Signature::new()))
            .build();
        let built = build(&Value::Class(original), &Value::Class(stub), false).unwrap();

        let proxy = built.value.as_class().unwrap();
        let linked = recorder::original_of(&proxy.get_member("now").unwrap()).unwrap();
        assert!(linked.ptr_eq(&now));
        assert!(recorder::original_of(&proxy.get_member("extra").unwrap()).is_none());
    }

    #[test]
    fn callable_proxy_links_to_original() {
        let original = one_arg("write_to_disk");
        let built = build(&original, &one_arg("stub"), true).unwrap();
        let linked = recorder::original_of(&built.value).unwrap();
        assert!(Value::Callable(linked).is_identical(&original));
    }
}
