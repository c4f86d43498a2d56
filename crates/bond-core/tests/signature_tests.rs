use bond_core::{BondError, NativeSignatureTable, SignatureComparator, SignatureDescriptor};
use bond_runtime::{Callable, Signature, Value};
use bond_test_utils::sample_runtime;
use proptest::prelude::*;

/// Shape of a callable: positional count, `*args`, keyword-only `(name, has_default)`, `**kwargs`
#[derive(Debug, Clone)]
struct Shape {
    positional: usize,
    var_positional: bool,
    keyword_only: Vec<(&'static str, bool)>,
    var_keyword: bool,
}

const fn shape(positional: usize, var_positional: bool, var_keyword: bool) -> Shape {
    Shape {
        positional,
        var_positional,
        keyword_only: Vec::new(),
        var_keyword,
    }
}

fn with_kw(mut s: Shape, keyword_only: &[(&'static str, bool)]) -> Shape {
    s.keyword_only = keyword_only.to_vec();
    s
}

fn callable(s: &Shape) -> Callable {
    let mut sig = Signature::new();
    for i in 0..s.positional {
        sig = sig.positional(format!("p{i}"));
    }
    if s.var_positional {
        sig = sig.var_positional("args");
    }
    for (name, default) in &s.keyword_only {
        sig = if *default {
            sig.keyword_only_with_default(*name)
        } else {
            sig.keyword_only(*name)
        };
    }
    if s.var_keyword {
        sig = sig.var_keyword("kwargs");
    }
    Callable::builder("f").signature(sig).body(|_| Ok(Value::None))
}

fn compatible(a: &Shape, b: &Shape) -> bool {
    SignatureComparator::new()
        .compatible(&callable(a), &callable(b))
        .unwrap()
}

fn check_table(cases: &[(Shape, Shape, bool)]) {
    for (a, b, expected) in cases {
        assert_eq!(compatible(a, b), *expected, "{a:?} vs {b:?}");
    }
}

#[test]
fn test_positional_arity() {
    check_table(&[
        (shape(0, false, false), shape(0, false, false), true),
        (shape(1, false, false), shape(0, false, false), false),
        (shape(0, false, false), shape(1, false, false), false),
        (shape(1, false, false), shape(1, false, false), true),
        (shape(2, false, false), shape(1, false, false), false),
        (shape(2, false, false), shape(2, false, false), true),
    ]);
}

#[test]
fn test_positional_names_do_not_matter() {
    let a = Callable::builder("a")
        .signature(Signature::new().positional("_a").positional("_b"))
        .body(|_| Ok(Value::None));
    let c = Callable::builder("c")
        .signature(Signature::new().positional("_c").positional("_d"))
        .body(|_| Ok(Value::None));
    assert!(SignatureComparator::new().compatible(&a, &c).unwrap());
}

#[test]
fn test_defaulted_positionals_count_as_positionals() {
    let with_default = Callable::builder("f")
        .signature(Signature::new().positional_with_default("tz"))
        .body(|_| Ok(Value::None));
    let required = Callable::builder("g")
        .signature(Signature::new().positional("tz"))
        .body(|_| Ok(Value::None));
    assert!(SignatureComparator::new().compatible(&with_default, &required).unwrap());
}

#[test]
fn test_var_positional_parity() {
    check_table(&[
        (shape(1, false, false), shape(1, false, false), true),
        (shape(1, false, false), shape(1, true, false), false),
        (shape(1, true, false), shape(1, false, false), false),
        (shape(1, true, false), shape(1, true, false), true),
    ]);
}

#[test]
fn test_keyword_only_sets() {
    let args = shape(0, true, false);
    check_table(&[
        (args.clone(), args.clone(), true),
        (with_kw(args.clone(), &[("a", false)]), args.clone(), false),
        (with_kw(args.clone(), &[("a", true)]), args.clone(), false),
        (args.clone(), with_kw(args.clone(), &[("a", false)]), false),
        (args.clone(), with_kw(args.clone(), &[("a", true)]), false),
        (with_kw(args.clone(), &[("a", false)]), with_kw(args.clone(), &[("a", false)]), true),
        (with_kw(args.clone(), &[("a", true)]), with_kw(args.clone(), &[("a", false)]), false),
        (with_kw(args.clone(), &[("a", false)]), with_kw(args.clone(), &[("a", true)]), false),
        (
            with_kw(args.clone(), &[("a", false), ("b", false)]),
            with_kw(args.clone(), &[("a", false)]),
            false,
        ),
        (
            with_kw(args.clone(), &[("a", false), ("b", true)]),
            with_kw(args.clone(), &[("a", false)]),
            false,
        ),
        (
            with_kw(args.clone(), &[("a", false), ("b", false)]),
            with_kw(args, &[("a", false), ("b", false)]),
            true,
        ),
    ]);
}

#[test]
fn test_var_keyword_parity() {
    let k = |s: Shape| with_kw(s, &[("k", false)]);
    check_table(&[
        (shape(0, false, false), shape(0, false, true), false),
        (shape(0, false, true), shape(0, false, false), false),
        (shape(0, false, true), shape(0, false, true), true),
        (shape(1, false, false), shape(1, false, true), false),
        (shape(1, false, true), shape(1, false, true), true),
        (shape(1, true, false), shape(1, true, true), false),
        (shape(1, true, true), shape(1, true, false), false),
        (shape(1, true, true), shape(1, true, true), true),
        (k(shape(1, true, false)), k(shape(1, true, false)), true),
        (k(shape(1, true, true)), k(shape(1, true, false)), false),
        (k(shape(1, true, false)), k(shape(1, true, true)), false),
        (k(shape(1, true, true)), k(shape(1, true, true)), true),
    ]);
}

#[test]
fn test_wall_clock_is_a_zero_argument_callable() {
    let samples = sample_runtime();
    let clock = samples.get("time", "time");
    let zero = callable(&shape(0, false, false));
    let comparator = SignatureComparator::new();

    assert!(comparator.compatible(clock.as_callable().unwrap(), &zero).unwrap());
    assert!(!comparator
        .compatible(clock.as_callable().unwrap(), &callable(&shape(1, false, false)))
        .unwrap());
}

#[test]
fn test_other_natives_are_uninspectable() {
    let samples = sample_runtime();
    let print = samples.get("builtins", "print");
    let err = SignatureComparator::new()
        .compatible(print.as_callable().unwrap(), &callable(&shape(0, false, false)))
        .unwrap_err();
    assert_eq!(err.to_string(), "unsupported callable: builtins.print");
    assert!(matches!(err, BondError::Uninspectable { .. }));
}

#[test]
fn test_empty_native_table_drops_the_clock_entry() {
    let samples = sample_runtime();
    let clock = samples.get("time", "time");
    let comparator = SignatureComparator::with_natives(NativeSignatureTable::new());
    assert!(comparator
        .compatible(clock.as_callable().unwrap(), &callable(&shape(0, false, false)))
        .is_err());
}

#[test]
fn test_registered_natives_are_described() {
    let samples = sample_runtime();
    let print = samples.get("builtins", "print");
    let table = NativeSignatureTable::with_defaults().with_qualified(
        "builtins",
        "print",
        SignatureDescriptor {
            var_positional: true,
            ..SignatureDescriptor::default()
        },
    );
    assert_eq!(table.labels(), vec!["time.time", "builtins.print"]);

    let comparator = SignatureComparator::with_natives(table);
    assert!(comparator
        .compatible(print.as_callable().unwrap(), &callable(&shape(0, true, false)))
        .unwrap());
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let names = prop::sample::subsequence(vec!["a", "b", "c"], 0..=3);
    (0..4usize, any::<bool>(), names, any::<bool>(), any::<bool>()).prop_map(
        |(positional, var_positional, names, defaulted, var_keyword)| Shape {
            positional,
            var_positional,
            keyword_only: names.into_iter().map(|n| (n, defaulted)).collect(),
            var_keyword,
        },
    )
}

proptest! {
    #[test]
    fn prop_compatibility_is_reflexive(s in arb_shape()) {
        prop_assert!(compatible(&s, &s));
    }

    #[test]
    fn prop_compatibility_is_symmetric(a in arb_shape(), b in arb_shape()) {
        prop_assert_eq!(compatible(&a, &b), compatible(&b, &a));
    }

    #[test]
    fn prop_positional_mismatch_is_never_compatible(a in arb_shape(), extra in 1..3usize) {
        let mut b = a.clone();
        b.positional += extra;
        prop_assert!(!compatible(&a, &b));
    }
}
