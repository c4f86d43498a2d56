//! Sample business-logic modules
//!
//! Small modules that call each other the two ways real code does: through
//! the owning module (`other_package.write_to_disk(..)`) and through a bound
//! import (`write_to_disk(..)` after `from other_package import write_to_disk`).
//! Every body looks its collaborators up at call time, so rewriting a slot
//! changes what runs.

use bond_runtime::{
    CallArgs, Callable, ClassObject, ClassRef, List, Namespace, NamespaceRef, Opaque, RaisedError,
    Runtime, RuntimeError, Signature, Value,
};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Weak};

/// Message raised by `other_package.dangerous_function`
pub const FLOSS_MESSAGE: &str = "This is what happens when you don't floss!";

/// Loaded sample modules
#[derive(Debug)]
pub struct SampleRuntime {
    pub runtime: Runtime,
    pub time: NamespaceRef,
    pub builtins: NamespaceRef,
    pub datetime: NamespaceRef,
    pub other_package: NamespaceRef,
    pub my_module: NamespaceRef,
    pub my_module_with_bound_imports: NamespaceRef,
    pub decorators: NamespaceRef,
    /// Everything `other_package.write_to_disk` wrote
    pub disk: List,
}

impl SampleRuntime {
    /// Load every sample module into a fresh runtime
    pub fn new() -> Result<Self, RuntimeError> {
        let runtime = Runtime::new();
        let disk = List::new(Vec::new());

        let time = define_time(&runtime)?;
        let builtins = define_builtins(&runtime)?;
        let datetime = define_datetime(&runtime)?;
        let other_package = define_other_package(&runtime, &disk)?;
        let my_module = define_my_module(&runtime, &other_package)?;
        let my_module_with_bound_imports =
            define_my_module_with_bound_imports(&runtime, &other_package, &datetime)?;
        let decorators = define_decorators(&runtime)?;

        Ok(Self {
            runtime,
            time,
            builtins,
            datetime,
            other_package,
            my_module,
            my_module_with_bound_imports,
            decorators,
            disk,
        })
    }

    /// Current value of `module.name`
    pub fn get(&self, module: &str, name: &str) -> Value {
        self.runtime
            .import(module)
            .and_then(|ns| ns.try_get(name))
            .unwrap_or_else(|err| panic!("sample lookup failed: {err}"))
    }
}

/// Call whatever `namespace.name` is bound to right now
pub fn invoke(namespace: &NamespaceRef, name: &str, args: CallArgs) -> Result<Value, RaisedError> {
    let target = namespace
        .try_get(name)
        .map_err(|err| RaisedError::new("AttributeError", err.to_string()))?;
    target.call(&args)
}

fn lookup(scope: &Weak<Namespace>, name: &str) -> Result<Value, RaisedError> {
    scope
        .upgrade()
        .and_then(|ns| ns.get(name))
        .ok_or_else(|| RaisedError::name_error(format!("name '{name}' is not defined")))
}

fn attr(value: &Value, name: &str) -> Result<Value, RaisedError> {
    value.get_attr(name).ok_or_else(|| {
        RaisedError::new("AttributeError", format!("{value:?} has no attribute '{name}'"))
    })
}

fn int_param(call: &CallArgs, index: usize, name: &str) -> Result<i64, RaisedError> {
    call.param(index, name)
        .and_then(Value::as_int)
        .ok_or_else(|| RaisedError::type_error(format!("'{name}' must be an int")))
}

#[allow(clippy::cast_precision_loss)]
fn timestamp(now: DateTime<Utc>) -> Value {
    Value::from(now.timestamp_micros() as f64 / 1_000_000.0)
}

fn define_time(rt: &Runtime) -> Result<NamespaceRef, RuntimeError> {
    let ns = rt.define_module("time")?;
    ns.set(
        "time",
        Callable::builder("time")
            .module("time")
            .native()
            .body(|_| Ok(timestamp(Utc::now()))),
    );
    Ok(ns)
}

fn define_builtins(rt: &Runtime) -> Result<NamespaceRef, RuntimeError> {
    let ns = rt.define_module("builtins")?;
    ns.set(
        "print",
        Callable::builder("print")
            .module("builtins")
            .native()
            .body(|call| {
                let line: Vec<String> = call.args.iter().map(|v| format!("{v:?}")).collect();
                println!("{}", line.join(" "));
                Ok(Value::None)
            }),
    );
    Ok(ns)
}

/// The `datetime` class: `resolution` attribute, `now(tz=None)` and a native
/// `fromtimestamp`
fn datetime_class() -> ClassRef {
    let now = Callable::builder("now")
        .module("datetime")
        .signature(Signature::new().positional_with_default("tz"))
        .body(|_| Ok(Value::Opaque(Opaque::new(Utc::now()))));

    let fromtimestamp = Callable::builder("fromtimestamp")
        .module("datetime")
        .native()
        .body(|call| {
            let seconds = call
                .arg(0)
                .and_then(Value::as_float)
                .ok_or_else(|| RaisedError::type_error("an integer or float is required"))?;
            #[allow(clippy::cast_possible_truncation)]
            let parsed = Utc.timestamp_opt(seconds.trunc() as i64, 0).single();
            parsed
                .map(|dt| Value::Opaque(Opaque::new(dt)))
                .ok_or_else(|| RaisedError::new("ValueError", "timestamp out of range"))
        });

    ClassObject::builder("datetime")
        .module("datetime")
        .attribute("resolution", 1e-6)
        .method(now)
        .method(fromtimestamp)
        .build()
}

fn define_datetime(rt: &Runtime) -> Result<NamespaceRef, RuntimeError> {
    let ns = rt.define_module("datetime")?;
    ns.set("datetime", Value::Class(datetime_class()));
    Ok(ns)
}

fn define_other_package(rt: &Runtime, disk: &List) -> Result<NamespaceRef, RuntimeError> {
    let ns = rt.define_module("other_package")?;

    ns.set(
        "make_a_network_request",
        Callable::builder("make_a_network_request")
            .module("other_package")
            .signature(network_request_signature())
            .body(|call| {
                let x = call.param(0, "x").cloned().unwrap_or_default();
                let method = call.kwarg("method").cloned().unwrap_or_else(|| Value::from("POST"));
                Ok(Value::dict([
                    ("status", Value::from(200)),
                    ("method", method),
                    ("request", x),
                ]))
            }),
    );

    let sink = disk.clone();
    ns.set(
        "write_to_disk",
        Callable::builder("write_to_disk")
            .module("other_package")
            .signature(Signature::new().positional("x"))
            .body(move |call| {
                sink.push(call.param(0, "x").cloned().unwrap_or_default());
                Ok(Value::None)
            }),
    );

    ns.set(
        "dangerous_function",
        Callable::builder("dangerous_function")
            .module("other_package")
            .body(|_| Err(RaisedError::new("Exception", FLOSS_MESSAGE))),
    );

    Ok(ns)
}

/// `(x, *args, y=None, method="POST", use_bit_flip_prevention_technology_for_solar_flares=True, **kwargs)`
pub fn network_request_signature() -> Signature {
    Signature::new()
        .positional("x")
        .var_positional("args")
        .keyword_only_with_default("y")
        .keyword_only_with_default("method")
        .keyword_only_with_default("use_bit_flip_prevention_technology_for_solar_flares")
        .var_keyword("kwargs")
}

/// Calls its collaborators through the `other_package` module
fn define_my_module(rt: &Runtime, other_package: &NamespaceRef) -> Result<NamespaceRef, RuntimeError> {
    let ns = rt.define_module("my_module")?;
    let scope = Arc::downgrade(&ns);
    ns.set("other_package", Value::Namespace(Arc::clone(other_package)));

    let foo_scope = scope.clone();
    ns.set(
        "foo",
        Callable::builder("foo")
            .module("my_module")
            .signature(Signature::new().positional("x"))
            .body(move |call| {
                let package = lookup(&foo_scope, "other_package")?;
                let x = call.param(0, "x").cloned().unwrap_or_default();
                let response = attr(&package, "make_a_network_request")?.call(&CallArgs::positional([x]))?;
                attr(&package, "write_to_disk")?.call(&CallArgs::positional([response.clone()]))?;
                Ok(response)
            }),
    );

    ns.set("bar", forwarding_bar("my_module", scope));
    Ok(ns)
}

/// Same logic with every collaborator bound directly into the module
fn define_my_module_with_bound_imports(
    rt: &Runtime,
    other_package: &NamespaceRef,
    datetime: &NamespaceRef,
) -> Result<NamespaceRef, RuntimeError> {
    const MODULE: &str = "my_module_with_bound_imports";
    let ns = rt.define_module(MODULE)?;
    let scope = Arc::downgrade(&ns);

    for name in ["make_a_network_request", "write_to_disk", "dangerous_function"] {
        ns.set(name, other_package.try_get(name)?);
    }
    ns.set("datetime", datetime.try_get("datetime")?);

    let foo_scope = scope.clone();
    ns.set(
        "foo",
        Callable::builder("foo")
            .module(MODULE)
            .signature(Signature::new().positional("x"))
            .body(move |call| {
                let x = call.param(0, "x").cloned().unwrap_or_default();
                let request = CallArgs::positional([x]).with_kwarg("y", Value::None);
                let response = lookup(&foo_scope, "make_a_network_request")?.call(&request)?;
                lookup(&foo_scope, "write_to_disk")?.call(&CallArgs::positional([response.clone()]))?;
                Ok(response)
            }),
    );

    ns.set("bar", forwarding_bar(MODULE, scope.clone()));

    let danger_scope = scope.clone();
    ns.set(
        "try_dangerous_things",
        Callable::builder("try_dangerous_things")
            .module(MODULE)
            .body(move |_| {
                match lookup(&danger_scope, "dangerous_function")?.call(&CallArgs::new()) {
                    Ok(value) => Ok(value),
                    Err(err) => Ok(Value::Error(err)),
                }
            }),
    );

    ns.set(
        "use_the_datetime_class_to_get_current_timestamp",
        Callable::builder("use_the_datetime_class_to_get_current_timestamp")
            .module(MODULE)
            .body(move |_| {
                let class = lookup(&scope, "datetime")?;
                attr(&class, "now")?.call(&CallArgs::new())
            }),
    );

    Ok(ns)
}

fn forwarding_bar(module: &str, scope: Weak<Namespace>) -> Callable {
    Callable::builder("bar")
        .module(module)
        .signature(Signature::new().positional("x"))
        .body(move |call| {
            let x = call.param(0, "x").cloned().unwrap_or_default();
            lookup(&scope, "foo")?.call(&CallArgs::positional([x]))
        })
}

/// `my_adder(x, y)` behind a pass-through `(*args, **kwargs)` decorator
fn define_decorators(rt: &Runtime) -> Result<NamespaceRef, RuntimeError> {
    let ns = rt.define_module("decorators")?;

    let inner = Callable::builder("my_adder")
        .module("decorators")
        .signature(Signature::new().positional("x").positional("y"))
        .body(|call| Ok(Value::from(int_param(call, 0, "x")? + int_param(call, 1, "y")?)));

    let target = inner.clone();
    let decorated = Callable::builder("my_adder")
        .module("decorators")
        .signature(Signature::new().var_positional("args").var_keyword("kwargs"))
        .wraps(inner)
        .body(move |call| target.call(call));

    ns.set("my_adder", decorated);
    Ok(ns)
}
