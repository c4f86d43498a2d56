//! Callable objects
//!
//! A [`Callable`] is a named body plus the metadata the instrumentation engine
//! reads: owning module, declared [`Signature`] (absent for native callables),
//! a `wrapped` link to the callable it decorates, and an extension slot.

use crate::error::RaisedError;
use crate::signature::Signature;
use crate::value::{Kwargs, Value};
use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Result of invoking a callable
pub type CallResult = Result<Value, RaisedError>;

type Body = dyn Fn(&CallArgs) -> CallResult + Send + Sync;

/// Type-erased data attached to a callable
pub type Extension = Arc<dyn Any + Send + Sync>;

/// Arguments of one invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    /// Positional arguments in order
    pub args: Vec<Value>,
    /// Keyword arguments
    pub kwargs: Kwargs,
}

impl CallArgs {
    /// No arguments
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional arguments only
    #[must_use]
    pub fn positional(args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            args: args.into_iter().collect(),
            kwargs: Kwargs::new(),
        }
    }

    /// Add a keyword argument
    #[must_use]
    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Positional argument at index
    #[inline]
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Keyword argument by name
    #[inline]
    #[must_use]
    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    /// Parameter bound either positionally at `index` or by keyword `name`
    #[must_use]
    pub fn param(&self, index: usize, name: &str) -> Option<&Value> {
        self.arg(index).or_else(|| self.kwarg(name))
    }
}

/// Callable object with identity
///
/// Cloning shares the callable; [`Callable::ptr_eq`] is identity.
#[derive(Clone)]
pub struct Callable {
    inner: Arc<CallableInner>,
}

struct CallableInner {
    name: String,
    module: Option<String>,
    signature: Option<Signature>,
    bind_arguments: bool,
    wrapped: Option<Callable>,
    extension: Option<Extension>,
    body: Box<Body>,
}

impl Callable {
    /// Start building a callable
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CallableBuilder {
        CallableBuilder::new(name)
    }

    /// Callable name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Owning module name
    #[inline]
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        self.inner.module.as_deref()
    }

    /// `module.name`, or just the name
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match self.module() {
            Some(module) => format!("{module}.{}", self.name()),
            None => self.name().to_string(),
        }
    }

    /// Declared signature; `None` for native callables
    #[inline]
    #[must_use]
    pub fn signature(&self) -> Option<&Signature> {
        self.inner.signature.as_ref()
    }

    /// True when no signature metadata exists
    #[inline]
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.inner.signature.is_none()
    }

    /// Callable this one wraps (decorated function or proxy target)
    #[inline]
    #[must_use]
    pub fn wrapped(&self) -> Option<&Callable> {
        self.inner.wrapped.as_ref()
    }

    /// Attached extension data
    #[inline]
    #[must_use]
    pub fn extension(&self) -> Option<&Extension> {
        self.inner.extension.as_ref()
    }

    /// Same callable object
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Invoke the callable
    ///
    /// Arguments are bound against the declared signature first (unless the
    /// callable was built unchecked).
    ///
    /// # Errors
    /// Returns the `TypeError` from binding, or whatever the body raises.
    pub fn call(&self, args: &CallArgs) -> CallResult {
        if self.inner.bind_arguments {
            if let Some(signature) = &self.inner.signature {
                signature.bind(&self.inner.name, args)?;
            }
        }
        (self.inner.body)(args)
    }

    /// Invoke with positional arguments only
    ///
    /// # Errors
    /// See [`Callable::call`].
    pub fn call_with(&self, args: impl IntoIterator<Item = Value>) -> CallResult {
        self.call(&CallArgs::positional(args))
    }
}

impl Debug for Callable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "<built-in function {}>", self.qualified_name())
        } else {
            write!(f, "<function {}>", self.qualified_name())
        }
    }
}

/// Builder for [`Callable`]
///
/// Callables start as defined functions with an empty signature.
#[derive(Debug)]
pub struct CallableBuilder {
    name: String,
    module: Option<String>,
    signature: Option<Signature>,
    bind_arguments: bool,
    wrapped: Option<Callable>,
    extension: Option<Extension>,
}

impl CallableBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
            signature: Some(Signature::new()),
            bind_arguments: true,
            wrapped: None,
            extension: None,
        }
    }

    /// Owning module
    #[must_use]
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Owning module, if any
    #[must_use]
    pub fn module_opt(mut self, module: Option<&str>) -> Self {
        self.module = module.map(str::to_string);
        self
    }

    /// Declared signature
    #[must_use]
    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Declared signature, or none for a native callable
    #[must_use]
    pub fn signature_opt(mut self, signature: Option<Signature>) -> Self {
        self.signature = signature;
        self
    }

    /// Native callable: no signature metadata
    #[must_use]
    pub fn native(mut self) -> Self {
        self.signature = None;
        self
    }

    /// Skip argument binding; the body sees whatever it is called with
    #[must_use]
    pub fn unchecked(mut self) -> Self {
        self.bind_arguments = false;
        self
    }

    /// Link to the callable this one wraps
    #[must_use]
    pub fn wraps(mut self, wrapped: Callable) -> Self {
        self.wrapped = Some(wrapped);
        self
    }

    /// Attach extension data
    #[must_use]
    pub fn extension(mut self, extension: Extension) -> Self {
        self.extension = Some(extension);
        self
    }

    /// Finish with the callable's body
    pub fn body<F>(self, body: F) -> Callable
    where
        F: Fn(&CallArgs) -> CallResult + Send + Sync + 'static,
    {
        Callable {
            inner: Arc::new(CallableInner {
                name: self.name,
                module: self.module,
                signature: self.signature,
                bind_arguments: self.bind_arguments,
                wrapped: self.wrapped,
                extension: self.extension,
                body: Box::new(body),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adder() -> Callable {
        Callable::builder("add")
            .module("math_utils")
            .signature(Signature::new().positional("x").positional("y"))
            .body(|call| {
                let x = call.param(0, "x").and_then(Value::as_int).unwrap_or(0);
                let y = call.param(1, "y").and_then(Value::as_int).unwrap_or(0);
                Ok(Value::from(x + y))
            })
    }

    #[test]
    fn call_binds_and_runs() {
        let add = adder();
        assert_eq!(add.call_with([Value::from(2), Value::from(3)]).unwrap(), Value::from(5));
        assert_eq!(add.qualified_name(), "math_utils.add");
    }

    #[test]
    fn binding_failure_raises_type_error() {
        let err = adder().call_with([Value::from(1)]).unwrap_err();
        assert!(err.is_kind("TypeError"));
    }

    #[test]
    fn unchecked_skips_binding() {
        let shim = Callable::builder("shim")
            .signature(Signature::new().positional("x"))
            .unchecked()
            .body(|call| Ok(Value::from(call.args.len() as i64)));
        assert_eq!(shim.call_with([]).unwrap(), Value::from(0));
    }

    #[test]
    fn identity_is_shared_by_clones() {
        let add = adder();
        let alias = add.clone();
        assert!(add.ptr_eq(&alias));
        assert!(!add.ptr_eq(&adder()));
    }

    #[test]
    fn native_callables_have_no_signature() {
        let clock = Callable::builder("time")
            .module("time")
            .native()
            .body(|_| Ok(Value::from(0.0)));
        assert!(clock.is_native());
        assert_eq!(format!("{clock:?}"), "<built-in function time.time>");
    }
}
