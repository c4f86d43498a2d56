//! Call recording proxies
//!
//! [`wrap`] turns a callable into a proxy that appends one
//! [`InvocationRecord`] per call to a shared [`CallLog`], then hands the
//! result (or the raised error) back unchanged. The log and the link to the
//! replaced callable travel in the proxy's extension slot; [`calls`] and
//! [`original_of`] read them back.

use crate::config::SnapshotPolicy;
use crate::error::BondError;
use bond_runtime::{CallArgs, Callable, Kwargs, RaisedError, Value};
use parking_lot::Mutex;
use std::sync::Arc;

/// How an invocation ended
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// Returned a value
    Returned(Value),
    /// Raised an error
    Raised(RaisedError),
}

/// One recorded invocation
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRecord {
    args: Vec<Value>,
    kwargs: Kwargs,
    outcome: CallOutcome,
}

impl InvocationRecord {
    /// Create record
    #[must_use]
    pub fn new(args: Vec<Value>, kwargs: Kwargs, outcome: CallOutcome) -> Self {
        Self {
            args,
            kwargs,
            outcome,
        }
    }

    /// Positional arguments as captured at call time
    #[inline]
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Keyword arguments as captured at call time
    #[inline]
    #[must_use]
    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    /// How the call ended
    #[inline]
    #[must_use]
    pub fn outcome(&self) -> &CallOutcome {
        &self.outcome
    }

    /// Returned value; absent when the call raised
    #[must_use]
    pub fn return_value(&self) -> Option<&Value> {
        match &self.outcome {
            CallOutcome::Returned(value) => Some(value),
            CallOutcome::Raised(_) => None,
        }
    }

    /// Raised error; absent when the call returned
    #[must_use]
    pub fn error(&self) -> Option<&RaisedError> {
        match &self.outcome {
            CallOutcome::Raised(err) => Some(err),
            CallOutcome::Returned(_) => None,
        }
    }

    /// Compare against expected arguments; `None` skips that part
    #[must_use]
    pub fn matches(&self, args: Option<&[Value]>, kwargs: Option<&Kwargs>) -> bool {
        args.map_or(true, |expected| self.args == expected)
            && kwargs.map_or(true, |expected| &self.kwargs == expected)
    }
}

/// Append-only, call-ordered record list
#[derive(Debug, Default)]
pub struct CallLog {
    records: Mutex<Vec<InvocationRecord>>,
}

impl CallLog {
    /// Create empty log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, record: InvocationRecord) {
        self.records.lock().push(record);
    }

    /// Snapshot of the records in call order
    #[must_use]
    pub fn records(&self) -> Vec<InvocationRecord> {
        self.records.lock().clone()
    }

    /// Number of recorded calls
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

/// What a proxy carries in its extension slot
#[derive(Debug)]
struct ProxyState {
    log: Arc<CallLog>,
    original: Option<Callable>,
}

/// Wrap a callable in a call-recording proxy that replaces the callable itself
///
/// This is the spy form: the proxy forwards to `target` and records it as the
/// callable it replaces.
#[must_use]
pub fn wrap(target: &Callable, snapshot: SnapshotPolicy) -> Callable {
    wrap_replacing(Some(target), target, snapshot)
}

/// Wrap `replacement` in a call-recording proxy standing in for `original`
///
/// The proxy keeps the replacement's name, module and signature, links to it
/// through `wrapped`, and forwards arguments without binding them itself, so
/// binding errors raised by the replacement are recorded too. `original` is
/// what [`original_of`] hands back; it is absent for class-stub methods that
/// have no counterpart on the original class.
#[must_use]
pub fn wrap_replacing(
    original: Option<&Callable>,
    replacement: &Callable,
    snapshot: SnapshotPolicy,
) -> Callable {
    let log = Arc::new(CallLog::new());
    let recorder = Arc::clone(&log);
    let inner = replacement.clone();

    tracing::debug!(
        callable = %replacement.qualified_name(),
        replaces = ?original.map(Callable::qualified_name),
        ?snapshot,
        "wrapping callable"
    );

    let state = ProxyState {
        log,
        original: original.cloned(),
    };
    Callable::builder(replacement.name())
        .module_opt(replacement.module())
        .signature_opt(replacement.signature().cloned())
        .unchecked()
        .wraps(replacement.clone())
        .extension(Arc::new(state))
        .body(move |call| {
            let args = call.args.iter().map(|v| capture(v, snapshot)).collect();
            let kwargs = call
                .kwargs
                .iter()
                .map(|(k, v)| (k.clone(), capture(v, snapshot)))
                .collect();

            let result = inner.call(call);
            let outcome = match &result {
                Ok(value) => CallOutcome::Returned(value.clone()),
                Err(err) => CallOutcome::Raised(err.clone()),
            };
            recorder.append(InvocationRecord::new(args, kwargs, outcome));
            result
        })
}

fn capture(value: &Value, snapshot: SnapshotPolicy) -> Value {
    match snapshot {
        SnapshotPolicy::Reference => value.clone(),
        SnapshotPolicy::DeepWithFallback => value.deep_copy().unwrap_or_else(|err| {
            tracing::warn!(%err, "argument kept by reference");
            value.clone()
        }),
    }
}

fn proxy_state(callable: &Callable) -> Option<Arc<ProxyState>> {
    callable
        .extension()
        .and_then(|ext| Arc::clone(ext).downcast::<ProxyState>().ok())
}

/// Call log of an instrumented value
///
/// # Errors
/// Returns [`BondError::NotInstrumented`] for anything not produced by [`wrap`].
pub fn call_log(value: &Value) -> Result<Arc<CallLog>, BondError> {
    value
        .as_callable()
        .and_then(proxy_state)
        .map(|state| Arc::clone(&state.log))
        .ok_or(BondError::NotInstrumented)
}

/// Records of an instrumented value, in call order
///
/// # Errors
/// Returns [`BondError::NotInstrumented`] for anything not produced by [`wrap`].
pub fn calls(value: &Value) -> Result<Vec<InvocationRecord>, BondError> {
    call_log(value).map(|log| log.records())
}

/// True if `value` is a recording proxy
#[must_use]
pub fn is_instrumented(value: &Value) -> bool {
    call_log(value).is_ok()
}

/// The callable a proxy replaces
#[must_use]
pub fn original_of(value: &Value) -> Option<Callable> {
    value.as_callable().and_then(replaced_by)
}

/// The callable `proxy` stands in for, if it is a recording proxy
pub(crate) fn replaced_by(proxy: &Callable) -> Option<Callable> {
    proxy_state(proxy).and_then(|state| state.original.clone())
}
