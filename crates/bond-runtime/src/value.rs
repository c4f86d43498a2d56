//! Dynamic values
//!
//! [`Value`] is the unit everything in the runtime traffics in: arguments,
//! return values, namespace slots and container elements.
//!
//! Lists and dicts are shared mutable containers: cloning a `Value` hands out
//! another reference to the same container, so a callee can mutate what its
//! caller passed in. [`Value::deep_copy`] is the way to get an independent copy.

use crate::callable::{CallArgs, CallResult, Callable};
use crate::class::ClassRef;
use crate::error::{CopyError, RaisedError};
use crate::namespace::NamespaceRef;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Keyword argument map (insertion-ordered, order-insensitive equality)
pub type Kwargs = IndexMap<String, Value>;

/// Build a [`Kwargs`] map from `(name, value)` pairs
pub fn kwargs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Kwargs
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A dynamic value
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(String),
    /// Shared mutable list
    List(List),
    /// Shared mutable string-keyed dict
    Dict(Dict),
    /// Callable object
    Callable(Callable),
    /// Class-like object
    Class(ClassRef),
    /// Module or scope namespace
    Namespace(NamespaceRef),
    /// Raised error used as a value
    Error(RaisedError),
    /// Host object with no structure the runtime can see into
    Opaque(Opaque),
}

impl Value {
    /// Build a list value
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(List::new(items.into_iter().collect()))
    }

    /// Build a dict value
    #[must_use]
    pub fn dict<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Dict(Dict::new(kwargs(pairs)))
    }

    /// Type name as reported in diagnostics
    #[must_use]
    pub fn type_name(&self) -> String {
        match self {
            Self::None => "NoneType".into(),
            Self::Bool(_) => "bool".into(),
            Self::Int(_) => "int".into(),
            Self::Float(_) => "float".into(),
            Self::Str(_) => "str".into(),
            Self::List(_) => "list".into(),
            Self::Dict(_) => "dict".into(),
            Self::Callable(_) => "function".into(),
            Self::Class(_) => "type".into(),
            Self::Namespace(ns) if ns.is_module() => "module".into(),
            Self::Namespace(_) => "namespace".into(),
            Self::Error(err) => err.kind().to_string(),
            Self::Opaque(o) => o.type_name().to_string(),
        }
    }

    /// Identity comparison
    ///
    /// Reference values (containers, callables, classes, namespaces, errors,
    /// opaque handles) are identical when they are the same object. `None` and
    /// booleans are singletons. Numbers and strings have no identity.
    #[must_use]
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::List(a), Self::List(b)) => a.ptr_eq(b),
            (Self::Dict(a), Self::Dict(b)) => a.ptr_eq(b),
            (Self::Callable(a), Self::Callable(b)) => a.ptr_eq(b),
            (Self::Class(a), Self::Class(b)) => class_addr(a) == class_addr(b),
            (Self::Namespace(a), Self::Namespace(b)) => Arc::ptr_eq(a, b),
            (Self::Error(a), Self::Error(b)) => a.same_instance(b),
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Address of the underlying object for reference values
    #[must_use]
    pub fn addr(&self) -> Option<usize> {
        match self {
            Self::List(l) => Some(l.addr()),
            Self::Dict(d) => Some(d.addr()),
            Self::Callable(c) => Some(c.addr()),
            Self::Class(c) => Some(class_addr(c)),
            Self::Namespace(ns) => Some(Arc::as_ptr(ns) as usize),
            Self::Opaque(o) => Some(o.addr()),
            _ => None,
        }
    }

    /// True for callables
    #[inline]
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self, Self::Callable(_))
    }

    /// True for `None`
    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Integer content
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float content (integers widen)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String content
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Callable content
    #[must_use]
    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Self::Callable(c) => Some(c),
            _ => None,
        }
    }

    /// Class content
    #[must_use]
    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Self::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Namespace content
    #[must_use]
    pub fn as_namespace(&self) -> Option<&NamespaceRef> {
        match self {
            Self::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    /// List content
    #[must_use]
    pub fn as_list(&self) -> Option<&List> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Dict content
    #[must_use]
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Self::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Error content
    #[must_use]
    pub fn as_error(&self) -> Option<&RaisedError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Attribute lookup on namespaces and classes
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        match self {
            Self::Namespace(ns) => ns.get(name),
            Self::Class(class) => class.get_member(name),
            _ => None,
        }
    }

    /// Invoke a callable value
    ///
    /// # Errors
    /// Raises `TypeError` if the value is not callable, otherwise whatever the
    /// callable raises.
    pub fn call(&self, args: &CallArgs) -> CallResult {
        match self {
            Self::Callable(c) => c.call(args),
            other => Err(RaisedError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    /// Independent copy of this value
    ///
    /// Lists and dicts are copied; shared and cyclic structure is preserved.
    /// Callables, classes and errors are shared. Nesting depth is bounded by
    /// memory, not by the call stack.
    ///
    /// # Errors
    /// Fails for opaque host objects and namespaces, anywhere in the structure.
    pub fn deep_copy(&self) -> Result<Value, CopyError> {
        let mut copier = DeepCopy::default();
        let root = copier.node(self)?;
        while let Some(task) = copier.pending.pop() {
            match task {
                CopyTask::List(from, to) => {
                    for item in from.to_vec() {
                        to.push(copier.node(&item)?);
                    }
                }
                CopyTask::Dict(from, to) => {
                    for (key, item) in from.entries() {
                        to.insert(key, copier.node(&item)?);
                    }
                }
            }
        }
        Ok(root)
    }
}

/// Container whose elements still have to be copied into its fresh twin
enum CopyTask {
    List(List, List),
    Dict(Dict, Dict),
}

#[derive(Default)]
struct DeepCopy {
    memo: HashMap<usize, Value>,
    pending: Vec<CopyTask>,
}

impl DeepCopy {
    /// Copy of one node; containers come back empty and are filled later
    fn node(&mut self, value: &Value) -> Result<Value, CopyError> {
        match value {
            Value::List(list) => Ok(self
                .memo
                .entry(list.addr())
                .or_insert_with(|| {
                    let copy = List::default();
                    self.pending.push(CopyTask::List(list.clone(), copy.clone()));
                    Value::List(copy)
                })
                .clone()),
            Value::Dict(dict) => Ok(self
                .memo
                .entry(dict.addr())
                .or_insert_with(|| {
                    let copy = Dict::default();
                    self.pending.push(CopyTask::Dict(dict.clone(), copy.clone()));
                    Value::Dict(copy)
                })
                .clone()),
            Value::Namespace(_) | Value::Opaque(_) => Err(CopyError::Unsupported(value.type_name())),
            other => Ok(other.clone()),
        }
    }
}

fn class_addr(class: &ClassRef) -> usize {
    Arc::as_ptr(class).cast::<()>() as usize
}

impl PartialEq for Value {
    /// Structural equality
    ///
    /// Walks nested containers with an explicit stack. A pair of containers
    /// met again while already being compared is taken as equal, so cyclic
    /// values terminate.
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self.clone(), other.clone())];
        let mut seen = HashSet::new();
        while let Some((a, b)) = pending.pop() {
            match (&a, &b) {
                (Value::List(x), Value::List(y)) => {
                    if x.ptr_eq(y) || !seen.insert((x.addr(), y.addr())) {
                        continue;
                    }
                    let (xs, ys) = (x.to_vec(), y.to_vec());
                    if xs.len() != ys.len() {
                        return false;
                    }
                    pending.extend(xs.into_iter().zip(ys));
                }
                (Value::Dict(x), Value::Dict(y)) => {
                    if x.ptr_eq(y) || !seen.insert((x.addr(), y.addr())) {
                        continue;
                    }
                    let (xs, ys) = (x.to_map(), y.to_map());
                    if xs.len() != ys.len() {
                        return false;
                    }
                    for (key, item) in xs {
                        let Some(theirs) = ys.get(&key) else {
                            return false;
                        };
                        pending.push((item, theirs.clone()));
                    }
                }
                _ => {
                    if !a.shallow_eq(&b) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl Value {
    #[allow(clippy::cast_precision_loss)]
    fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Error(a), Self::Error(b)) => a == b,
            _ => self.is_identical(other),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(l) => write!(f, "{l:?}"),
            Self::Dict(d) => write!(f, "{d:?}"),
            Self::Callable(c) => write!(f, "{c:?}"),
            Self::Class(c) => write!(f, "<class '{}'>", c.name()),
            Self::Namespace(ns) => write!(f, "<{} '{}'>", self.type_name(), ns.name()),
            Self::Error(e) => write!(f, "{e}"),
            Self::Opaque(o) => write!(f, "{o:?}"),
        }
    }
}

impl Debug for List {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

impl Debug for Dict {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

impl Debug for Opaque {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{} object>", self.type_name())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(List::new(items))
    }
}

impl From<List> for Value {
    fn from(l: List) -> Self {
        Self::List(l)
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Self::Dict(d)
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Self::Callable(c)
    }
}

impl From<ClassRef> for Value {
    fn from(c: ClassRef) -> Self {
        Self::Class(c)
    }
}

impl From<NamespaceRef> for Value {
    fn from(ns: NamespaceRef) -> Self {
        Self::Namespace(ns)
    }
}

impl From<RaisedError> for Value {
    fn from(e: RaisedError) -> Self {
        Self::Error(e)
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Self::Opaque(o)
    }
}

/// Shared mutable list
#[derive(Clone, Default)]
pub struct List(Arc<RwLock<Vec<Value>>>);

impl List {
    /// Create list from items
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }

    /// Snapshot of the elements
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.read().clone()
    }

    /// Element at index
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.read().get(index).cloned()
    }

    /// Append element
    pub fn push(&self, item: Value) {
        self.0.write().push(item);
    }

    /// Replace element at index, returning the previous one
    pub fn set(&self, index: usize, item: Value) -> Option<Value> {
        self.0
            .write()
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, item))
    }

    /// Remove every element
    pub fn clear(&self) {
        self.0.write().clear();
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Same underlying list
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

/// Releases the last owner's elements with an explicit stack
///
/// Dropping a deeply nested list or dict through the default drop glue would
/// recurse once per level.
impl Drop for List {
    fn drop(&mut self) {
        if Arc::strong_count(&self.0) == 1 {
            release(std::mem::take(&mut *self.0.write()));
        }
    }
}

/// Shared mutable dict with string keys
#[derive(Clone, Default)]
pub struct Dict(Arc<RwLock<Kwargs>>);

impl Drop for Dict {
    fn drop(&mut self) {
        if Arc::strong_count(&self.0) == 1 {
            let entries = std::mem::take(&mut *self.0.write());
            release(entries.into_values().collect());
        }
    }
}

/// Empty every container only reachable from `pending` before it is dropped
fn release(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::List(list) if Arc::strong_count(&list.0) == 1 => {
                pending.append(&mut list.0.write());
            }
            Value::Dict(dict) if Arc::strong_count(&dict.0) == 1 => {
                let entries = std::mem::take(&mut *dict.0.write());
                pending.extend(entries.into_values());
            }
            _ => {}
        }
    }
}

impl Dict {
    /// Create dict from a map
    #[must_use]
    pub fn new(entries: Kwargs) -> Self {
        Self(Arc::new(RwLock::new(entries)))
    }

    /// Value under key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.read().get(key).cloned()
    }

    /// Insert value, returning the previous one
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.write().insert(key.into(), value)
    }

    /// Remove key
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.write().shift_remove(key)
    }

    /// Snapshot of the entries in insertion order
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Snapshot as a map
    #[must_use]
    pub fn to_map(&self) -> Kwargs {
        self.0.read().clone()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Same underlying dict
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

/// Host object the runtime cannot look into
///
/// Opaque values compare by identity and cannot be deep-copied.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    /// Wrap a host object
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    /// Rust type name of the wrapped object
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the wrapped object
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Same underlying object
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner).cast::<()>() as usize
    }
}
