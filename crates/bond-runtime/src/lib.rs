//! Bond Runtime
//!
//! The dynamic host model that bond instruments.
//!
//! # Overview
//!
//! - **Value**: dynamic values with shared mutable containers and identity
//! - **Callable**: named bodies with declared [`Signature`]s (or none, for natives)
//! - **ClassLike**: capability interface for class-like objects
//! - **Namespace**: module and scope slot tables
//! - **Runtime**: loaded-module registry implementing [`HeapIntrospection`]
//!
//! # Example
//!
//! ```rust
//! use bond_runtime::{Callable, HeapIntrospection, Runtime, Signature, Value};
//!
//! let runtime = Runtime::new();
//! let module = runtime.define_module("greetings").unwrap();
//!
//! let hello = Callable::builder("hello")
//!     .module("greetings")
//!     .signature(Signature::new().positional("name"))
//!     .body(|call| Ok(Value::from(format!("hello {:?}", call.args[0]))));
//! module.set("hello", hello.clone());
//!
//! // Every module slot bound to `hello` is visible to a reference walk
//! let referrers = runtime.referrers(&Value::Callable(hello));
//! assert_eq!(referrers.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod callable;
pub mod class;
pub mod error;
pub mod heap;
pub mod namespace;
pub mod signature;
pub mod value;

// Re-exports
pub use callable::{CallArgs, CallResult, Callable, CallableBuilder, Extension};
pub use class::{ClassBuilder, ClassLike, ClassObject, ClassRef};
pub use error::{CopyError, RaisedError, RuntimeError};
pub use heap::{HeapIntrospection, Referrer, Runtime, RUNTIME_LOADER};
pub use namespace::{ModuleMetadata, Namespace, NamespaceRef};
pub use signature::{Param, ParamKind, Signature};
pub use value::{kwargs, Dict, Kwargs, List, Opaque, Value};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building runtime objects
    pub use crate::{
        kwargs, CallArgs, CallResult, Callable, ClassLike, ClassObject, ClassRef,
        HeapIntrospection, Namespace, NamespaceRef, RaisedError, Runtime, Signature, Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
