//! Bond Core
//!
//! Scoped call-recording stubs and spies over a live namespace graph.
//!
//! # Overview
//!
//! - **Signature Comparator**: decides whether a replacement can stand in for an original
//! - **Call Recorder**: wraps a callable so every invocation is recorded
//! - **Reference Patcher**: installs a proxy at every module slot bound to the original
//! - **Instrumentation Policy**: validates per target kind and builds the proxy
//! - **Session**: scoped installation with rollback on every exit path
//!
//! # Example
//!
//! ```rust
//! use bond_core::{calls, stub, StubTarget};
//! use bond_runtime::{Callable, Runtime, Signature, Value};
//!
//! let runtime = Runtime::new();
//! let net = runtime.define_module("net").unwrap();
//! net.set(
//!     "fetch",
//!     Callable::builder("fetch")
//!         .module("net")
//!         .signature(Signature::new().positional("url"))
//!         .body(|_| Ok(Value::from("real response"))),
//! );
//!
//! let fake = Callable::builder("fake_fetch")
//!     .signature(Signature::new().positional("url"))
//!     .body(|_| Ok(Value::from("canned response")));
//!
//! let session = stub(&runtime, [StubTarget::new((&net, "fetch"), fake)]).unwrap();
//! let fetch = net.get("fetch").unwrap();
//! assert_eq!(fetch.call(&bond_runtime::CallArgs::positional([Value::from("x")])).unwrap(), Value::from("canned response"));
//! assert_eq!(calls(&fetch).unwrap().len(), 1);
//! drop(session);
//!
//! let fetch = net.get("fetch").unwrap();
//! assert!(calls(&fetch).is_err());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod patcher;
pub mod policy;
pub mod recorder;
pub mod session;
pub mod signature;

// Re-exports
pub use config::{BondConfig, SnapshotPolicy};
pub use error::BondError;
pub use patcher::{BindingSite, ReferencePatcher, UndoAction, UndoLog};
pub use policy::{Advisory, InstrumentationPolicy, Instrumented};
pub use recorder::{
    call_log, calls, is_instrumented, original_of, wrap, wrap_replacing, CallLog, CallOutcome,
    InvocationRecord,
};
pub use session::{spy, stub, with_spy, with_stub, Bond, Session, StubTarget, Target};
pub use signature::{
    DeclaredSignatures, DescriptorSource, NativeSignatureTable, SignatureComparator,
    SignatureDescriptor,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for writing instrumented tests
    pub use crate::{
        calls, spy, stub, with_spy, with_stub, Bond, BondConfig, BondError, InvocationRecord,
        Session, StubTarget, Target,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
