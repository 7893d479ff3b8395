//! # Arbor Bridge
//!
//! The dispatch side of the arbor JSON-RPC object bridge: registries of
//! exported classes, objects and opaque references, the overload resolver,
//! and the per-request invocation pipeline with pre/post/error callbacks
//! and context-argument injection.
//!
//! A bridge receives JSON-RPC requests (`{"method","id","params"}`),
//! resolves the target through its registries, trial-unmarshals arguments
//! to pick the best overload, invokes the method, and marshals the result
//! back, including fixup instructions (or flat-form hoisting) for shared
//! and cyclic object graphs. Every call returns a well-formed response
//! object; nothing escapes the `call` boundary.
//!
//! ```no_run
//! use std::sync::Arc;
//! use arbor_bridge::{Bridge, ExportedClass, MethodSpec, InvocationContext};
//! use arbor_serializer::{HostValue, TypeDesc};
//!
//! let bridge = Bridge::new();
//! let class = ExportedClass::builder("com.example.Test")
//!     .instance_method(MethodSpec::new(
//!         "echo",
//!         [TypeDesc::String],
//!         |_ctx, _instance, mut args| Ok(args.remove(0).value().cloned().unwrap_or(HostValue::Null)),
//!     ))
//!     .build();
//! bridge.register_object("test", HostValue::Null, class);
//!
//! let response = bridge.call_str(
//!     &InvocationContext::empty(),
//!     r#"{"method":"test.echo","id":1,"params":["hello"]}"#,
//! );
//! assert_eq!(response.to_json_string(None), r#"{"id":1,"result":"hello"}"#);
//! ```

pub mod bridge;
pub mod callback;
pub mod context;
pub mod error;
pub mod exported;
pub mod localarg;
pub mod reference;
mod resolve;

pub use bridge::{Bridge, BridgeBuilder};
pub use callback::{CallbackController, InvocationCallback};
pub use context::InvocationContext;
pub use error::{ExceptionTransformer, IdentityExceptionTransformer, InvokeError, InvokeResult};
pub use exported::{
    Arg, ExportedClass, ExportedClassBuilder, MethodKey, MethodSpec, ObjectInstance,
    CONSTRUCTOR_FLAG,
};
pub use localarg::{ContextArgRegistry, ContextArgResolver};
pub use reference::{ReferenceStore, DEFAULT_REFERENCE_CAPACITY};
