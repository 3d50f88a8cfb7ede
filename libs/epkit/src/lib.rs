//! # epkit - Runtime Endpoint Synthesis
//!
//! Build typed service contracts at runtime from declarative descriptions and
//! wire them to a single generic invocation handler.
//!
//! ## Features
//!
//! - **Declarative**: describe operations, parameters and routing metadata as
//!   plain values; no code generation step
//! - **Pooled**: types are synthesized through an explicitly owned
//!   [`TypePool`]; resolving a name twice yields the same working descriptor
//! - **Frozen artifacts**: finalization produces immutable, serializable
//!   [`FrozenType`] snapshots a hosting router can introspect and persist
//! - **Generic dispatch**: every synthesized operation forwards to one
//!   [`InvocationHandler`]; unbound instances answer with declared defaults
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use epkit::{
//!     Binding, ImplementationBuilder, InvocationHandler, MethodIdentity, OperationSpec,
//!     ParamSpec, ServiceInstance, TypePool, TypeRef,
//! };
//! use serde_json::{json, Value};
//!
//! struct Echo;
//!
//! impl InvocationHandler for Echo {
//!     fn invoke(
//!         &self,
//!         _target: &ServiceInstance,
//!         method: &MethodIdentity,
//!         args: &[Value],
//!     ) -> anyhow::Result<Value> {
//!         Ok(json!(format!("{}({args:?})", method.name)))
//!     }
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! let pool = Arc::new(TypePool::new());
//! let mut builder = ImplementationBuilder::new(pool, "demo.GreeterApi")?;
//! builder
//!     .base_path("/greeter")?
//!     .produces(["application/json"])?
//!     .bind(Binding::new("ID01201"))?
//!     .declare_operation(
//!         Some(TypeRef::String),
//!         OperationSpec::http(http::Method::GET, "greet", "/{name}"),
//!         None,
//!         vec![ParamSpec::path(TypeRef::String, "name")],
//!     )?;
//!
//! let instance = builder.instantiate(Arc::new(Echo))?;
//! let reply = instance.call("greet", &[json!("world")])?;
//! assert!(reply.as_str().is_some());
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod contract;
pub mod definition;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod implement;
pub mod pool;

pub use artifact::{FrozenType, LoadedType};
pub use contract::ContractBuilder;
pub use definition::{
    Binding, Direction, OperationKind, OperationSpec, ParamSource, ParamSpec, RpcParamSpec,
    RpcResultSpec, RpcServiceSpec, TypeRef, WILDCARD_MEDIA_TYPE,
};
pub use descriptor::{
    CtorDef, CtorParam, FieldDef, OperationDef, OperationKey, TypeDescriptor, TypeKind,
    TypeMetadata,
};
pub use dispatch::{EndpointBase, InvocationHandler, MethodIdentity, ServiceInstance};
pub use error::{DispatchError, SynthesisError};
pub use implement::{ImplementationBuilder, IMPL_SUFFIX};
pub use pool::{TypeHandle, TypePool, RUNTIME_BASE};
