//! Generic call dispatch.
//!
//! Every synthesized operation shares one body: resolve the declared
//! operation, forward to the attached [`InvocationHandler`] when present, and
//! coerce the result to the declared return type. Without a handler the
//! operation yields the return type's default value and nothing is invoked.
//! Handler failures are logged and re-raised with the source preserved; they
//! are never masked as a successful null result.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::artifact::FrozenType;
use crate::definition::TypeRef;
use crate::error::DispatchError;

/// The generic invocation capability a service instance forwards to.
///
/// `target` is the instance the call arrived on, `method` identifies the
/// resolved operation, and `args` are the positional arguments in signature
/// order.
pub trait InvocationHandler: Send + Sync {
    fn invoke(
        &self,
        target: &ServiceInstance,
        method: &MethodIdentity,
        args: &[Value],
    ) -> anyhow::Result<Value>;
}

/// Reflective identity of a resolved operation, handed to the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodIdentity {
    pub type_name: String,
    pub name: String,
    pub signature: Vec<TypeRef>,
    pub returns: Option<TypeRef>,
}

/// The runtime base value every service instance embeds: the optional handler
/// slot and its accessor.
#[derive(Clone, Default)]
pub struct EndpointBase {
    handler: Option<Arc<dyn InvocationHandler>>,
}

impl EndpointBase {
    pub fn new(handler: Option<Arc<dyn InvocationHandler>>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> Option<&Arc<dyn InvocationHandler>> {
        self.handler.as_ref()
    }
}

impl fmt::Debug for EndpointBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointBase")
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// A constructed instance of a synthesized type: the frozen implementation
/// shape, the contract it links against, and the embedded base value.
#[derive(Clone)]
pub struct ServiceInstance {
    class: Arc<FrozenType>,
    contract: Arc<FrozenType>,
    base: EndpointBase,
}

impl ServiceInstance {
    pub(crate) fn new(
        class: Arc<FrozenType>,
        contract: Arc<FrozenType>,
        base: EndpointBase,
    ) -> Self {
        Self {
            class,
            contract,
            base,
        }
    }

    pub fn class(&self) -> &Arc<FrozenType> {
        &self.class
    }

    pub fn contract(&self) -> &Arc<FrozenType> {
        &self.contract
    }

    pub fn handler(&self) -> Option<&Arc<dyn InvocationHandler>> {
        self.base.handler()
    }

    /// Invoke an operation by name, resolving the overload from the supplied
    /// arguments: name first, then arity, then per-slot value compatibility,
    /// first declared match wins.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, DispatchError> {
        let by_name: Vec<_> = self
            .class
            .operations()
            .iter()
            .filter(|o| o.key.name == name)
            .collect();
        if by_name.is_empty() {
            return Err(DispatchError::UnknownMethod {
                type_name: self.class.name().to_owned(),
                method: name.to_owned(),
            });
        }

        let by_arity: Vec<_> = by_name
            .iter()
            .filter(|o| o.key.signature.len() == args.len())
            .copied()
            .collect();
        if by_arity.is_empty() {
            return Err(DispatchError::Arity {
                method: name.to_owned(),
                expected: by_name[0].key.signature.len(),
                actual: args.len(),
            });
        }

        let resolved = by_arity
            .iter()
            .find(|o| {
                o.key
                    .signature
                    .iter()
                    .zip(args)
                    .all(|(ty, value)| ty.accepts(value))
            })
            .copied()
            .ok_or_else(|| DispatchError::UnknownMethod {
                type_name: self.class.name().to_owned(),
                method: name.to_owned(),
            })?;

        self.dispatch(&resolved.key.name, &resolved.key.signature, resolved.returns.clone(), args)
    }

    /// Invoke an operation by its exact `(name, signature)` key, bypassing
    /// overload resolution.
    pub fn call_typed(
        &self,
        name: &str,
        signature: &[TypeRef],
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let op = self.class.operation(name, signature).ok_or_else(|| {
            DispatchError::UnknownMethod {
                type_name: self.class.name().to_owned(),
                method: name.to_owned(),
            }
        })?;
        if args.len() != signature.len() {
            return Err(DispatchError::Arity {
                method: name.to_owned(),
                expected: signature.len(),
                actual: args.len(),
            });
        }
        self.dispatch(name, signature, op.returns.clone(), args)
    }

    fn dispatch(
        &self,
        name: &str,
        signature: &[TypeRef],
        returns: Option<TypeRef>,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let Some(handler) = self.base.handler() else {
            return Ok(returns
                .as_ref()
                .map(TypeRef::default_value)
                .unwrap_or(Value::Null));
        };

        let identity = MethodIdentity {
            type_name: self.class.name().to_owned(),
            name: name.to_owned(),
            signature: signature.to_vec(),
            returns: returns.clone(),
        };

        let value = handler.invoke(self, &identity, args).map_err(|source| {
            tracing::error!(
                type_name = %self.class.name(),
                method = %name,
                error = %source,
                "invocation handler failed"
            );
            DispatchError::Handler {
                method: name.to_owned(),
                source,
            }
        })?;

        match returns {
            None => Ok(Value::Null),
            Some(expected) if expected.accepts(&value) => Ok(value),
            Some(expected) => {
                tracing::error!(
                    type_name = %self.class.name(),
                    method = %name,
                    expected = %expected,
                    "handler result incompatible with declared return type"
                );
                Err(DispatchError::ReturnType {
                    method: name.to_owned(),
                    expected,
                })
            }
        }
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("class", &self.class.name())
            .field("contract", &self.contract.name())
            .field("base", &self.base)
            .finish()
    }
}
