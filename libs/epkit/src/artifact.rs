//! Frozen, loadable artifacts.
//!
//! [`FrozenType`] is the immutable snapshot a finalized descriptor becomes; it
//! carries the full metadata side-table and round-trips losslessly through
//! JSON bytes, so a hosting router can persist and reload it. [`LoadedType`]
//! pairs a concrete implementation shape with its contract and is the entry
//! point for constructing bound service instances.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::definition::TypeRef;
use crate::descriptor::{
    CtorDef, FieldDef, OperationDef, TypeDescriptor, TypeKind, TypeMetadata,
};
use crate::dispatch::{EndpointBase, InvocationHandler, ServiceInstance};
use crate::error::SynthesisError;

/// Immutable snapshot of a finalized type.
///
/// Everything declared on the working descriptor is observable here: fields,
/// constructors, insertion-ordered operations with positional parameter
/// metadata, and the type-level routing metadata, all exactly as declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenType {
    name: String,
    kind: TypeKind,
    supertype: Option<String>,
    fields: Vec<FieldDef>,
    constructors: Vec<CtorDef>,
    operations: Vec<OperationDef>,
    metadata: TypeMetadata,
}

impl FrozenType {
    pub(crate) fn from_descriptor(desc: TypeDescriptor) -> Self {
        Self {
            name: desc.name,
            kind: desc.kind,
            supertype: desc.supertype,
            fields: desc.fields,
            constructors: desc.constructors,
            operations: desc.operations,
            metadata: desc.metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn supertype(&self) -> Option<&str> {
        self.supertype.as_deref()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn constructors(&self) -> &[CtorDef] {
        &self.constructors
    }

    pub fn has_constructor(&self, ctor: &CtorDef) -> bool {
        self.constructors.iter().any(|c| c == ctor)
    }

    /// Operations in declaration order.
    pub fn operations(&self) -> &[OperationDef] {
        &self.operations
    }

    /// Exact lookup by name and positional signature.
    pub fn operation(&self, name: &str, signature: &[TypeRef]) -> Option<&OperationDef> {
        self.operations
            .iter()
            .find(|o| o.key.name == name && o.key.signature == signature)
    }

    /// Like [`FrozenType::operation`], but absence is an error. Useful for
    /// hosting routers that treat a missing declaration as a wiring bug.
    pub fn require_operation(
        &self,
        name: &str,
        signature: &[TypeRef],
    ) -> Result<&OperationDef, SynthesisError> {
        self.operation(name, signature)
            .ok_or_else(|| SynthesisError::UnknownMember {
                name: self.name.clone(),
                member: name.to_owned(),
            })
    }

    pub fn metadata(&self) -> &TypeMetadata {
        &self.metadata
    }

    /// Serialize the artifact to its persistable byte form (JSON).
    pub fn to_bytes(&self) -> Result<Vec<u8>, SynthesisError> {
        serde_json::to_vec_pretty(self).map_err(|source| SynthesisError::Serialization {
            name: self.name.clone(),
            source,
        })
    }

    /// Reload an artifact previously written by [`FrozenType::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SynthesisError> {
        serde_json::from_slice(bytes).map_err(|source| SynthesisError::Serialization {
            name: "<artifact>".to_owned(),
            source,
        })
    }
}

/// A linked implementation/contract pair, ready for instantiation.
#[derive(Debug, Clone)]
pub struct LoadedType {
    class: Arc<FrozenType>,
    contract: Arc<FrozenType>,
}

impl LoadedType {
    pub(crate) fn new(class: Arc<FrozenType>, contract: Arc<FrozenType>) -> Self {
        Self { class, contract }
    }

    /// The concrete implementation shape.
    pub fn class(&self) -> &Arc<FrozenType> {
        &self.class
    }

    /// The contract the implementation links against.
    pub fn contract(&self) -> &Arc<FrozenType> {
        &self.contract
    }

    /// Construct a service instance, optionally bound to a handler.
    ///
    /// The implementation type must carry a constructor matching the chosen
    /// shape: the handler-injecting one when a handler is supplied, the
    /// default one otherwise.
    pub fn instance(
        &self,
        handler: Option<Arc<dyn InvocationHandler>>,
    ) -> Result<ServiceInstance, SynthesisError> {
        let required = if handler.is_some() {
            CtorDef::handler_ctor()
        } else {
            CtorDef::default_ctor()
        };
        if !self.class.has_constructor(&required) {
            return Err(SynthesisError::Construction {
                name: self.class.name().to_owned(),
                reason: format!(
                    "no constructor taking {} argument(s)",
                    required.params.len()
                ),
            });
        }
        Ok(ServiceInstance::new(
            Arc::clone(&self.class),
            Arc::clone(&self.contract),
            EndpointBase::new(handler),
        ))
    }
}
