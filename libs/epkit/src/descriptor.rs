//! Working type descriptors.
//!
//! A [`TypeDescriptor`] is the mutable, in-pool representation of a type under
//! construction. Builders mutate it through a pool handle; finalization drains
//! it into an immutable [`crate::artifact::FrozenType`] snapshot and the
//! working memory is reclaimed.

use serde::{Deserialize, Serialize};

use crate::definition::{
    normalize_media_types, Binding, OperationSpec, ParamSpec, RpcResultSpec, RpcServiceSpec,
    TypeRef,
};
use crate::error::SynthesisError;

/// Whether a descriptor names a concrete class-like type or an abstract
/// interface-like contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeKind::Class => f.write_str("class"),
            TypeKind::Interface => f.write_str("interface"),
        }
    }
}

/// A declared field. The initial value is kept as a source-level literal and
/// never evaluated by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<String>,
}

/// Constructor parameter vocabulary. The only injectable capability today is
/// the invocation handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtorParam {
    Handler,
}

/// A constructor shape, identified by its ordered parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtorDef {
    pub params: Vec<CtorParam>,
}

impl CtorDef {
    /// The zero-argument constructor.
    pub fn default_ctor() -> Self {
        Self { params: Vec::new() }
    }

    /// The handler-injecting constructor synthesized at instantiation time.
    pub fn handler_ctor() -> Self {
        Self {
            params: vec![CtorParam::Handler],
        }
    }
}

/// Uniqueness key for an operation: declared name plus positional signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    pub name: String,
    pub signature: Vec<TypeRef>,
}

impl OperationKey {
    pub fn new(name: impl Into<String>, signature: Vec<TypeRef>) -> Self {
        Self {
            name: name.into(),
            signature,
        }
    }
}

/// A declared operation with its full metadata side-table: routing spec,
/// optional binding, positional parameter metadata (always 1:1 with the
/// signature) and the optional RPC result naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDef {
    pub key: OperationKey,
    /// `None` means the operation returns nothing.
    pub returns: Option<TypeRef>,
    pub spec: OperationSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<Binding>,
    pub params: Vec<ParamSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<RpcResultSpec>,
    pub is_abstract: bool,
}

/// Type-level routing metadata, emitted verbatim into the frozen artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produces: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_service: Option<RpcServiceSpec>,
}

/// Lifecycle of a working descriptor. Transitions are one-directional; any
/// mutation after `Open` fails with [`SynthesisError::FrozenType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorState {
    #[default]
    Open,
    Finalized,
    Released,
}

/// The mutable description of a type under construction.
///
/// Member mutation follows absorb-or-fail rules: re-adding an identical member
/// is a no-op, removing an absent member is a no-op, and re-declaring an
/// operation under an existing `(name, signature)` key replaces the previous
/// definition. Only a same-name member with a different shape is an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    pub supertype: Option<String>,
    pub fields: Vec<FieldDef>,
    pub constructors: Vec<CtorDef>,
    /// Insertion-ordered; order is observable through the frozen artifact and
    /// drives overload resolution at dispatch time.
    pub operations: Vec<OperationDef>,
    pub metadata: TypeMetadata,
    pub state: DescriptorState,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    fn ensure_open(&self) -> Result<(), SynthesisError> {
        match self.state {
            DescriptorState::Open => Ok(()),
            DescriptorState::Finalized | DescriptorState::Released => {
                Err(SynthesisError::FrozenType {
                    name: self.name.clone(),
                })
            }
        }
    }

    pub fn set_supertype(&mut self, name: impl Into<String>) -> Result<(), SynthesisError> {
        self.ensure_open()?;
        self.supertype = Some(name.into());
        Ok(())
    }

    pub fn set_base_path(&mut self, path: impl Into<String>) -> Result<(), SynthesisError> {
        self.ensure_open()?;
        self.metadata.base_path = Some(path.into());
        Ok(())
    }

    pub fn set_produces<I, S>(&mut self, types: I) -> Result<(), SynthesisError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_open()?;
        self.metadata.produces = Some(normalize_media_types(types));
        Ok(())
    }

    pub fn set_binding(&mut self, binding: Binding) -> Result<(), SynthesisError> {
        self.ensure_open()?;
        self.metadata.binding = Some(binding);
        Ok(())
    }

    pub fn set_rpc_service(&mut self, service: RpcServiceSpec) -> Result<(), SynthesisError> {
        self.ensure_open()?;
        self.metadata.rpc_service = Some(service);
        Ok(())
    }

    /// Add a field. Identical re-adds are absorbed; a same-name field with a
    /// different type or initial value is a `DuplicateMember` error.
    pub fn add_field(&mut self, field: FieldDef) -> Result<(), SynthesisError> {
        self.ensure_open()?;
        match self.fields.iter().find(|f| f.name == field.name) {
            Some(existing) if *existing == field => Ok(()),
            Some(_) => Err(SynthesisError::DuplicateMember {
                name: self.name.clone(),
                member: field.name,
            }),
            None => {
                self.fields.push(field);
                Ok(())
            }
        }
    }

    /// Remove a field by name; absent fields are a no-op.
    pub fn remove_field(&mut self, name: &str) -> Result<(), SynthesisError> {
        self.ensure_open()?;
        self.fields.retain(|f| f.name != name);
        Ok(())
    }

    /// Declare or re-declare an operation. The `(name, signature)` key is
    /// unique; a re-declaration replaces the previous definition in place,
    /// keeping its position in the declaration order.
    pub fn put_operation(&mut self, op: OperationDef) -> Result<(), SynthesisError> {
        self.ensure_open()?;
        debug_assert_eq!(op.key.signature.len(), op.params.len());
        match self.operations.iter_mut().find(|o| o.key == op.key) {
            Some(slot) => *slot = op,
            None => self.operations.push(op),
        }
        Ok(())
    }

    /// Remove an operation by its key; absent operations are a no-op.
    pub fn remove_operation(&mut self, key: &OperationKey) -> Result<(), SynthesisError> {
        self.ensure_open()?;
        self.operations.retain(|o| o.key != *key);
        Ok(())
    }

    /// Add a constructor. Identical re-adds are absorbed; a different
    /// constructor with the same arity conflicts.
    pub fn add_constructor(&mut self, ctor: CtorDef) -> Result<(), SynthesisError> {
        self.ensure_open()?;
        match self
            .constructors
            .iter()
            .find(|c| c.params.len() == ctor.params.len())
        {
            Some(existing) if *existing == ctor => Ok(()),
            Some(_) => Err(SynthesisError::DuplicateMember {
                name: self.name.clone(),
                member: format!("<init>/{}", ctor.params.len()),
            }),
            None => {
                self.constructors.push(ctor);
                Ok(())
            }
        }
    }

    pub fn has_constructor(&self, ctor: &CtorDef) -> bool {
        self.constructors.iter().any(|c| c == ctor)
    }

    /// Take the descriptor's contents for snapshotting, leaving a tombstone
    /// that keeps the name and kind but rejects further mutation with the
    /// given terminal state.
    pub(crate) fn drain(&mut self, next: DescriptorState) -> TypeDescriptor {
        let taken = std::mem::take(self);
        self.name.clone_from(&taken.name);
        self.kind = taken.kind;
        self.state = next;
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn sample_field() -> FieldDef {
        FieldDef {
            ty: TypeRef::String,
            name: "uid".to_owned(),
            initial_value: Some("\"ID01201\"".to_owned()),
        }
    }

    fn sample_op(name: &str) -> OperationDef {
        OperationDef {
            key: OperationKey::new(name, vec![TypeRef::String]),
            returns: Some(TypeRef::String),
            spec: OperationSpec::http(Method::GET, name, "/{id}/info"),
            binding: None,
            params: vec![ParamSpec::path(TypeRef::String, "id")],
            result: None,
            is_abstract: true,
        }
    }

    #[test]
    fn identical_field_re_add_is_a_no_op() {
        let mut desc = TypeDescriptor::new("demo.Api", TypeKind::Interface);
        desc.add_field(sample_field()).unwrap();
        desc.add_field(sample_field()).unwrap();
        assert_eq!(desc.fields.len(), 1);
    }

    #[test]
    fn conflicting_field_shape_is_rejected() {
        let mut desc = TypeDescriptor::new("demo.Api", TypeKind::Interface);
        desc.add_field(sample_field()).unwrap();
        let conflicting = FieldDef {
            ty: TypeRef::Int,
            ..sample_field()
        };
        assert!(matches!(
            desc.add_field(conflicting),
            Err(SynthesisError::DuplicateMember { .. })
        ));
    }

    #[test]
    fn removing_absent_members_is_a_no_op() {
        let mut desc = TypeDescriptor::new("demo.Api", TypeKind::Interface);
        desc.remove_field("missing").unwrap();
        desc.remove_operation(&OperationKey::new("missing", vec![]))
            .unwrap();
        assert!(desc.fields.is_empty());
        assert!(desc.operations.is_empty());
    }

    #[test]
    fn redeclaring_an_operation_replaces_in_place() {
        let mut desc = TypeDescriptor::new("demo.Api", TypeKind::Interface);
        desc.put_operation(sample_op("first")).unwrap();
        desc.put_operation(sample_op("second")).unwrap();

        let mut replacement = sample_op("first");
        replacement.returns = Some(TypeRef::Int);
        desc.put_operation(replacement).unwrap();

        assert_eq!(desc.operations.len(), 2);
        assert_eq!(desc.operations[0].key.name, "first");
        assert_eq!(desc.operations[0].returns, Some(TypeRef::Int));
    }

    #[test]
    fn mutation_after_drain_fails_frozen() {
        let mut desc = TypeDescriptor::new("demo.Api", TypeKind::Interface);
        desc.put_operation(sample_op("op")).unwrap();
        let taken = desc.drain(DescriptorState::Finalized);
        assert_eq!(taken.operations.len(), 1);
        assert_eq!(desc.name, "demo.Api");
        assert!(matches!(
            desc.add_field(sample_field()),
            Err(SynthesisError::FrozenType { .. })
        ));
    }

    #[test]
    fn constructor_arity_conflicts_are_rejected() {
        let mut desc = TypeDescriptor::new("demo.Impl", TypeKind::Class);
        desc.add_constructor(CtorDef::handler_ctor()).unwrap();
        desc.add_constructor(CtorDef::handler_ctor()).unwrap();
        assert_eq!(desc.constructors.len(), 1);
        assert!(desc.has_constructor(&CtorDef::handler_ctor()));
    }
}
