//! Contract builder.
//!
//! Builds an interface-kind type: type-level routing metadata, fields and
//! abstract operations whose positional parameter metadata is aligned 1:1
//! with the declared signature. Every configuration call surfaces
//! [`SynthesisError::FrozenType`] synchronously once the type is finalized.

use std::sync::Arc;

use crate::artifact::FrozenType;
use crate::definition::{Binding, OperationSpec, ParamSpec, RpcResultSpec, RpcServiceSpec, TypeRef};
use crate::descriptor::{FieldDef, OperationDef, OperationKey, TypeKind};
use crate::error::SynthesisError;
use crate::pool::{TypeHandle, TypePool};

/// Fluent builder over a pool-owned interface descriptor.
pub struct ContractBuilder {
    pool: Arc<TypePool>,
    handle: TypeHandle,
}

impl ContractBuilder {
    /// Resolve or create the named contract in the pool.
    pub fn new(pool: Arc<TypePool>, name: &str) -> Result<Self, SynthesisError> {
        let handle = pool.resolve_or_create(name, TypeKind::Interface)?;
        Ok(Self { pool, handle })
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Borrow the underlying handle, e.g. for supertype linking.
    pub fn handle(&self) -> &TypeHandle {
        &self.handle
    }

    /// Set the type-level base path; repeat calls replace the previous value.
    pub fn base_path(&mut self, path: impl Into<String>) -> Result<&mut Self, SynthesisError> {
        self.handle.with(|desc| desc.set_base_path(path))?;
        Ok(self)
    }

    /// Set the type-level produced media types; an empty list falls back to
    /// `*/*`.
    pub fn produces<I, S>(&mut self, types: I) -> Result<&mut Self, SynthesisError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handle.with(|desc| desc.set_produces(types))?;
        Ok(self)
    }

    /// Attach the opaque type-level binding token.
    pub fn bind(&mut self, binding: Binding) -> Result<&mut Self, SynthesisError> {
        self.handle.with(|desc| desc.set_binding(binding))?;
        Ok(self)
    }

    /// Attach RPC service identity to the contract.
    pub fn rpc_service(&mut self, service: RpcServiceSpec) -> Result<&mut Self, SynthesisError> {
        self.handle.with(|desc| desc.set_rpc_service(service))?;
        Ok(self)
    }

    pub fn field(
        &mut self,
        ty: TypeRef,
        name: impl Into<String>,
        initial_value: Option<String>,
    ) -> Result<&mut Self, SynthesisError> {
        self.handle.with(|desc| {
            desc.add_field(FieldDef {
                ty,
                name: name.into(),
                initial_value,
            })
        })?;
        Ok(self)
    }

    pub fn remove_field(&mut self, name: &str) -> Result<&mut Self, SynthesisError> {
        self.handle.with(|desc| desc.remove_field(name))?;
        Ok(self)
    }

    /// Declare an abstract operation. The signature is derived from the
    /// positional parameter metadata, so the two can never drift apart.
    /// Re-declaring an existing `(name, signature)` key replaces the previous
    /// definition entirely.
    pub fn declare_operation(
        &mut self,
        returns: Option<TypeRef>,
        spec: OperationSpec,
        binding: Option<Binding>,
        params: Vec<ParamSpec>,
    ) -> Result<&mut Self, SynthesisError> {
        self.put(returns, spec, binding, None, params)
    }

    /// RPC variant carrying return-value naming.
    pub fn declare_rpc_operation(
        &mut self,
        returns: Option<TypeRef>,
        spec: OperationSpec,
        binding: Option<Binding>,
        result: Option<RpcResultSpec>,
        params: Vec<ParamSpec>,
    ) -> Result<&mut Self, SynthesisError> {
        self.put(returns, spec, binding, result, params)
    }

    fn put(
        &mut self,
        returns: Option<TypeRef>,
        spec: OperationSpec,
        binding: Option<Binding>,
        result: Option<RpcResultSpec>,
        params: Vec<ParamSpec>,
    ) -> Result<&mut Self, SynthesisError> {
        let signature: Vec<TypeRef> = params.iter().map(|p| p.ty.clone()).collect();
        tracing::debug!(
            type_name = %self.handle.name(),
            operation = %spec.name,
            arity = signature.len(),
            "declaring operation"
        );
        self.handle.with(|desc| {
            desc.put_operation(OperationDef {
                key: OperationKey::new(spec.name.clone(), signature),
                returns,
                spec,
                binding,
                params,
                result,
                is_abstract: true,
            })
        })?;
        Ok(self)
    }

    pub fn remove_operation(
        &mut self,
        name: &str,
        signature: &[TypeRef],
    ) -> Result<&mut Self, SynthesisError> {
        let key = OperationKey::new(name, signature.to_vec());
        self.handle.with(|desc| desc.remove_operation(&key))?;
        Ok(self)
    }

    /// Finalize the contract through the pool. Further mutation through this
    /// builder fails with [`SynthesisError::FrozenType`].
    pub fn build(&self) -> Result<Arc<FrozenType>, SynthesisError> {
        self.pool.finalize(&self.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn builder(pool: &Arc<TypePool>) -> ContractBuilder {
        ContractBuilder::new(Arc::clone(pool), "demo.SampleApi").expect("contract")
    }

    #[test]
    fn type_level_metadata_round_trips_verbatim() {
        let pool = Arc::new(TypePool::new());
        let mut contract = builder(&pool);
        contract
            .base_path("/sample")
            .unwrap()
            .produces(["application/json"])
            .unwrap()
            .bind(Binding::new("ID01201"))
            .unwrap();

        let frozen = contract.build().unwrap();
        let meta = frozen.metadata();
        assert_eq!(meta.base_path.as_deref(), Some("/sample"));
        assert_eq!(
            meta.produces.as_deref(),
            Some(&["application/json".to_owned()][..])
        );
        assert_eq!(meta.binding.as_ref().map(|b| b.uid.as_str()), Some("ID01201"));
    }

    #[test]
    fn parameter_metadata_stays_positionally_aligned() {
        let pool = Arc::new(TypePool::new());
        let mut contract = builder(&pool);
        contract
            .declare_operation(
                Some(TypeRef::String),
                OperationSpec::http(Method::GET, "find", "/{id}"),
                None,
                vec![
                    ParamSpec::path(TypeRef::String, "id"),
                    ParamSpec::query(TypeRef::Int, "depth").with_default("1"),
                ],
            )
            .unwrap();

        let frozen = contract.build().unwrap();
        let op = frozen
            .operation("find", &[TypeRef::String, TypeRef::Int])
            .expect("operation");
        assert_eq!(op.params.len(), op.key.signature.len());
        assert_eq!(op.params[0].name, "id");
        assert_eq!(op.params[1].default_value.as_deref(), Some("1"));
        assert!(op.is_abstract);
    }

    #[test]
    fn redeclaration_is_last_write_wins() {
        let pool = Arc::new(TypePool::new());
        let mut contract = builder(&pool);
        let spec = OperationSpec::http(Method::GET, "fetch", "/a");
        contract
            .declare_operation(Some(TypeRef::Int), spec.clone(), None, vec![])
            .unwrap();
        contract
            .declare_operation(
                Some(TypeRef::Int),
                spec.with_produces(["text/plain"]),
                Some(Binding::new("B-2")),
                vec![],
            )
            .unwrap();

        let frozen = contract.build().unwrap();
        assert_eq!(frozen.operations().len(), 1);
        let op = frozen.operation("fetch", &[]).expect("operation");
        assert_eq!(op.spec.produces, vec!["text/plain"]);
        assert_eq!(op.binding.as_ref().map(|b| b.uid.as_str()), Some("B-2"));
    }

    #[test]
    fn mutation_after_build_fails() {
        let pool = Arc::new(TypePool::new());
        let mut contract = builder(&pool);
        contract.build().unwrap();
        assert!(matches!(
            contract.base_path("/late"),
            Err(SynthesisError::FrozenType { .. })
        ));
    }
}
