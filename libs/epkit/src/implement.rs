//! Implementation builder.
//!
//! Wraps a [`ContractBuilder`] and a concrete class-kind descriptor named
//! `{contract}$Impl`. The implementation starts out extending the runtime
//! base type; at build time the contract is finalized first and the
//! implementation's supertype is re-wired to it before its own finalization.
//! Construction follows a one-way path: `build` → `materialize` →
//! `instantiate`.

use std::sync::Arc;

use crate::artifact::LoadedType;
use crate::contract::ContractBuilder;
use crate::definition::{Binding, OperationSpec, ParamSpec, RpcResultSpec, RpcServiceSpec, TypeRef};
use crate::descriptor::{CtorDef, OperationDef, OperationKey, TypeKind};
use crate::dispatch::{InvocationHandler, ServiceInstance};
use crate::error::SynthesisError;
use crate::pool::{TypeHandle, TypePool, RUNTIME_BASE};

/// Suffix appended to the contract name to form the implementation type name.
pub const IMPL_SUFFIX: &str = "$Impl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    Open,
    Linked,
    Finalized,
}

/// Builder for a concrete implementation type bound to its contract.
pub struct ImplementationBuilder {
    pool: Arc<TypePool>,
    contract: ContractBuilder,
    handle: TypeHandle,
    state: BuildState,
    linked: Option<LoadedType>,
}

impl ImplementationBuilder {
    /// Resolve or create the contract and its `$Impl` twin in the pool.
    pub fn new(pool: Arc<TypePool>, contract_name: &str) -> Result<Self, SynthesisError> {
        let contract = ContractBuilder::new(Arc::clone(&pool), contract_name)?;
        let impl_name = format!("{contract_name}{IMPL_SUFFIX}");
        let handle = pool.resolve_or_create(&impl_name, TypeKind::Class)?;
        handle.with(|desc| {
            desc.set_supertype(RUNTIME_BASE)?;
            desc.add_constructor(CtorDef::default_ctor())
        })?;
        Ok(Self {
            pool,
            contract,
            handle,
            state: BuildState::Open,
            linked: None,
        })
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn contract_name(&self) -> &str {
        self.contract.name()
    }

    // Routing metadata lives on the contract; the implementation type carries
    // none of its own.

    pub fn base_path(&mut self, path: impl Into<String>) -> Result<&mut Self, SynthesisError> {
        self.contract.base_path(path)?;
        Ok(self)
    }

    pub fn produces<I, S>(&mut self, types: I) -> Result<&mut Self, SynthesisError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contract.produces(types)?;
        Ok(self)
    }

    pub fn bind(&mut self, binding: Binding) -> Result<&mut Self, SynthesisError> {
        self.contract.bind(binding)?;
        Ok(self)
    }

    pub fn rpc_service(&mut self, service: RpcServiceSpec) -> Result<&mut Self, SynthesisError> {
        self.contract.rpc_service(service)?;
        Ok(self)
    }

    pub fn field(
        &mut self,
        ty: TypeRef,
        name: impl Into<String>,
        initial_value: Option<String>,
    ) -> Result<&mut Self, SynthesisError> {
        self.contract.field(ty, name, initial_value)?;
        Ok(self)
    }

    pub fn remove_field(&mut self, name: &str) -> Result<&mut Self, SynthesisError> {
        self.contract.remove_field(name)?;
        Ok(self)
    }

    /// Declare an operation on the contract (abstract) and its concrete twin
    /// on the implementation type. Last write wins on both sides.
    pub fn declare_operation(
        &mut self,
        returns: Option<TypeRef>,
        spec: OperationSpec,
        binding: Option<Binding>,
        params: Vec<ParamSpec>,
    ) -> Result<&mut Self, SynthesisError> {
        self.declare_rpc_operation(returns, spec, binding, None, params)
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
        self.contract.declare_rpc_operation(
            returns.clone(),
            spec.clone(),
            binding.clone(),
            result.clone(),
            params.clone(),
        )?;
        let signature: Vec<TypeRef> = params.iter().map(|p| p.ty.clone()).collect();
        self.handle.with(|desc| {
            desc.put_operation(OperationDef {
                key: OperationKey::new(spec.name.clone(), signature),
                returns,
                spec,
                binding,
                params,
                result,
                is_abstract: false,
            })
        })?;
        Ok(self)
    }

    /// Remove the implementation's concrete operation; the contract's
    /// abstract declaration is untouched. Absent operations are a no-op.
    pub fn remove_operation(
        &mut self,
        name: &str,
        signature: &[TypeRef],
    ) -> Result<&mut Self, SynthesisError> {
        let key = OperationKey::new(name, signature.to_vec());
        self.handle.with(|desc| desc.remove_operation(&key))?;
        Ok(self)
    }

    /// Finalize the contract, link the implementation against it and finalize
    /// the implementation. Repeat calls return the already-linked pair.
    pub fn build(&mut self) -> Result<LoadedType, SynthesisError> {
        if let Some(linked) = &self.linked {
            return Ok(linked.clone());
        }

        let contract = self.contract.build()?;
        self.state = BuildState::Linked;
        self.handle.with(|desc| desc.set_supertype(contract.name()))?;
        let class = self.pool.finalize(&self.handle)?;
        self.state = BuildState::Finalized;

        tracing::info!(
            type_name = %class.name(),
            contract = %contract.name(),
            "implementation linked and finalized"
        );
        let loaded = LoadedType::new(class, contract);
        self.linked = Some(loaded.clone());
        Ok(loaded)
    }

    /// Build and release the builder, yielding the loadable artifact pair.
    pub fn materialize(mut self) -> Result<LoadedType, SynthesisError> {
        self.build()?;
        self.linked.take().ok_or(SynthesisError::Construction {
            name: self.handle.name().to_owned(),
            reason: "builder released before linking".to_owned(),
        })
    }

    /// Materialize and construct one instance bound to `handler`.
    ///
    /// Synthesizes the handler-injecting constructor when the type is still
    /// open and does not already carry one. The runtime base must expose the
    /// matching constructor for the injected capability to reach it.
    pub fn instantiate(
        self,
        handler: Arc<dyn InvocationHandler>,
    ) -> Result<ServiceInstance, SynthesisError> {
        let base_has_ctor = self
            .pool
            .lookup(RUNTIME_BASE)
            .is_some_and(|base| base.has_constructor(&CtorDef::handler_ctor()));
        if !base_has_ctor {
            return Err(SynthesisError::Construction {
                name: self.handle.name().to_owned(),
                reason: format!("{RUNTIME_BASE} lacks a handler-taking constructor"),
            });
        }

        if self.state == BuildState::Open {
            self.handle
                .with(|desc| desc.add_constructor(CtorDef::handler_ctor()))?;
        }
        let loaded = self.materialize()?;
        loaded.instance(Some(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    use crate::dispatch::MethodIdentity;

    struct RecordingHandler {
        calls: Mutex<Vec<(String, Vec<Value>)>>,
        reply: Value,
    }

    impl RecordingHandler {
        fn new(reply: Value) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reply,
            }
        }
    }

    impl InvocationHandler for RecordingHandler {
        fn invoke(
            &self,
            _target: &ServiceInstance,
            method: &MethodIdentity,
            args: &[Value],
        ) -> anyhow::Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((method.name.clone(), args.to_vec()));
            Ok(self.reply.clone())
        }
    }

    fn sample_builder(pool: &Arc<TypePool>) -> ImplementationBuilder {
        let mut builder =
            ImplementationBuilder::new(Arc::clone(pool), "demo.SampleApi").expect("builder");
        builder
            .base_path("/sample")
            .unwrap()
            .declare_operation(
                Some(TypeRef::String),
                OperationSpec::http(Method::GET, "op", "/{id}"),
                None,
                vec![ParamSpec::path(TypeRef::String, "id")],
            )
            .unwrap();
        builder
    }

    #[test]
    fn build_links_supertypes() {
        let pool = Arc::new(TypePool::new());
        let loaded = sample_builder(&pool).materialize().unwrap();
        assert_eq!(loaded.contract().name(), "demo.SampleApi");
        assert_eq!(loaded.class().name(), "demo.SampleApi$Impl");
        assert_eq!(loaded.class().supertype(), Some("demo.SampleApi"));
        assert!(loaded.contract().operation("op", &[TypeRef::String]).is_some());
    }

    #[test]
    fn build_is_idempotent() {
        let pool = Arc::new(TypePool::new());
        let mut builder = sample_builder(&pool);
        let first = builder.build().unwrap();
        let second = builder.build().unwrap();
        assert_eq!(first.class().name(), second.class().name());
    }

    #[test]
    fn instantiate_forwards_calls_to_the_handler() {
        let pool = Arc::new(TypePool::new());
        let handler = Arc::new(RecordingHandler::new(json!("pong")));
        let instance = sample_builder(&pool)
            .instantiate(Arc::clone(&handler) as Arc<dyn InvocationHandler>)
            .unwrap();

        let reply = instance.call("op", &[json!("abc")]).unwrap();
        assert_eq!(reply, json!("pong"));

        let calls = handler.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "op");
        assert_eq!(calls[0].1, vec![json!("abc")]);
    }

    #[test]
    fn unbound_instance_yields_declared_defaults() {
        let pool = Arc::new(TypePool::new());
        let loaded = sample_builder(&pool).materialize().unwrap();
        let instance = loaded.instance(None).unwrap();
        assert_eq!(instance.call("op", &[json!("abc")]).unwrap(), Value::Null);
    }

    #[test]
    fn mutation_after_build_fails() {
        let pool = Arc::new(TypePool::new());
        let mut builder = sample_builder(&pool);
        builder.build().unwrap();
        assert!(matches!(
            builder.remove_operation("op", &[TypeRef::String]),
            Err(SynthesisError::FrozenType { .. })
        ));
        assert!(matches!(
            builder.base_path("/late"),
            Err(SynthesisError::FrozenType { .. })
        ));
    }

    #[test]
    fn removing_only_the_concrete_operation_keeps_the_contract() {
        let pool = Arc::new(TypePool::new());
        let mut builder = sample_builder(&pool);
        builder.remove_operation("op", &[TypeRef::String]).unwrap();
        // removing again is a no-op
        builder.remove_operation("op", &[TypeRef::String]).unwrap();
        let loaded = builder.materialize().unwrap();
        assert!(loaded.contract().operation("op", &[TypeRef::String]).is_some());
        assert!(loaded.class().operation("op", &[TypeRef::String]).is_none());
    }
}
