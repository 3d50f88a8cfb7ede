//! Declarative YAML manifest describing the endpoint surfaces to synthesize.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use epkit::{
    Binding, ImplementationBuilder, OperationSpec, ParamSource, ParamSpec, RpcServiceSpec,
    TypePool, TypeRef,
};

#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub endpoints: Vec<EndpointEntry>,
}

#[derive(Debug, Deserialize)]
pub struct EndpointEntry {
    /// Qualified contract name, e.g. `sample.CustomerApi`.
    pub name: String,
    pub base_path: Option<String>,
    #[serde(default)]
    pub produces: Vec<String>,
    /// External binding uid; generated when absent.
    pub binding: Option<String>,
    pub rpc_service: Option<RpcServiceSpec>,
    #[serde(default)]
    pub operations: Vec<OperationEntry>,
}

#[derive(Debug, Deserialize)]
pub struct OperationEntry {
    pub name: String,
    /// HTTP verb for REST-style operations. Mutually exclusive with `operation`.
    pub verb: Option<String>,
    /// RPC operation name. Mutually exclusive with `verb`.
    pub operation: Option<String>,
    pub action: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub produces: Vec<String>,
    #[serde(default)]
    pub consumes: Vec<String>,
    pub returns: Option<TypeRef>,
    pub binding: Option<String>,
    /// Declared but excluded from the exported surface; skipped by demo
    /// invocations.
    #[serde(default)]
    pub exclude: bool,
    #[serde(default)]
    pub params: Vec<ParamEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ParamEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub source: ParamSource,
    pub default: Option<String>,
}

impl Manifest {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing manifest {}", path.display()))
    }
}

impl OperationEntry {
    fn spec(&self) -> Result<OperationSpec> {
        let mut spec = match (&self.verb, &self.operation) {
            (Some(verb), None) => {
                let method = http::Method::from_bytes(verb.as_bytes())
                    .with_context(|| format!("operation '{}': bad verb '{verb}'", self.name))?;
                OperationSpec::http(method, self.name.clone(), self.path.clone())
            }
            (None, Some(operation)) => {
                let mut spec = OperationSpec::rpc(operation.clone(), self.name.clone());
                if let Some(action) = &self.action {
                    spec = spec.with_action(action.clone());
                }
                spec
            }
            _ => bail!(
                "operation '{}': exactly one of 'verb' or 'operation' is required",
                self.name
            ),
        };
        if !self.produces.is_empty() {
            spec = spec.with_produces(self.produces.clone());
        }
        if !self.consumes.is_empty() {
            spec = spec.with_consumes(self.consumes.clone());
        }
        if self.exclude {
            spec = spec.excluded();
        }
        Ok(spec)
    }

    /// Arguments a demo invocation of this operation should carry: the
    /// declared default where one exists, the type's default value otherwise.
    pub fn demo_args(&self) -> Vec<Value> {
        self.params
            .iter()
            .map(|p| match (&p.default, &p.ty) {
                (Some(raw), TypeRef::String) => Value::from(raw.clone()),
                (Some(raw), TypeRef::Int) => {
                    raw.parse::<i64>().map(Value::from).unwrap_or(Value::from(0))
                }
                (Some(raw), TypeRef::Float) => raw
                    .parse::<f64>()
                    .map(Value::from)
                    .unwrap_or(Value::from(0.0)),
                (Some(raw), TypeRef::Bool) => {
                    Value::Bool(raw.parse::<bool>().unwrap_or_default())
                }
                (Some(_), TypeRef::Object(_)) | (None, _) => p.ty.default_value(),
            })
            .collect()
    }
}

/// Configure an implementation builder from one manifest entry.
pub fn configure(pool: Arc<TypePool>, entry: &EndpointEntry) -> Result<ImplementationBuilder> {
    let mut builder = ImplementationBuilder::new(pool, &entry.name)?;
    if let Some(base_path) = &entry.base_path {
        builder.base_path(base_path)?;
    }
    if !entry.produces.is_empty() {
        builder.produces(entry.produces.clone())?;
    }
    let uid = entry
        .binding
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    builder.bind(Binding::new(uid))?;
    if let Some(service) = &entry.rpc_service {
        builder.rpc_service(service.clone())?;
    }

    for op in &entry.operations {
        let params: Vec<ParamSpec> = op
            .params
            .iter()
            .map(|p| {
                let mut spec = ParamSpec::new(p.ty.clone(), p.name.clone(), p.source);
                if let Some(default) = &p.default {
                    spec = spec.with_default(default.clone());
                }
                spec
            })
            .collect();
        builder.declare_operation(op.returns.clone(), op.spec()?, op.binding.clone().map(Binding::new), params)?;
    }
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
endpoints:
  - name: sample.CustomerApi
    base_path: /sample
    produces: [application/json]
    binding: ID01201
    operations:
      - name: find
        verb: GET
        path: /{id}/info
        returns: string
        params:
          - name: id
            type: string
            source: path
            default: abc
      - name: purge
        verb: DELETE
        path: /purge
        exclude: true
"#;

    #[test]
    fn sample_manifest_parses_and_configures() {
        let manifest: Manifest = serde_yaml::from_str(SAMPLE).expect("parse");
        assert_eq!(manifest.endpoints.len(), 1);

        let pool = Arc::new(TypePool::new());
        let mut builder = configure(pool, &manifest.endpoints[0]).expect("configure");
        let loaded = builder.build().expect("build");
        let meta = loaded.contract().metadata();
        assert_eq!(meta.base_path.as_deref(), Some("/sample"));
        assert_eq!(
            meta.binding.as_ref().map(|b| b.uid.as_str()),
            Some("ID01201")
        );
        assert!(loaded
            .contract()
            .operation("find", &[TypeRef::String])
            .is_some());
    }

    #[test]
    fn rejects_operations_with_both_verb_and_operation() {
        let entry = OperationEntry {
            name: "broken".to_owned(),
            verb: Some("GET".to_owned()),
            operation: Some("broken".to_owned()),
            action: None,
            path: String::new(),
            produces: vec![],
            consumes: vec![],
            returns: None,
            binding: None,
            exclude: false,
            params: vec![],
        };
        assert!(entry.spec().is_err());
    }

    #[test]
    fn configured_endpoint_instantiates_and_dispatches() {
        use epkit::{InvocationHandler, MethodIdentity, ServiceInstance};
        use serde_json::json;

        struct Echo;

        impl InvocationHandler for Echo {
            fn invoke(
                &self,
                _target: &ServiceInstance,
                _method: &MethodIdentity,
                _args: &[Value],
            ) -> anyhow::Result<Value> {
                Ok(json!("echo"))
            }
        }

        let manifest: Manifest = serde_yaml::from_str(SAMPLE).expect("parse");
        let entry = &manifest.endpoints[0];
        let pool = Arc::new(TypePool::new());
        let instance = configure(pool, entry)
            .expect("configure")
            .instantiate(Arc::new(Echo))
            .expect("instance");

        let find = &entry.operations[0];
        let reply = instance.call(&find.name, &find.demo_args()).expect("call");
        assert_eq!(reply, json!("echo"));
    }

    #[test]
    fn exclude_flag_flows_into_the_operation_spec() {
        let manifest: Manifest = serde_yaml::from_str(SAMPLE).expect("parse");
        let ops = &manifest.endpoints[0].operations;
        assert!(!ops[0].exclude);
        assert!(ops[1].exclude);
        assert!(ops[1].spec().expect("spec").exclude);
    }

    #[test]
    fn demo_args_prefer_declared_defaults() {
        let manifest: Manifest = serde_yaml::from_str(SAMPLE).expect("parse");
        let args = manifest.endpoints[0].operations[0].demo_args();
        assert_eq!(args, vec![Value::from("abc")]);
    }
}
