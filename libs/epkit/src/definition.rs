//! Pure value types describing a remote-callable surface.
//!
//! These carry no behavior beyond defaulting rules: produced media types
//! default to `*/*`, a parameter's source defaults to [`ParamSource::Query`]
//! and an RPC parameter's direction defaults to [`Direction::In`].

use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Media type wildcard used when no produced/consumed types are declared.
pub const WILDCARD_MEDIA_TYPE: &str = "*/*";

/// A type reference in the descriptor space.
///
/// The synthesized surface is data-driven, so types are referenced by this
/// small vocabulary rather than by a native runtime type. `Object` carries the
/// qualified name of a structured type the core never inspects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Bool,
    Int,
    Float,
    String,
    Object(String),
}

impl TypeRef {
    pub fn object(name: impl Into<String>) -> Self {
        TypeRef::Object(name.into())
    }

    /// The value an operation yields when no handler is attached.
    ///
    /// Primitives default to zero/false; string and object references are
    /// nullable and default to `null`.
    pub fn default_value(&self) -> Value {
        match self {
            TypeRef::Bool => Value::Bool(false),
            TypeRef::Int => Value::from(0i64),
            TypeRef::Float => Value::from(0.0f64),
            TypeRef::String | TypeRef::Object(_) => Value::Null,
        }
    }

    /// Loose compatibility check between a runtime value and this reference,
    /// used when resolving a call and when coercing a handler result.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            TypeRef::Bool => value.is_boolean(),
            TypeRef::Int => value.is_i64() || value.is_u64(),
            TypeRef::Float => value.is_number(),
            TypeRef::String => value.is_string() || value.is_null(),
            // Structured payloads are opaque to the core.
            TypeRef::Object(_) => true,
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::Int => f.write_str("int"),
            TypeRef::Float => f.write_str("float"),
            TypeRef::String => f.write_str("string"),
            TypeRef::Object(name) => f.write_str(name),
        }
    }
}

/// What kind of operation is being declared: an HTTP verb for REST-style
/// surfaces or a named operation (with an optional action) for RPC-style ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "KindRepr", try_from = "KindRepr")]
pub enum OperationKind {
    Http(Method),
    Rpc {
        operation: String,
        action: Option<String>,
    },
}

/// Wire representation of [`OperationKind`]; the HTTP verb round-trips as its
/// token so artifacts stay readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindRepr {
    Http(String),
    Rpc {
        operation: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
}

impl From<OperationKind> for KindRepr {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Http(method) => KindRepr::Http(method.as_str().to_owned()),
            OperationKind::Rpc { operation, action } => KindRepr::Rpc { operation, action },
        }
    }
}

impl TryFrom<KindRepr> for OperationKind {
    type Error = http::method::InvalidMethod;

    fn try_from(repr: KindRepr) -> Result<Self, Self::Error> {
        Ok(match repr {
            KindRepr::Http(token) => OperationKind::Http(Method::from_bytes(token.as_bytes())?),
            KindRepr::Rpc { operation, action } => OperationKind::Rpc { operation, action },
        })
    }
}

/// Declarative description of a single operation: verb or operation name,
/// declared method name, path template and media types.
///
/// Immutable once constructed; use the `with_*` helpers while building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub kind: OperationKind,
    /// Declared method name on the synthesized type.
    pub name: String,
    /// URI template served by this operation (empty for RPC operations).
    pub path: String,
    /// Produced media types; never empty, defaults to `*/*`.
    pub produces: Vec<String>,
    /// Consumed media types; attached to the operation only when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumes: Option<Vec<String>>,
    /// Declared but excluded from the exported surface (RPC only).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exclude: bool,
}

impl OperationSpec {
    /// A REST-style operation bound to an HTTP verb and path template.
    pub fn http(method: Method, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Http(method),
            name: name.into(),
            path: path.into(),
            produces: vec![WILDCARD_MEDIA_TYPE.to_owned()],
            consumes: None,
            exclude: false,
        }
    }

    /// An RPC-style operation identified by its operation name.
    pub fn rpc(operation: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Rpc {
                operation: operation.into(),
                action: None,
            },
            name: name.into(),
            path: String::new(),
            produces: vec![WILDCARD_MEDIA_TYPE.to_owned()],
            consumes: None,
            exclude: false,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        if let OperationKind::Rpc { action: slot, .. } = &mut self.kind {
            *slot = Some(action.into());
        }
        self
    }

    /// Replace the produced media types; an empty list falls back to `*/*`.
    pub fn with_produces<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.produces = normalize_media_types(types);
        self
    }

    pub fn with_consumes<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let types: Vec<String> = types.into_iter().map(Into::into).collect();
        self.consumes = (!types.is_empty()).then_some(types);
        self
    }

    pub fn excluded(mut self) -> Self {
        self.exclude = true;
        self
    }
}

/// Normalize a produced/consumed media type list: empty input yields `*/*`.
pub(crate) fn normalize_media_types<I, S>(types: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let types: Vec<String> = types.into_iter().map(Into::into).collect();
    if types.is_empty() {
        vec![WILDCARD_MEDIA_TYPE.to_owned()]
    } else {
        types
    }
}

/// Where a parameter's value is taken from by the hosting router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSource {
    Bean,
    Cookie,
    Header,
    Matrix,
    Form,
    Path,
    #[default]
    Query,
}

/// Parameter flow direction for RPC-style operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    In,
    Out,
    InOut,
}

/// RPC extension of a parameter: message-part naming and flow direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcParamSpec {
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub target_namespace: String,
    #[serde(default)]
    pub direction: Direction,
    /// Whether the parameter rides in the message header rather than the body.
    #[serde(default)]
    pub header: bool,
}

/// Parameter specification: value type, name, binding source and an optional
/// default applied when the request carries no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub ty: TypeRef,
    pub name: String,
    #[serde(default)]
    pub source: ParamSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc: Option<RpcParamSpec>,
}

impl ParamSpec {
    pub fn new(ty: TypeRef, name: impl Into<String>, source: ParamSource) -> Self {
        Self {
            ty,
            name: name.into(),
            source,
            default_value: None,
            rpc: None,
        }
    }

    pub fn query(ty: TypeRef, name: impl Into<String>) -> Self {
        Self::new(ty, name, ParamSource::Query)
    }

    pub fn path(ty: TypeRef, name: impl Into<String>) -> Self {
        Self::new(ty, name, ParamSource::Path)
    }

    pub fn header(ty: TypeRef, name: impl Into<String>) -> Self {
        Self::new(ty, name, ParamSource::Header)
    }

    pub fn form(ty: TypeRef, name: impl Into<String>) -> Self {
        Self::new(ty, name, ParamSource::Form)
    }

    pub fn cookie(ty: TypeRef, name: impl Into<String>) -> Self {
        Self::new(ty, name, ParamSource::Cookie)
    }

    pub fn matrix(ty: TypeRef, name: impl Into<String>) -> Self {
        Self::new(ty, name, ParamSource::Matrix)
    }

    /// A "parameter aggregator" object populated from the whole request.
    pub fn bean(ty: TypeRef, name: impl Into<String>) -> Self {
        Self::new(ty, name, ParamSource::Bean)
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_rpc(mut self, rpc: RpcParamSpec) -> Self {
        self.rpc = Some(rpc);
        self
    }
}

/// Return-value naming for RPC-style operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResultSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
    #[serde(default)]
    pub header: bool,
}

/// Type-level service identity for RPC contracts (service/port naming and the
/// WSDL location, when published).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcServiceSpec {
    pub name: String,
    pub target_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wsdl_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_interface: Option<String>,
}

/// Opaque association between a synthesized type/operation and externally
/// stored data. The core serializes it into metadata and never interprets
/// `payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Binding {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            payload: None,
        }
    }

    pub fn with_payload(uid: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            payload: Some(payload.into()),
        }
    }
}
