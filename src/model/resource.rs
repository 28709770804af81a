//! Resources, change notifications and lookup keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::model::stage::StageInfo;

/// Secret data field holding the certificate chain.
pub const SECRET_CERT_FIELD: &str = "tls.crt";
/// Secret data field holding the private key.
pub const SECRET_KEY_FIELD: &str = "tls.key";
/// Secret data field holding the CA bundle.
pub const SECRET_CA_FIELD: &str = "ca.crt";

/// Kind of a registry object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// No kind: a global resync signal.
    #[default]
    Unspecified,
    Stage,
    Route,
    Service,
    PluginMetadata,
    Instance,
    Secret,
    TlsBinding,
    Other(String),
}

impl ResourceKind {
    /// Kinds listed for a stage when building its configuration.
    pub const STAGE_SCOPED: [ResourceKind; 5] = [
        ResourceKind::Route,
        ResourceKind::Service,
        ResourceKind::PluginMetadata,
        ResourceKind::TlsBinding,
        ResourceKind::Secret,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ResourceKind::Unspecified => "",
            ResourceKind::Stage => "BkGatewayStage",
            ResourceKind::Route => "BkGatewayRoute",
            ResourceKind::Service => "BkGatewayService",
            ResourceKind::PluginMetadata => "BkGatewayPluginMetadata",
            ResourceKind::Instance => "BkGatewayInstance",
            ResourceKind::Secret => "Secret",
            ResourceKind::TlsBinding => "BkGatewayTLS",
            ResourceKind::Other(kind) => kind,
        }
    }

    /// Kinds that go through the certificate path instead of the timer.
    pub fn is_certificate_kind(&self) -> bool {
        matches!(
            self,
            ResourceKind::Unspecified | ResourceKind::Secret | ResourceKind::TlsBinding
        )
    }
}

impl From<&str> for ResourceKind {
    fn from(kind: &str) -> Self {
        match kind {
            "" => ResourceKind::Unspecified,
            "BkGatewayStage" => ResourceKind::Stage,
            "BkGatewayRoute" => ResourceKind::Route,
            "BkGatewayService" => ResourceKind::Service,
            "BkGatewayPluginMetadata" => ResourceKind::PluginMetadata,
            "BkGatewayInstance" => ResourceKind::Instance,
            "Secret" => ResourceKind::Secret,
            "BkGatewayTLS" => ResourceKind::TlsBinding,
            other => ResourceKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kind = String::deserialize(deserializer)?;
        Ok(ResourceKind::from(kind.as_str()))
    }
}

/// One change notification from the registry watch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub stage: StageInfo,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: ResourceKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub retry_count: u32,
}

impl ResourceMetadata {
    pub fn new(stage: StageInfo, kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            stage,
            api_version: String::new(),
            kind,
            name: name.into(),
            retry_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stage.is_empty()
    }

    /// Registry key of the object this event refers to.
    pub fn resource_key(&self) -> ResourceKey {
        ResourceKey::new(self.stage.clone(), self.name.clone())
    }
}

/// Registry lookup key; also the certificate identity inside a radix tree.
///
/// Identity is the gateway, stage and resource names. Publish id and
/// context are carried but not compared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceKey {
    pub stage: StageInfo,
    pub resource_name: String,
}

impl ResourceKey {
    pub fn new(stage: StageInfo, resource_name: impl Into<String>) -> Self {
        Self {
            stage,
            resource_name: resource_name.into(),
        }
    }
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.stage.same_stage(&other.stage) && self.resource_name == other.resource_name
    }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stage.gateway_name.hash(state);
        self.stage.stage_name.hash(state);
        self.resource_name.hash(state);
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stage, self.resource_name)
    }
}

/// A stored registry object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    #[serde(default)]
    pub api_version: String,
    pub stage: StageInfo,
    pub name: String,
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl Resource {
    pub fn new(kind: ResourceKind, stage: StageInfo, name: impl Into<String>, spec: serde_json::Value) -> Self {
        Self {
            kind,
            api_version: String::new(),
            stage,
            name: name.into(),
            spec,
        }
    }

    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.stage.clone(), self.name.clone())
    }

    /// Change notification describing this object.
    pub fn metadata(&self) -> ResourceMetadata {
        ResourceMetadata {
            stage: self.stage.clone(),
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            retry_count: 0,
        }
    }

    /// Decode the spec as a Secret.
    pub fn secret_data(&self) -> Result<SecretData, serde_json::Error> {
        serde_json::from_value(self.spec.clone())
    }

    /// Decode the spec as a TLS binding.
    pub fn tls_binding(&self) -> Result<TlsBindingSpec, serde_json::Error> {
        serde_json::from_value(self.spec.clone())
    }
}

/// Secret payload: PEM material keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretData {
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl SecretData {
    pub fn field(&self, name: &str) -> &str {
        self.data.get(name).map(String::as_str).unwrap_or_default()
    }
}

/// TLS binding: points at a Secret and declares the SNIs it serves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsBindingSpec {
    #[serde(alias = "gatewayTLSSecretRef")]
    pub secret_ref: String,
    #[serde(default)]
    pub snis: Vec<String>,
}
