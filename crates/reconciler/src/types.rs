//! Core types for the reconciler.

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements, ServicePort};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Group of the OpenTelemetry operator's custom resources.
pub const OTEL_GROUP: &str = "opentelemetry.io";
/// Served version of the `OpenTelemetryCollector` resource.
pub const OTEL_VERSION: &str = "v1alpha1";
/// Kind name of the managed collector resource.
pub const COLLECTOR_KIND: &str = "OpenTelemetryCollector";
/// Plural resource name, also the descriptor discriminator for collectors.
pub const COLLECTOR_RESOURCE: &str = "opentelemetrycollectors";

/// Operation intent carried by a descriptor.
///
/// Encoded on the wire as the integers `1`, `2`, `3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl TryFrom<u8> for Operation {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Create),
            2 => Ok(Self::Update),
            3 => Ok(Self::Delete),
            other => Err(Error::invalid_descriptor(format!(
                "unknown operation code {other}"
            ))),
        }
    }
}

impl From<Operation> for u8 {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Create => 1,
            Operation::Update => 2,
            Operation::Delete => 3,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// What to do and to which named object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInfo {
    /// Object name; falls back to the body's `metadata.name` when empty.
    #[serde(default)]
    pub name: String,
    pub operation: Operation,
    /// Target namespace; the reconciler default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Group/version plus the plural resource name.
///
/// `resource` doubles as the discriminator selecting the body codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    /// Create a new group/version/resource triple.
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// Triple for the managed collector resource.
    pub fn collectors() -> Self {
        Self::new(OTEL_GROUP, OTEL_VERSION, COLLECTOR_RESOURCE)
    }

    /// The `apiVersion` string (`group/version`, or `version` for the core group).
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// Operation and locator of a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub operation_info: OperationInfo,
    pub group_version_resource: GroupVersionResource,
}

/// Deployment mode of a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorMode {
    #[default]
    Deployment,
    DaemonSet,
    StatefulSet,
    Sidecar,
}

/// Operator-driven upgrade policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpgradeStrategy {
    Automatic,
    None,
}

/// Target allocator settings of a collector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAllocator {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_strategy: Option<String>,
}

/// Spec of an `OpenTelemetryCollector`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTelemetryCollectorSpec {
    /// Raw collector pipeline configuration (YAML text).
    #[serde(default)]
    pub config: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<CollectorMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_allocator: Option<TargetAllocator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_strategy: Option<UpgradeStrategy>,
}

/// The managed custom resource.
///
/// `apiVersion`/`kind` are owned by the codec and not part of the typed body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenTelemetryCollector {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: OpenTelemetryCollectorSpec,
    /// Operator-written status, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

impl OpenTelemetryCollector {
    /// Create a named collector running the given pipeline configuration.
    pub fn new(name: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..ObjectMeta::default()
            },
            spec: OpenTelemetryCollectorSpec {
                config: config.into(),
                ..OpenTelemetryCollectorSpec::default()
            },
            status: None,
        }
    }
}

/// Kind-specific payload of a descriptor; exactly one variant is populated.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceBody {
    OpenTelemetryCollector(OpenTelemetryCollector),
}

impl ResourceBody {
    /// Metadata block of the populated body.
    pub const fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::OpenTelemetryCollector(collector) => &collector.metadata,
        }
    }
}

/// Typed description of the one resource the agent manages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor", into = "RawDescriptor")]
pub struct ManagedResourceDescriptor {
    pub resource_info: ResourceInfo,
    pub body: ResourceBody,
}

impl ManagedResourceDescriptor {
    /// Create a descriptor for a collector with the given intent.
    pub fn collector(operation: Operation, collector: OpenTelemetryCollector) -> Self {
        Self {
            resource_info: ResourceInfo {
                operation_info: OperationInfo {
                    name: collector.metadata.name.clone().unwrap_or_default(),
                    operation,
                    namespace: collector.metadata.namespace.clone(),
                },
                group_version_resource: GroupVersionResource::collectors(),
            },
            body: ResourceBody::OpenTelemetryCollector(collector),
        }
    }

    /// Override the discriminator/locator triple.
    #[must_use]
    pub fn with_gvr(mut self, gvr: GroupVersionResource) -> Self {
        self.resource_info.group_version_resource = gvr;
        self
    }

    /// The resource-kind discriminator.
    pub fn resource(&self) -> &str {
        &self.resource_info.group_version_resource.resource
    }

    /// The operation intent.
    pub const fn operation(&self) -> Operation {
        self.resource_info.operation_info.operation
    }

    /// Group/version/resource locator.
    pub const fn gvr(&self) -> &GroupVersionResource {
        &self.resource_info.group_version_resource
    }

    /// Explicit namespace: the operation namespace, else the body's
    /// `metadata.namespace`.
    pub fn namespace(&self) -> Option<&str> {
        self.resource_info
            .operation_info
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .or_else(|| {
                self.body
                    .metadata()
                    .namespace
                    .as_deref()
                    .filter(|ns| !ns.is_empty())
            })
    }

    /// Object name: the operation name, else the body's `metadata.name`.
    pub fn name(&self) -> Option<&str> {
        let name = self.resource_info.operation_info.name.as_str();
        if name.is_empty() {
            self.body
                .metadata()
                .name
                .as_deref()
                .filter(|n| !n.is_empty())
        } else {
            Some(name)
        }
    }
}

/// Wire shape of a descriptor: resource info inline plus one optional key
/// per body kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    #[serde(flatten)]
    resource_info: ResourceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    open_telemetry_collector: Option<OpenTelemetryCollector>,
}

impl TryFrom<RawDescriptor> for ManagedResourceDescriptor {
    type Error = Error;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        let mut bodies: Vec<ResourceBody> = [raw
            .open_telemetry_collector
            .map(ResourceBody::OpenTelemetryCollector)]
        .into_iter()
        .flatten()
        .collect();

        match (bodies.pop(), bodies.is_empty()) {
            (Some(body), true) => Ok(Self {
                resource_info: raw.resource_info,
                body,
            }),
            (None, _) => Err(Error::invalid_descriptor("no resource body present")),
            (Some(_), false) => Err(Error::invalid_descriptor(
                "more than one resource body present",
            )),
        }
    }
}

impl From<ManagedResourceDescriptor> for RawDescriptor {
    fn from(descriptor: ManagedResourceDescriptor) -> Self {
        let open_telemetry_collector = match descriptor.body {
            ResourceBody::OpenTelemetryCollector(collector) => Some(collector),
        };
        Self {
            resource_info: descriptor.resource_info,
            open_telemetry_collector,
        }
    }
}

/// Fully resolved address of one object behind the dynamic API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocator {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespace: String,
    pub name: String,
}

impl std::fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}/{} {}/{}",
            self.plural, self.group, self.version, self.namespace, self.name
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn test_operation_codes() {
        assert_eq!(Operation::try_from(1).ok(), Some(Operation::Create));
        assert_eq!(Operation::try_from(3).ok(), Some(Operation::Delete));
        assert!(Operation::try_from(7).is_err());
        assert_eq!(u8::from(Operation::Update), 2);
    }

    #[test]
    fn test_descriptor_name_falls_back_to_body() {
        let mut descriptor = ManagedResourceDescriptor::collector(
            Operation::Create,
            OpenTelemetryCollector::new("from-body", "receivers: {}"),
        );
        descriptor.resource_info.operation_info.name = String::new();
        assert_eq!(descriptor.name(), Some("from-body"));

        descriptor.resource_info.operation_info.name = "explicit".to_string();
        assert_eq!(descriptor.name(), Some("explicit"));
    }

    #[test]
    fn test_descriptor_namespace_falls_back_to_body() {
        let mut collector = OpenTelemetryCollector::new("otel", "receivers: {}");
        collector.metadata.namespace = Some("monitoring".to_string());
        let mut descriptor = ManagedResourceDescriptor::collector(Operation::Create, collector);
        descriptor.resource_info.operation_info.namespace = None;
        assert_eq!(descriptor.namespace(), Some("monitoring"));

        descriptor.resource_info.operation_info.namespace = Some(String::new());
        assert_eq!(descriptor.namespace(), Some("monitoring"));

        descriptor.resource_info.operation_info.namespace = Some("explicit".to_string());
        assert_eq!(descriptor.namespace(), Some("explicit"));
    }

    #[test]
    fn test_descriptor_without_any_namespace() {
        let descriptor = ManagedResourceDescriptor::collector(
            Operation::Create,
            OpenTelemetryCollector::new("otel", "receivers: {}"),
        );
        assert_eq!(descriptor.namespace(), None);
    }

    #[test]
    fn test_descriptor_requires_a_body() {
        let json = serde_json::json!({
            "operationInfo": {"name": "otel", "operation": 1},
            "groupVersionResource": {
                "group": "opentelemetry.io",
                "version": "v1alpha1",
                "resource": "opentelemetrycollectors"
            }
        });
        let err = serde_json::from_value::<ManagedResourceDescriptor>(json)
            .expect_err("descriptor without body must fail");
        assert!(err.to_string().contains("no resource body"));
    }

    #[test]
    fn test_descriptor_wire_shape() {
        let descriptor = ManagedResourceDescriptor::collector(
            Operation::Update,
            OpenTelemetryCollector::new("otel", "receivers: {}"),
        );
        let value = serde_json::to_value(&descriptor).unwrap();

        assert_eq!(value["operationInfo"]["operation"], 2);
        assert_eq!(
            value["groupVersionResource"]["resource"],
            "opentelemetrycollectors"
        );
        assert_eq!(
            value["openTelemetryCollector"]["spec"]["config"],
            "receivers: {}"
        );

        let back: ManagedResourceDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn test_api_version_core_group() {
        assert_eq!(GroupVersionResource::new("", "v1", "configmaps").api_version(), "v1");
        assert_eq!(
            GroupVersionResource::collectors().api_version(),
            "opentelemetry.io/v1alpha1"
        );
    }
}
