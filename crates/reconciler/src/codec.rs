//! Translation between typed resource bodies and the orchestrator's
//! untyped object form.
//!
//! The dynamic API is untyped; every conversion goes through the
//! [`CodecRegistry`], keyed by the descriptor's resource discriminator, so the
//! rest of the engine only handles typed values.

use std::collections::HashMap;
use std::sync::Arc;

use kube::core::DynamicObject;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::{
    COLLECTOR_KIND, COLLECTOR_RESOURCE, ManagedResourceDescriptor, OpenTelemetryCollector,
    ResourceBody,
};

/// Encode/decode pair for one resource kind.
pub trait ResourceCodec: Send + Sync {
    /// Value written to the object's `kind` field.
    fn kind(&self) -> &str;

    /// Serialize a body into a JSON object with `metadata` and kind-specific
    /// top-level fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResource`] if the body is not of this kind or
    /// fails to serialize.
    fn encode(&self, body: &ResourceBody) -> Result<Value>;

    /// Deserialize a JSON object produced by [`ResourceCodec::encode`] or
    /// returned by the API server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResource`] if required fields are absent.
    fn decode(&self, value: Value) -> Result<ResourceBody>;
}

/// Codec for `OpenTelemetryCollector` resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectorCodec;

impl ResourceCodec for CollectorCodec {
    fn kind(&self) -> &str {
        COLLECTOR_KIND
    }

    fn encode(&self, body: &ResourceBody) -> Result<Value> {
        match body {
            ResourceBody::OpenTelemetryCollector(collector) => {
                serde_json::to_value(collector).map_err(|e| Error::malformed(e.to_string()))
            }
        }
    }

    fn decode(&self, value: Value) -> Result<ResourceBody> {
        let collector: OpenTelemetryCollector =
            serde_json::from_value(value).map_err(|e| Error::malformed(e.to_string()))?;

        if collector.metadata.name.as_deref().is_none_or(str::is_empty) {
            return Err(Error::malformed("collector has no metadata.name"));
        }
        if collector.spec.config.trim().is_empty() {
            return Err(Error::malformed("collector has an empty spec.config"));
        }

        Ok(ResourceBody::OpenTelemetryCollector(collector))
    }
}

/// Registry mapping resource discriminators to codecs.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn ResourceCodec>>,
}

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the managed collector kind registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(COLLECTOR_RESOURCE, Arc::new(CollectorCodec));
        registry
    }

    /// Register a codec under a discriminator, returning any codec it replaces.
    pub fn register(
        &mut self,
        resource: impl Into<String>,
        codec: Arc<dyn ResourceCodec>,
    ) -> Option<Arc<dyn ResourceCodec>> {
        self.codecs.insert(resource.into(), codec)
    }

    /// Whether a discriminator has a codec.
    pub fn contains(&self, resource: &str) -> bool {
        self.codecs.contains_key(resource)
    }

    /// Look up the codec for a discriminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResourceKind`] if none is registered.
    pub fn lookup(&self, resource: &str) -> Result<&Arc<dyn ResourceCodec>> {
        self.codecs
            .get(resource)
            .ok_or_else(|| Error::unknown_resource_kind(resource))
    }

    /// Encode a descriptor's body into a generic object.
    ///
    /// `apiVersion` and `kind` come from the descriptor's locator and the
    /// codec; `metadata.name` and `metadata.namespace` from the descriptor
    /// when it names them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResourceKind`] for an unregistered discriminator
    /// and [`Error::MalformedResource`] if the encoded body is not an object.
    pub fn encode(&self, descriptor: &ManagedResourceDescriptor) -> Result<DynamicObject> {
        let codec = self.lookup(descriptor.resource())?;
        let mut value = codec.encode(&descriptor.body)?;

        let Some(fields) = value.as_object_mut() else {
            return Err(Error::malformed("encoded body is not an object"));
        };
        fields.insert(
            "apiVersion".to_string(),
            Value::String(descriptor.gvr().api_version()),
        );
        fields.insert("kind".to_string(), Value::String(codec.kind().to_string()));

        let mut object: DynamicObject =
            serde_json::from_value(value).map_err(|e| Error::malformed(e.to_string()))?;

        if let Some(name) = descriptor.name() {
            object.metadata.name = Some(name.to_string());
        }
        if let Some(namespace) = descriptor.namespace() {
            object.metadata.namespace = Some(namespace.to_string());
        }

        Ok(object)
    }

    /// Decode a generic object into the typed body for a discriminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResourceKind`] for an unregistered discriminator
    /// and [`Error::MalformedResource`] if the object's kind disagrees with the
    /// codec or required fields are absent.
    pub fn decode(&self, resource: &str, object: &DynamicObject) -> Result<ResourceBody> {
        let codec = self.lookup(resource)?;

        if let Some(types) = &object.types {
            if !types.kind.is_empty() && types.kind != codec.kind() {
                return Err(Error::malformed(format!(
                    "expected kind '{}', found '{}'",
                    codec.kind(),
                    types.kind
                )));
            }
        }

        let mut fields = match &object.data {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => return Err(Error::malformed("object data is not a map")),
        };
        let metadata =
            serde_json::to_value(&object.metadata).map_err(|e| Error::malformed(e.to_string()))?;
        fields.insert("metadata".to_string(), metadata);

        codec.decode(Value::Object(fields))
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&String> = self.codecs.keys().collect();
        kinds.sort();
        f.debug_struct("CodecRegistry").field("kinds", &kinds).finish()
    }
}
