//! Reconciler implementation.

use std::sync::Arc;

use kube::core::DynamicObject;
use tracing::{debug, info, warn};

use crate::api::ResourceApi;
use crate::codec::CodecRegistry;
use crate::error::{ApiError, Error, Result};
use crate::metadata::merge_metadata;
use crate::types::{ManagedResourceDescriptor, Operation, ResourceLocator};

/// Configuration for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Namespace used when a descriptor names none.
    pub default_namespace: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            default_namespace: "default".to_string(),
        }
    }
}

/// The single API mutation a reconciliation performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Resource was absent and has been created.
    Created { name: String },
    /// Resource existed and has been replaced.
    Updated { name: String },
    /// Resource existed and has been deleted.
    Deleted { name: String },
    /// Delete was requested for a resource that does not exist.
    AlreadyAbsent { name: String },
}

impl ReconcileOutcome {
    /// Name of the reconciled resource.
    pub fn name(&self) -> &str {
        match self {
            Self::Created { name }
            | Self::Updated { name }
            | Self::Deleted { name }
            | Self::AlreadyAbsent { name } => name,
        }
    }
}

/// Drives the managed resource towards a descriptor.
///
/// Each call fetches live state and issues at most one create, update, or
/// delete. No retries happen inside a call; a failed call is retried by the
/// next delivery of the same content. Callers serialize calls for the same
/// resource name.
pub struct Reconciler {
    /// Orchestrator API.
    api: Arc<dyn ResourceApi>,
    /// Typed/untyped translation.
    codecs: Arc<CodecRegistry>,
    /// Configuration.
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        api: Arc<dyn ResourceApi>,
        codecs: Arc<CodecRegistry>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            api,
            codecs,
            config,
        }
    }

    /// Create a reconciler with the default codecs.
    pub fn with_default_codecs(api: Arc<dyn ResourceApi>, config: ReconcilerConfig) -> Self {
        Self::new(api, Arc::new(CodecRegistry::with_defaults()), config)
    }

    /// Start building a reconciler.
    pub fn builder() -> ReconcilerBuilder {
        ReconcilerBuilder::new()
    }

    /// Reconcile the managed resource towards `desired`.
    ///
    /// Fetch → not found → create; fetch → found → merge metadata and update.
    /// A delete intent instead deletes a found resource and treats a missing
    /// one as done.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResourceKind`] before any API call when the
    /// discriminator has no codec, [`Error::InvalidDescriptor`] when no object
    /// name can be resolved, and [`Error::Api`] unchanged for any fetch or
    /// mutation failure other than not-found.
    pub async fn reconcile(&self, desired: &ManagedResourceDescriptor) -> Result<ReconcileOutcome> {
        let locator = self.locator(desired)?;

        info!(
            resource = %desired.resource(),
            namespace = %locator.namespace,
            name = %locator.name,
            operation = %desired.operation(),
            "Starting reconciliation"
        );

        let outcome = match desired.operation() {
            Operation::Create | Operation::Update => {
                let object = self.compose(desired, &locator)?;
                match self.fetch(&locator).await? {
                    None => self.create(&locator, &object).await?,
                    Some(live) => self.update(&locator, object, &live).await?,
                }
            }
            Operation::Delete => match self.fetch(&locator).await? {
                None => ReconcileOutcome::AlreadyAbsent {
                    name: locator.name.clone(),
                },
                Some(_) => self.delete(&locator).await?,
            },
        };

        info!(outcome = ?outcome, "Reconciliation complete");
        Ok(outcome)
    }

    /// Resolve the full object address of a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownResourceKind`] if the discriminator has no
    /// codec and [`Error::InvalidDescriptor`] if no name can be resolved.
    pub fn locator(&self, desired: &ManagedResourceDescriptor) -> Result<ResourceLocator> {
        let codec = self.codecs.lookup(desired.resource())?;
        let name = desired
            .name()
            .ok_or_else(|| Error::invalid_descriptor("descriptor names no object"))?;
        let gvr = desired.gvr();

        Ok(ResourceLocator {
            group: gvr.group.clone(),
            version: gvr.version.clone(),
            kind: codec.kind().to_string(),
            plural: gvr.resource.clone(),
            namespace: desired
                .namespace()
                .unwrap_or(&self.config.default_namespace)
                .to_string(),
            name: name.to_string(),
        })
    }

    /// Encode the desired object and pin it to the locator's namespace.
    fn compose(
        &self,
        desired: &ManagedResourceDescriptor,
        locator: &ResourceLocator,
    ) -> Result<DynamicObject> {
        let mut object = self.codecs.encode(desired)?;
        object.metadata.name = Some(locator.name.clone());
        object.metadata.namespace = Some(locator.namespace.clone());
        Ok(object)
    }

    /// Read live state; not-found is `Ok(None)`.
    async fn fetch(&self, locator: &ResourceLocator) -> Result<Option<DynamicObject>> {
        match self.api.get(locator).await {
            Ok(live) => {
                debug!(
                    name = %locator.name,
                    resource_version = live.metadata.resource_version.as_deref().unwrap_or_default(),
                    "Found live resource"
                );
                Ok(Some(live))
            }
            Err(ApiError::NotFound { .. }) => {
                debug!(name = %locator.name, "Resource not found");
                Ok(None)
            }
            Err(e) => {
                warn!(name = %locator.name, error = %e, "Fetch failed");
                Err(e.into())
            }
        }
    }

    async fn create(
        &self,
        locator: &ResourceLocator,
        object: &DynamicObject,
    ) -> Result<ReconcileOutcome> {
        debug!(name = %locator.name, "Creating resource");
        let created = self.api.create(locator, object).await?;
        let name = created.metadata.name.unwrap_or_else(|| locator.name.clone());
        info!(name = %name, "Created resource");
        Ok(ReconcileOutcome::Created { name })
    }

    async fn update(
        &self,
        locator: &ResourceLocator,
        mut object: DynamicObject,
        live: &DynamicObject,
    ) -> Result<ReconcileOutcome> {
        debug!(name = %locator.name, "Updating resource");
        object.metadata = merge_metadata(&object.metadata, &live.metadata);
        let updated = self.api.update(locator, &object).await?;
        let name = updated.metadata.name.unwrap_or_else(|| locator.name.clone());
        info!(name = %name, "Updated resource");
        Ok(ReconcileOutcome::Updated { name })
    }

    async fn delete(&self, locator: &ResourceLocator) -> Result<ReconcileOutcome> {
        debug!(name = %locator.name, "Deleting resource");
        self.api.delete(locator).await?;
        info!(name = %locator.name, "Deleted resource");
        Ok(ReconcileOutcome::Deleted {
            name: locator.name.clone(),
        })
    }

    /// Get the codec registry.
    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    /// Get the configuration.
    pub const fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("codecs", &self.codecs)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    api: Option<Arc<dyn ResourceApi>>,
    codecs: Option<Arc<CodecRegistry>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            api: None,
            codecs: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the orchestrator API.
    #[must_use]
    pub fn with_api(mut self, api: Arc<dyn ResourceApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Set a custom codec registry.
    #[must_use]
    pub fn with_codecs(mut self, codecs: Arc<CodecRegistry>) -> Self {
        self.codecs = Some(codecs);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default namespace.
    #[must_use]
    pub fn default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.default_namespace = namespace.into();
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if no API was set or the default
    /// namespace is empty.
    pub fn build(self) -> Result<Reconciler> {
        let api = self
            .api
            .ok_or_else(|| Error::invalid_config("orchestrator API is required"))?;

        if self.config.default_namespace.is_empty() {
            return Err(Error::invalid_config("default namespace must not be empty"));
        }

        let codecs = self
            .codecs
            .unwrap_or_else(|| Arc::new(CodecRegistry::with_defaults()));

        Ok(Reconciler::new(api, codecs, self.config))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
