//! Orchestrator API trait and an in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use kube::core::DynamicObject;
use tokio::sync::{Mutex, RwLock};
use ulid::Ulid;

use crate::error::{ApiError, ApiResult};
use crate::types::ResourceLocator;

/// Generic/dynamic resource endpoint of the orchestrator.
///
/// Calls are single round trips; callers supply deadlines externally and
/// treat expiry as a failure of the call.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Read the object at `locator`; a missing object is [`ApiError::NotFound`].
    async fn get(&self, locator: &ResourceLocator) -> ApiResult<DynamicObject>;

    /// Create `object` in the locator's namespace.
    async fn create(
        &self,
        locator: &ResourceLocator,
        object: &DynamicObject,
    ) -> ApiResult<DynamicObject>;

    /// Replace the object at `locator` with `object`.
    async fn update(
        &self,
        locator: &ResourceLocator,
        object: &DynamicObject,
    ) -> ApiResult<DynamicObject>;

    /// Delete the object at `locator`.
    async fn delete(&self, locator: &ResourceLocator) -> ApiResult<()>;
}

/// API call kinds, for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    Get,
    Create,
    Update,
    Delete,
}

/// Snapshot of calls made against an [`InMemoryResourceApi`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiCalls {
    pub get: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl ApiCalls {
    /// Total number of calls.
    pub const fn total(&self) -> usize {
        self.get
            .saturating_add(self.create)
            .saturating_add(self.update)
            .saturating_add(self.delete)
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    get: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

impl CallCounters {
    fn bump(&self, operation: ApiOperation) {
        let counter = match operation {
            ApiOperation::Get => &self.get,
            ApiOperation::Create => &self.create,
            ApiOperation::Update => &self.update,
            ApiOperation::Delete => &self.delete,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> ApiCalls {
        ApiCalls {
            get: self.get.load(Ordering::SeqCst),
            create: self.create.load(Ordering::SeqCst),
            update: self.update.load(Ordering::SeqCst),
            delete: self.delete.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ObjectKey {
    group: String,
    plural: String,
    namespace: String,
    name: String,
}

impl From<&ResourceLocator> for ObjectKey {
    fn from(locator: &ResourceLocator) -> Self {
        Self {
            group: locator.group.clone(),
            plural: locator.plural.clone(),
            namespace: locator.namespace.clone(),
            name: locator.name.clone(),
        }
    }
}

/// In-memory orchestrator for dry runs and testing.
///
/// Behaves like the API server where the reconciler can observe it: assigns
/// `uid` and `resourceVersion` on create, bumps `resourceVersion` and
/// `generation` on update, and rejects updates carrying a stale
/// `resourceVersion` or a foreign `uid` with [`ApiError::Conflict`].
#[derive(Debug, Default)]
pub struct InMemoryResourceApi {
    objects: RwLock<HashMap<ObjectKey, DynamicObject>>,
    failures: Mutex<HashMap<ApiOperation, VecDeque<ApiError>>>,
    calls: CallCounters,
    versions: AtomicU64,
}

impl InMemoryResourceApi {
    /// Create an empty in-memory orchestrator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty in-memory orchestrator wrapped in an Arc.
    pub fn new_arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Calls made so far.
    pub fn calls(&self) -> ApiCalls {
        self.calls.snapshot()
    }

    /// Make the next call of `operation` fail with `error`.
    pub async fn fail_next(&self, operation: ApiOperation, error: ApiError) {
        self.failures
            .lock()
            .await
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Insert an object as if it already existed, assigning server fields.
    pub async fn seed(&self, locator: &ResourceLocator, mut object: DynamicObject) -> DynamicObject {
        self.assign_identity(&mut object, locator);
        self.objects
            .write()
            .await
            .insert(ObjectKey::from(locator), object.clone());
        object
    }

    /// Current stored object, without counting a call.
    pub async fn object(&self, locator: &ResourceLocator) -> Option<DynamicObject> {
        self.objects
            .read()
            .await
            .get(&ObjectKey::from(locator))
            .cloned()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Whether no objects are stored.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    async fn enter(&self, operation: ApiOperation) -> ApiResult<()> {
        self.calls.bump(operation);
        let injected = self
            .failures
            .lock()
            .await
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        injected.map_or(Ok(()), Err)
    }

    fn next_version(&self) -> String {
        self.versions
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1)
            .to_string()
    }

    fn assign_identity(&self, object: &mut DynamicObject, locator: &ResourceLocator) {
        object.metadata.name = Some(locator.name.clone());
        object.metadata.namespace = Some(locator.namespace.clone());
        object.metadata.uid = Some(Ulid::new().to_string().to_lowercase());
        object.metadata.resource_version = Some(self.next_version());
        object.metadata.generation = Some(1);
    }

    fn not_found(locator: &ResourceLocator) -> ApiError {
        ApiError::not_found(&locator.kind, &locator.namespace, &locator.name)
    }
}

#[async_trait]
impl ResourceApi for InMemoryResourceApi {
    async fn get(&self, locator: &ResourceLocator) -> ApiResult<DynamicObject> {
        self.enter(ApiOperation::Get).await?;
        self.object(locator)
            .await
            .ok_or_else(|| Self::not_found(locator))
    }

    async fn create(
        &self,
        locator: &ResourceLocator,
        object: &DynamicObject,
    ) -> ApiResult<DynamicObject> {
        self.enter(ApiOperation::Create).await?;

        let mut objects = self.objects.write().await;
        let key = ObjectKey::from(locator);
        if objects.contains_key(&key) {
            return Err(ApiError::conflict(&locator.name, "already exists"));
        }

        let mut created = object.clone();
        self.assign_identity(&mut created, locator);
        objects.insert(key, created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        locator: &ResourceLocator,
        object: &DynamicObject,
    ) -> ApiResult<DynamicObject> {
        self.enter(ApiOperation::Update).await?;

        let mut objects = self.objects.write().await;
        let key = ObjectKey::from(locator);
        let Some(stored) = objects.get(&key) else {
            return Err(Self::not_found(locator));
        };

        if let Some(version) = object.metadata.resource_version.as_deref() {
            if stored.metadata.resource_version.as_deref() != Some(version) {
                return Err(ApiError::conflict(
                    &locator.name,
                    format!("stale resourceVersion {version}"),
                ));
            }
        }
        if let Some(uid) = object.metadata.uid.as_deref() {
            if stored.metadata.uid.as_deref() != Some(uid) {
                return Err(ApiError::conflict(&locator.name, "uid precondition failed"));
            }
        }

        let mut updated = object.clone();
        updated.metadata.uid.clone_from(&stored.metadata.uid);
        updated
            .metadata
            .creation_timestamp
            .clone_from(&stored.metadata.creation_timestamp);
        updated.metadata.resource_version = Some(self.next_version());
        updated.metadata.generation = Some(
            stored
                .metadata
                .generation
                .unwrap_or_default()
                .saturating_add(1),
        );

        objects.insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, locator: &ResourceLocator) -> ApiResult<()> {
        self.enter(ApiOperation::Delete).await?;
        self.objects
            .write()
            .await
            .remove(&ObjectKey::from(locator))
            .map(|_| ())
            .ok_or_else(|| Self::not_found(locator))
    }
}
