//! Kubernetes-backed [`ResourceApi`] over the dynamic object endpoint.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use tracing::debug;

use crate::api::ResourceApi;
use crate::error::{ApiError, ApiResult};
use crate::types::ResourceLocator;

/// Dynamic-client access to the cluster the agent runs in.
#[derive(Clone)]
pub struct KubeResourceApi {
    client: Client,
}

impl KubeResourceApi {
    /// Wrap an existing client.
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the in-cluster service account, falling back to
    /// the local kubeconfig.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if no usable configuration is found.
    pub async fn try_default() -> ApiResult<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| ApiError::transport(format!("cannot build cluster client: {e}")))?;
        Ok(Self::new(client))
    }

    fn api(&self, locator: &ResourceLocator) -> Api<DynamicObject> {
        let gvk = GroupVersionKind::gvk(&locator.group, &locator.version, &locator.kind);
        let resource = ApiResource::from_gvk_with_plural(&gvk, &locator.plural);
        Api::namespaced_with(self.client.clone(), &locator.namespace, &resource)
    }
}

impl std::fmt::Debug for KubeResourceApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceApi").finish_non_exhaustive()
    }
}

/// Map a client error onto the API error taxonomy.
fn classify(err: kube::Error, locator: &ResourceLocator) -> ApiError {
    match err {
        kube::Error::Api(response) => match response.code {
            404 => ApiError::not_found(&locator.kind, &locator.namespace, &locator.name),
            409 => ApiError::conflict(&locator.name, response.message),
            code => ApiError::rejected(code, response.message),
        },
        other => ApiError::transport(other.to_string()),
    }
}

#[async_trait]
impl ResourceApi for KubeResourceApi {
    async fn get(&self, locator: &ResourceLocator) -> ApiResult<DynamicObject> {
        debug!(%locator, "Get resource");
        self.api(locator)
            .get(&locator.name)
            .await
            .map_err(|e| classify(e, locator))
    }

    async fn create(
        &self,
        locator: &ResourceLocator,
        object: &DynamicObject,
    ) -> ApiResult<DynamicObject> {
        debug!(%locator, "Create resource");
        self.api(locator)
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| classify(e, locator))
    }

    async fn update(
        &self,
        locator: &ResourceLocator,
        object: &DynamicObject,
    ) -> ApiResult<DynamicObject> {
        debug!(%locator, "Replace resource");
        self.api(locator)
            .replace(&locator.name, &PostParams::default(), object)
            .await
            .map_err(|e| classify(e, locator))
    }

    async fn delete(&self, locator: &ResourceLocator) -> ApiResult<()> {
        debug!(%locator, "Delete resource");
        self.api(locator)
            .delete(&locator.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| classify(e, locator))
    }
}
