//! K8s-style reconciliation of remotely delivered configuration into a
//! single managed custom resource.
//!
//! - **Descriptor**: a typed [`ManagedResourceDescriptor`] decoded from a
//!   JSON or YAML payload
//! - **Codec**: the [`CodecRegistry`] translates between typed bodies and the
//!   orchestrator's untyped [`DynamicObject`](kube::core::DynamicObject)
//! - **Merge**: [`merge_metadata`] keeps server-assigned identity across
//!   updates
//! - **Reconcile**: the [`Reconciler`] fetches live state and issues exactly
//!   one create, update, or delete
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use incluster_reconciler::{decode_descriptor, InMemoryResourceApi, Reconciler};
//!
//! let reconciler = Reconciler::builder()
//!     .with_api(Arc::new(InMemoryResourceApi::new()))
//!     .default_namespace("observability")
//!     .build()?;
//!
//! let desired = decode_descriptor(payload, "application/yaml")?;
//! reconciler.reconcile(&desired).await?;
//! ```

pub mod api;
pub mod codec;
pub mod error;
pub mod kube_api;
pub mod metadata;
pub mod payload;
pub mod reconciler;
pub mod types;

pub use api::{ApiCalls, ApiOperation, InMemoryResourceApi, ResourceApi};
pub use codec::{CodecRegistry, CollectorCodec, ResourceCodec};
pub use error::{ApiError, ApiResult, Error, Result};
pub use kube_api::KubeResourceApi;
pub use metadata::merge_metadata;
pub use payload::{ContentType, decode_descriptor};
pub use reconciler::{ReconcileOutcome, Reconciler, ReconcilerBuilder, ReconcilerConfig};
pub use types::{
    CollectorMode, GroupVersionResource, ManagedResourceDescriptor, OpenTelemetryCollector,
    OpenTelemetryCollectorSpec, Operation, OperationInfo, ResourceBody, ResourceInfo,
    ResourceLocator, TargetAllocator, UpgradeStrategy,
};
