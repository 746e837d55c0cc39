//! Reconciliation protocol tests against the in-memory orchestrator.
//!
//! Tests verify that:
//! - Fetch not-found leads to exactly one create and no update
//! - Fetch found leads to exactly one update and no create
//! - Server-assigned metadata survives an update
//! - API failures surface unchanged and nothing is retried inside a call

#![allow(clippy::panic)]

use std::collections::BTreeMap;
use std::sync::Arc;

use incluster_reconciler::{
    ApiError, ApiOperation, CodecRegistry, Error, InMemoryResourceApi, ManagedResourceDescriptor,
    OpenTelemetryCollector, Operation, ReconcileOutcome, Reconciler, ResourceBody,
    decode_descriptor,
};

/// Test helper: Unwrap a Result or panic with context
fn unwrap_result<T, E: std::fmt::Display>(result: std::result::Result<T, E>, context: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("{}: {}", context, e),
    }
}

/// Test helper: Unwrap an Option or panic with context
fn unwrap_option<T>(option: Option<T>, context: &str) -> T {
    match option {
        Some(value) => value,
        None => panic!("{}", context),
    }
}

fn setup() -> (Reconciler, Arc<InMemoryResourceApi>) {
    let api = InMemoryResourceApi::new_arc();
    let reconciler = unwrap_result(
        Reconciler::builder()
            .with_api(api.clone())
            .default_namespace("observability")
            .build(),
        "builder should succeed",
    );
    (reconciler, api)
}

fn collector(config: &str) -> ManagedResourceDescriptor {
    let mut collector = OpenTelemetryCollector::new("otel-gateway", config);
    collector.metadata.labels = Some(BTreeMap::from([("a".to_string(), "1".to_string())]));
    ManagedResourceDescriptor::collector(Operation::Create, collector)
}

#[cfg(test)]
mod branching_tests {
    use super::*;

    #[tokio::test]
    async fn absent_resource_is_created_once() {
        // GIVEN: an empty cluster
        let (reconciler, api) = setup();

        // WHEN: a collector is reconciled
        let outcome = unwrap_result(
            reconciler.reconcile(&collector("receivers: {}")).await,
            "reconcile should succeed",
        );

        // THEN: exactly one create and no update happened
        assert_eq!(
            outcome,
            ReconcileOutcome::Created {
                name: "otel-gateway".to_string()
            }
        );
        let calls = api.calls();
        assert_eq!(calls.get, 1);
        assert_eq!(calls.create, 1);
        assert_eq!(calls.update, 0);
    }

    #[tokio::test]
    async fn present_resource_is_updated_once() {
        // GIVEN: the collector already exists
        let (reconciler, api) = setup();
        unwrap_result(
            reconciler.reconcile(&collector("receivers: {}")).await,
            "initial create should succeed",
        );

        // WHEN: a changed configuration is reconciled
        let outcome = unwrap_result(
            reconciler
                .reconcile(&collector("receivers:\n  otlp: {}\n"))
                .await,
            "update should succeed",
        );

        // THEN: the second call updated without creating
        assert!(matches!(outcome, ReconcileOutcome::Updated { .. }));
        let calls = api.calls();
        assert_eq!(calls.create, 1);
        assert_eq!(calls.update, 1);
    }

    #[tokio::test]
    async fn update_intent_on_absent_resource_creates() {
        let (reconciler, api) = setup();
        let mut desired = collector("receivers: {}");
        desired.resource_info.operation_info.operation = Operation::Update;

        let outcome = unwrap_result(reconciler.reconcile(&desired).await, "reconcile");

        assert!(matches!(outcome, ReconcileOutcome::Created { .. }));
        assert_eq!(api.calls().update, 0);
    }
}

#[cfg(test)]
mod metadata_tests {
    use super::*;

    #[tokio::test]
    async fn update_keeps_server_identity_and_applies_labels() {
        let (reconciler, api) = setup();
        let first = collector("receivers: {}");
        unwrap_result(reconciler.reconcile(&first).await, "create");

        let locator = unwrap_result(reconciler.locator(&first), "locator");
        let before = unwrap_option(api.object(&locator).await, "object should exist");

        // Desired carries new labels and no server fields
        let mut second = collector("receivers:\n  otlp: {}\n");
        let ResourceBody::OpenTelemetryCollector(body) = &mut second.body;
        body.metadata.labels = Some(BTreeMap::from([
            ("a".to_string(), "2".to_string()),
            ("b".to_string(), "3".to_string()),
        ]));
        unwrap_result(reconciler.reconcile(&second).await, "update");

        let after = unwrap_option(api.object(&locator).await, "object should still exist");
        assert_eq!(after.metadata.uid, before.metadata.uid);
        assert_eq!(
            after.metadata.labels,
            Some(BTreeMap::from([
                ("a".to_string(), "2".to_string()),
                ("b".to_string(), "3".to_string()),
            ]))
        );
        assert_eq!(after.data["spec"]["config"], "receivers:\n  otlp: {}\n");
    }

    #[tokio::test]
    async fn live_object_decodes_to_the_desired_body() {
        let (reconciler, api) = setup();
        let desired = collector("receivers: {}");
        unwrap_result(reconciler.reconcile(&desired).await, "create");

        let locator = unwrap_result(reconciler.locator(&desired), "locator");
        let live = unwrap_option(api.object(&locator).await, "object should exist");
        let body = unwrap_result(
            CodecRegistry::with_defaults().decode(desired.resource(), &live),
            "live object should decode",
        );

        let ResourceBody::OpenTelemetryCollector(collector) = body;
        assert_eq!(collector.spec.config, "receivers: {}");
        assert_eq!(collector.metadata.namespace.as_deref(), Some("observability"));
        assert!(collector.metadata.uid.is_some());
    }
}

#[cfg(test)]
mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn fetch_failure_surfaces_unchanged() {
        let (reconciler, api) = setup();
        api.fail_next(ApiOperation::Get, ApiError::rejected(403, "forbidden"))
            .await;

        let result = reconciler.reconcile(&collector("receivers: {}")).await;

        assert_eq!(
            result,
            Err(Error::Api(ApiError::rejected(403, "forbidden")))
        );
        assert_eq!(api.calls().create, 0);
    }

    #[tokio::test]
    async fn create_failure_is_not_retried_within_the_call() {
        let (reconciler, api) = setup();
        api.fail_next(ApiOperation::Create, ApiError::transport("connection reset"))
            .await;

        let result = reconciler.reconcile(&collector("receivers: {}")).await;

        assert!(matches!(result, Err(Error::Api(ApiError::Transport { .. }))));
        assert_eq!(api.calls().create, 1);
        assert!(api.is_empty().await);
    }

    #[tokio::test]
    async fn update_conflict_surfaces_as_api_error() {
        let (reconciler, api) = setup();
        unwrap_result(
            reconciler.reconcile(&collector("receivers: {}")).await,
            "create",
        );
        api.fail_next(
            ApiOperation::Update,
            ApiError::conflict("otel-gateway", "the object has been modified"),
        )
        .await;

        let result = reconciler.reconcile(&collector("exporters: {}")).await;

        assert!(matches!(result, Err(Error::Api(ApiError::Conflict { .. }))));
        assert_eq!(api.calls().update, 1);
    }
}

#[cfg(test)]
mod payload_tests {
    use super::*;

    #[tokio::test]
    async fn json_payload_reconciles_end_to_end() {
        let (reconciler, api) = setup();
        let payload = br#"{
            "operationInfo": {"name": "hello-world", "operation": 1, "namespace": "default"},
            "groupVersionResource": {
                "group": "opentelemetry.io",
                "version": "v1alpha1",
                "resource": "opentelemetrycollectors"
            },
            "openTelemetryCollector": {
                "spec": {
                    "mode": "deployment",
                    "replicas": 1,
                    "config": "receivers:\n  otlp:\n    protocols:\n      grpc: {}\n"
                }
            }
        }"#;

        let desired = unwrap_result(
            decode_descriptor(payload, "application/json"),
            "payload should decode",
        );
        let outcome = unwrap_result(reconciler.reconcile(&desired).await, "reconcile");

        assert_eq!(outcome.name(), "hello-world");
        let locator = unwrap_result(reconciler.locator(&desired), "locator");
        assert_eq!(locator.namespace, "default");
        assert!(api.object(&locator).await.is_some());
    }

    #[tokio::test]
    async fn body_namespace_is_used_when_operation_names_none() {
        // GIVEN: a payload whose only namespace is in the collector metadata
        let (reconciler, api) = setup();
        let payload = br#"{
            "operationInfo": {"name": "otel-gateway", "operation": 1},
            "groupVersionResource": {
                "group": "opentelemetry.io",
                "version": "v1alpha1",
                "resource": "opentelemetrycollectors"
            },
            "openTelemetryCollector": {
                "metadata": {"namespace": "monitoring"},
                "spec": {"mode": "deployment", "config": "receivers: {}"}
            }
        }"#;
        let desired = unwrap_result(
            decode_descriptor(payload, "application/json"),
            "payload should decode",
        );

        // WHEN: it is reconciled
        unwrap_result(reconciler.reconcile(&desired).await, "reconcile");

        // THEN: the object lands in the body's namespace, not the default
        let locator = unwrap_result(reconciler.locator(&desired), "locator");
        assert_eq!(locator.namespace, "monitoring");
        let live = unwrap_option(api.object(&locator).await, "object should exist");
        assert_eq!(live.metadata.namespace.as_deref(), Some("monitoring"));
    }
}
