//! Merging desired metadata onto live metadata across an update.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

/// Field values that count as "specified" only when non-empty.
trait Specified {
    fn is_specified(&self) -> bool;
}

impl Specified for String {
    fn is_specified(&self) -> bool {
        !self.is_empty()
    }
}

impl<K, V> Specified for BTreeMap<K, V> {
    fn is_specified(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Specified for Vec<T> {
    fn is_specified(&self) -> bool {
        !self.is_empty()
    }
}

impl Specified for i64 {
    fn is_specified(&self) -> bool {
        true
    }
}

impl Specified for Time {
    fn is_specified(&self) -> bool {
        true
    }
}

/// Replace `target` with `desired` when `desired` is present and non-empty.
fn overlay<T: Specified + Clone>(target: &mut Option<T>, desired: Option<&T>) {
    if let Some(value) = desired.filter(|v| v.is_specified()) {
        *target = Some(value.clone());
    }
}

/// Merge the metadata of a newly composed object onto the live object's
/// metadata.
///
/// The live metadata is the base, so server-assigned fields (`uid`,
/// `resourceVersion`, `creationTimestamp`, ...) survive unless the desired
/// metadata carries a non-empty value for them. The merge is shallow: map
/// and list fields such as `labels` or `ownerReferences` are replaced
/// wholesale, never spliced.
pub fn merge_metadata(desired: &ObjectMeta, live: &ObjectMeta) -> ObjectMeta {
    let mut merged = live.clone();

    overlay(&mut merged.name, desired.name.as_ref());
    overlay(&mut merged.namespace, desired.namespace.as_ref());
    overlay(&mut merged.generate_name, desired.generate_name.as_ref());
    overlay(&mut merged.labels, desired.labels.as_ref());
    overlay(&mut merged.annotations, desired.annotations.as_ref());
    overlay(&mut merged.owner_references, desired.owner_references.as_ref());
    overlay(&mut merged.finalizers, desired.finalizers.as_ref());
    overlay(&mut merged.resource_version, desired.resource_version.as_ref());
    overlay(&mut merged.uid, desired.uid.as_ref());
    overlay(&mut merged.generation, desired.generation.as_ref());
    overlay(&mut merged.creation_timestamp, desired.creation_timestamp.as_ref());
    overlay(&mut merged.deletion_timestamp, desired.deletion_timestamp.as_ref());
    overlay(
        &mut merged.deletion_grace_period_seconds,
        desired.deletion_grace_period_seconds.as_ref(),
    );
    overlay(&mut merged.managed_fields, desired.managed_fields.as_ref());
    overlay(&mut merged.self_link, desired.self_link.as_ref());

    merged
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_desired_labels_win_and_server_fields_survive() {
        let live = ObjectMeta {
            name: Some("x".to_string()),
            resource_version: Some("5".to_string()),
            labels: labels(&[("a", "1")]),
            ..ObjectMeta::default()
        };
        let desired = ObjectMeta {
            name: Some(String::new()),
            resource_version: Some(String::new()),
            labels: labels(&[("a", "2"), ("b", "3")]),
            ..ObjectMeta::default()
        };

        let merged = merge_metadata(&desired, &live);

        assert_eq!(merged.name.as_deref(), Some("x"));
        assert_eq!(merged.resource_version.as_deref(), Some("5"));
        assert_eq!(merged.labels, labels(&[("a", "2"), ("b", "3")]));
    }

    #[test]
    fn test_uid_never_replaced_by_absent_value() {
        let live = ObjectMeta {
            uid: Some("d9607e19-f88f-11e6-a518-42010a800195".to_string()),
            generation: Some(4),
            ..ObjectMeta::default()
        };

        let merged = merge_metadata(&ObjectMeta::default(), &live);

        assert_eq!(merged, live);
    }

    #[test]
    fn test_lists_are_replaced_not_spliced() {
        let owner = |name: &str| OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: name.to_string(),
            uid: format!("uid-{name}"),
            ..OwnerReference::default()
        };
        let live = ObjectMeta {
            owner_references: Some(vec![owner("old-a"), owner("old-b")]),
            ..ObjectMeta::default()
        };
        let desired = ObjectMeta {
            owner_references: Some(vec![owner("new")]),
            ..ObjectMeta::default()
        };

        let merged = merge_metadata(&desired, &live);

        assert_eq!(merged.owner_references, Some(vec![owner("new")]));
    }

    #[test]
    fn test_empty_map_keeps_live_annotations() {
        let live = ObjectMeta {
            annotations: labels(&[("note", "kept")]),
            ..ObjectMeta::default()
        };
        let desired = ObjectMeta {
            annotations: Some(BTreeMap::new()),
            ..ObjectMeta::default()
        };

        let merged = merge_metadata(&desired, &live);

        assert_eq!(merged.annotations, labels(&[("note", "kept")]));
    }
}
