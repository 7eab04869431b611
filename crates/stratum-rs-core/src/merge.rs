//! Deep merge and dotted-path helpers for raw layers.

use crate::error::ResolveError;
use crate::value::{RawMap, RawValue};

/// Merge overlay values into the base, recursively overriding mappings.
///
/// Anything that is not a mapping on both sides, sequences included, is
/// replaced wholesale by the overlay.
pub fn deep_merge(base: &mut RawValue, overlay: &RawValue) {
    if let (Some(target), Some(source)) = (base.as_object_mut(), overlay.as_object()) {
        for (key, incoming) in source {
            match target.get_mut(key) {
                Some(current) => deep_merge(current, incoming),
                None => {
                    target.insert(key.clone(), incoming.clone());
                }
            }
        }
        return;
    }
    *base = overlay.clone();
}

/// Merge layers onto an empty mapping, lowest precedence first.
pub fn merge_all<'l, I>(layers: I) -> RawValue
where
    I: IntoIterator<Item = &'l RawValue>,
{
    let mut merged = RawValue::Object(RawMap::new());
    for layer in layers {
        deep_merge(&mut merged, layer);
    }
    merged
}

/// Build a nested mapping from `(dotted.key, value)` entries.
///
/// A repeated key keeps its last value. A key that addresses a field inside
/// a value another key set as a non-mapping is a conflict.
pub fn unflatten<I, K>(entries: I) -> Result<RawMap, ResolveError>
where
    I: IntoIterator<Item = (K, RawValue)>,
    K: AsRef<str>,
{
    let mut root = RawMap::new();
    for (key, value) in entries {
        let key = key.as_ref();
        let segments: Vec<&str> = key.split('.').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(ResolveError::InvalidOverrideKey {
                key: key.to_string(),
            });
        }
        let (leaf, parents) = match segments.split_last() {
            Some(split) => split,
            None => continue,
        };

        let mut node = &mut root;
        for (depth, segment) in parents.iter().enumerate() {
            let slot = node
                .entry(segment.to_string())
                .or_insert_with(|| RawValue::Object(RawMap::new()));
            node = match slot {
                RawValue::Object(map) => map,
                _ => {
                    return Err(ResolveError::ConflictingOverride {
                        key: key.to_string(),
                        prefix: segments[..=depth].join("."),
                    });
                }
            };
        }
        if let Some(RawValue::Object(existing)) = node.get(*leaf) {
            if !existing.is_empty() && !value.is_object() {
                return Err(ResolveError::ConflictingOverride {
                    key: key.to_string(),
                    prefix: key.to_string(),
                });
            }
        }
        node.insert(leaf.to_string(), value);
    }
    Ok(root)
}

/// Flatten a nested mapping into `(dotted.key, leaf)` pairs in document order.
///
/// Empty mappings are kept as leaves so that unflattening restores them.
pub fn flatten(map: &RawMap) -> Vec<(String, RawValue)> {
    let mut entries = Vec::new();
    flatten_into(&mut entries, "", map);
    entries
}

fn flatten_into(entries: &mut Vec<(String, RawValue)>, prefix: &str, map: &RawMap) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            RawValue::Object(nested) if !nested.is_empty() => flatten_into(entries, &path, nested),
            leaf => entries.push((path, leaf.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{deep_merge, flatten, merge_all, unflatten};
    use crate::error::ResolveError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_mappings_merge_key_by_key() {
        let mut base = json!({ "compute": { "workers": 8 }, "name": "file" });
        deep_merge(&mut base, &json!({ "compute": { "eval_workers": 2 } }));

        assert_eq!(
            base,
            json!({ "compute": { "workers": 8, "eval_workers": 2 }, "name": "file" })
        );
    }

    #[test]
    fn sequences_and_scalars_are_replaced() {
        let merged = merge_all([
            &json!({ "ids": [1, 2, 3], "mode": { "fast": true } }),
            &json!({ "ids": [9], "mode": "slow" }),
        ]);

        assert_eq!(merged, json!({ "ids": [9], "mode": "slow" }));
        assert_eq!(merge_all(Vec::<&serde_json::Value>::new()), json!({}));
    }

    #[test]
    fn unflatten_nests_dotted_keys() {
        let tree = unflatten([
            ("compute.eval_workers", json!(2)),
            ("compute.workers", json!(4)),
            ("name", json!("cli")),
            ("name", json!("last")),
        ])
        .expect("tree");

        assert_eq!(
            serde_json::Value::Object(tree),
            json!({ "compute": { "eval_workers": 2, "workers": 4 }, "name": "last" })
        );
    }

    #[test]
    fn unflatten_rejects_conflicts_and_empty_segments() {
        let err = unflatten([("a", json!(1)), ("a.b", json!(2))]).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::ConflictingOverride { ref prefix, .. } if prefix == "a"
        ));

        let err = unflatten([("a.b", json!(2)), ("a", json!(1))]).unwrap_err();
        assert!(matches!(err, ResolveError::ConflictingOverride { .. }));

        let err = unflatten([("a..b", json!(1))]).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidOverrideKey { .. }));
    }

    #[test]
    fn flatten_inverts_unflatten() {
        let tree = json!({ "log": { "exp_name": "x", "tags": [] }, "seed": 3, "extra": {} });
        let entries = flatten(tree.as_object().expect("mapping"));

        assert_eq!(
            entries,
            vec![
                ("log.exp_name".to_string(), json!("x")),
                ("log.tags".to_string(), json!([])),
                ("seed".to_string(), json!(3)),
                ("extra".to_string(), json!({})),
            ]
        );
        assert_eq!(
            serde_json::Value::Object(unflatten(entries).expect("tree")),
            tree
        );
    }
}
