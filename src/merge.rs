use std::collections::BTreeMap;

/// Apply `patch` on top of `current`. Patch keys win; every other key in
/// `current` is kept as-is. An absent configuration merges as empty.
pub fn merge_config(
    current: Option<BTreeMap<String, String>>,
    patch: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = current.unwrap_or_default();
    merged.extend(patch.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
