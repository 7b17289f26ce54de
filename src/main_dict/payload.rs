//! The nested main-dictionary payload and its splice operation.
//!
//! For a token `t`, spec.md §3 defines the payload as:
//!
//! ```text
//! [ (action_type, [ (attr_subtype, [ (attr_value, [ (package_id, positions) ]) ]) ]) ]
//! ```
//!
//! Each level is an association list keyed by equality, recursing into its
//! sublist; the bottom level concatenates position lists instead of
//! recursing further. Rather than a generic dynamic tree (Design Notes
//! explicitly warn against that), each level keeps its own key/value types
//! — [`ActionEntry`], [`SubtypeEntry`], [`ValueEntry`], [`PackageEntry`] —
//! and [`merge_assoc`] is the single recursive shape all four levels share,
//! parameterized by how to merge one level's values.

/// A package id, assigned densely by [`crate::aux::manifest_table::ManifestTable`].
pub type PackageId = u32;

/// A byte offset (or opaque location token) within a manifest.
pub type Position = u64;

/// A search token: a non-empty byte string, compared lexicographically.
pub type Token = Vec<u8>;

/// Leaf of the payload: one package's occurrence positions for a given
/// `(action_type, attr_subtype, attr_value)`.
pub type PackageEntry = (PackageId, Vec<Position>);

/// `attr_value -> [(package_id, positions)]`
pub type ValueEntry = (Vec<u8>, Vec<PackageEntry>);

/// `attr_subtype -> [(attr_value, ...)]`
pub type SubtypeEntry = (Vec<u8>, Vec<ValueEntry>);

/// `action_type -> [(attr_subtype, ...)]`
pub type ActionEntry = (Vec<u8>, Vec<SubtypeEntry>);

/// The full per-token payload: `[(action_type, ...)]`.
pub type Payload = Vec<ActionEntry>;

/// Merge `right` into `left` in place: entries whose key already exists in
/// `left` are merged via `merge_value`; entries whose key is new are
/// appended, in the order they appeared in `right`. `left`'s existing
/// relative order is otherwise untouched.
///
/// This is the one recursive shape every payload level shares (Design
/// Notes: "give splice a single recursive definition over that variant").
pub fn merge_assoc<K: PartialEq, V>(
    left: &mut Vec<(K, V)>,
    right: Vec<(K, V)>,
    mut merge_value: impl FnMut(&mut V, V),
) {
    let mut fresh = Vec::new();
    for (key, value) in right {
        match left.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => merge_value(existing, value),
            None => fresh.push((key, value)),
        }
    }
    left.extend(fresh);
}

/// Splice `right` into `left`, recursing through all four payload levels
/// down to concatenating position lists at the leaf (spec.md §4.5).
/// Duplicate `(package_id, position)` pairs are not de-duplicated.
pub fn splice_payload(left: &mut Payload, right: Payload) {
    merge_assoc(left, right, splice_subtypes);
}

fn splice_subtypes(left: &mut Vec<SubtypeEntry>, right: Vec<SubtypeEntry>) {
    merge_assoc(left, right, splice_values);
}

fn splice_values(left: &mut Vec<ValueEntry>, right: Vec<ValueEntry>) {
    merge_assoc(left, right, splice_packages);
}

fn splice_packages(left: &mut Vec<PackageEntry>, right: Vec<PackageEntry>) {
    merge_assoc(left, right, |positions: &mut Vec<Position>, more| positions.extend(more));
}

/// Build a single-package, single-value, single-subtype, single-action
/// payload — the shape one manifest-search-dict key produces (spec.md
/// §4.6 step 3d).
pub fn singleton_payload(
    action_type: Vec<u8>,
    attr_subtype: Vec<u8>,
    attr_value: Vec<u8>,
    package_id: PackageId,
    positions: Vec<Position>,
) -> Payload {
    vec![(
        action_type,
        vec![(attr_subtype, vec![(attr_value, vec![(package_id, positions)])])],
    )]
}

/// Walk every `(package_id, …)` leaf in a payload.
pub fn package_ids(payload: &Payload) -> impl Iterator<Item = PackageId> + '_ {
    payload
        .iter()
        .flat_map(|(_, subtypes)| subtypes.iter())
        .flat_map(|(_, values)| values.iter())
        .flat_map(|(_, packages)| packages.iter())
        .map(|(pid, _)| *pid)
}

/// Distinct action types present in a payload, in first-seen order
/// (spec.md §4.9: side-index offsets are appended once per distinct key
/// per emitted line).
pub fn distinct_action_types(payload: &Payload) -> Vec<&[u8]> {
    payload.iter().map(|(at, _)| at.as_slice()).collect()
}

/// Distinct attr subtypes present in a payload, in first-seen order,
/// deduplicated across action types.
pub fn distinct_attr_subtypes(payload: &Payload) -> Vec<&[u8]> {
    let mut seen = Vec::new();
    for (_, subtypes) in payload {
        for (st, _) in subtypes {
            if !seen.iter().any(|s: &&[u8]| *s == st.as_slice()) {
                seen.push(st.as_slice());
            }
        }
    }
    seen
}

/// Retain only leaves whose package id passes `keep`; drop any subtype /
/// attr_value / action_type branch left empty as a result. Used by the
/// merge pass to honor deferred removals (spec.md §4.6 step 5).
pub fn filter_packages(payload: &mut Payload, mut keep: impl FnMut(PackageId) -> bool) {
    payload.retain_mut(|(_at, subtypes)| {
        subtypes.retain_mut(|(_st, values)| {
            values.retain_mut(|(_fv, packages)| {
                packages.retain(|(pid, _)| keep(*pid));
                !packages.is_empty()
            });
            !values.is_empty()
        });
        !subtypes.is_empty()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(name: &str) -> Vec<u8> {
        name.as_bytes().to_vec()
    }

    #[test]
    fn splice_appends_new_leaf_package() {
        let mut left = singleton_payload(at("file"), at("basename"), at("foo"), 1, vec![42]);
        let right = singleton_payload(at("file"), at("basename"), at("foo"), 2, vec![7]);
        splice_payload(&mut left, right);

        assert_eq!(left.len(), 1);
        let packages = &left[0].1[0].1[0].1;
        assert_eq!(packages, &vec![(1, vec![42]), (2, vec![7])]);
    }

    #[test]
    fn splice_concatenates_same_package_positions() {
        let mut left = singleton_payload(at("file"), at("basename"), at("foo"), 1, vec![42]);
        let right = singleton_payload(at("file"), at("basename"), at("foo"), 1, vec![99]);
        splice_payload(&mut left, right);

        let packages = &left[0].1[0].1[0].1;
        assert_eq!(packages, &vec![(1, vec![42, 99])]);
    }

    #[test]
    fn splice_with_empty_is_identity() {
        let left0 = singleton_payload(at("file"), at("basename"), at("foo"), 1, vec![42]);
        let mut left = left0.clone();
        splice_payload(&mut left, Payload::new());
        assert_eq!(left, left0);

        let mut empty = Payload::new();
        splice_payload(&mut empty, left0.clone());
        assert_eq!(empty, left0);
    }

    #[test]
    fn splice_is_associative_up_to_append_order() {
        let a = singleton_payload(at("file"), at("basename"), at("foo"), 1, vec![1]);
        let b = singleton_payload(at("file"), at("basename"), at("foo"), 2, vec![2]);
        let c = singleton_payload(at("dir"), at("path"), at("bar"), 3, vec![3]);

        let mut left_assoc = a.clone();
        splice_payload(&mut left_assoc, b.clone());
        splice_payload(&mut left_assoc, c.clone());

        let mut bc = b;
        splice_payload(&mut bc, c);
        let mut right_assoc = a;
        splice_payload(&mut right_assoc, bc);

        assert_eq!(left_assoc, right_assoc);
    }

    #[test]
    fn filter_packages_drops_empty_branches() {
        let mut payload = singleton_payload(at("file"), at("basename"), at("foo"), 1, vec![42]);
        filter_packages(&mut payload, |pid| pid != 1);
        assert!(payload.is_empty());
    }

    #[test]
    fn filter_packages_keeps_surviving_siblings() {
        let mut payload = singleton_payload(at("file"), at("basename"), at("foo"), 1, vec![1]);
        let other = singleton_payload(at("file"), at("basename"), at("foo"), 2, vec![2]);
        splice_payload(&mut payload, other);

        filter_packages(&mut payload, |pid| pid != 1);
        let packages = &payload[0].1[0].1[0].1;
        assert_eq!(packages, &vec![(2, vec![2])]);
    }
}
