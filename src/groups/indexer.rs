//! Subgroup membership enumeration.

use std::collections::BTreeMap;

use super::{GroupKey, Grouping};
use crate::data::ProtectedAttributes;

/// Enumerate subgroup index sets over the protected attributes.
///
/// Returns `(key, indices)` entries in a deterministic order: marginal
/// groups iterate attributes in column order with values sorted within
/// each attribute; intersectional groups are sorted by their value
/// tuple. Indices within a group are ascending.
///
/// A single-valued attribute yields one group covering everyone; its
/// deviation from the population baseline is zero by construction,
/// which is expected, not an error.
pub fn group_indices(
    attrs: &ProtectedAttributes,
    grouping: Grouping,
) -> Vec<(GroupKey, Vec<usize>)> {
    match grouping {
        Grouping::Intersectional => {
            let mut combos: BTreeMap<Vec<String>, Vec<usize>> = BTreeMap::new();
            for row in 0..attrs.len() {
                let combo: Vec<String> = (0..attrs.n_attributes())
                    .map(|a| attrs.value(a, row).to_string())
                    .collect();
                combos.entry(combo).or_default().push(row);
            }
            combos
                .into_iter()
                .map(|(values, indices)| {
                    let pairs = attrs
                        .names()
                        .iter()
                        .cloned()
                        .zip(values)
                        .collect();
                    (GroupKey::new(pairs), indices)
                })
                .collect()
        }
        Grouping::Marginal => {
            let mut out = Vec::new();
            for (a, name) in attrs.names().iter().enumerate() {
                let mut by_value: BTreeMap<String, Vec<usize>> = BTreeMap::new();
                for row in 0..attrs.len() {
                    by_value
                        .entry(attrs.value(a, row).to_string())
                        .or_default()
                        .push(row);
                }
                for (value, indices) in by_value {
                    out.push((GroupKey::new(vec![(name.clone(), value)]), indices));
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    fn attrs() -> Result<ProtectedAttributes> {
        ProtectedAttributes::new(vec![
            (
                "race".to_string(),
                vec!["b".into(), "a".into(), "a".into(), "b".into()],
            ),
            (
                "sex".to_string(),
                vec!["f".into(), "f".into(), "m".into(), "f".into()],
            ),
        ])
    }

    #[test]
    fn intersectional_groups_partition_the_population() {
        let attrs = attrs().unwrap();
        let groups = group_indices(&attrs, Grouping::Intersectional);

        let mut seen = vec![false; attrs.len()];
        for (_, indices) in &groups {
            for &i in indices {
                assert!(!seen[i], "index {i} appears in two groups");
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn intersectional_keys_are_sorted_by_value_tuple() {
        let attrs = attrs().unwrap();
        let groups = group_indices(&attrs, Grouping::Intersectional);
        let keys: Vec<Vec<&str>> = groups
            .iter()
            .map(|(k, _)| k.values().collect())
            .collect();
        assert_eq!(
            keys,
            vec![vec!["a", "f"], vec!["a", "m"], vec!["b", "f"]]
        );
        // ("a", "f") covers index 1, ("b", "f") indices 0 and 3
        assert_eq!(groups[0].1, vec![1]);
        assert_eq!(groups[2].1, vec![0, 3]);
    }

    #[test]
    fn marginal_groups_overlap_across_attributes() {
        let attrs = attrs().unwrap();
        let groups = group_indices(&attrs, Grouping::Marginal);

        // One entry per (attribute, value): race has 2 values, sex has 2
        assert_eq!(groups.len(), 4);
        let total: usize = groups.iter().map(|(_, idx)| idx.len()).sum();
        // Each individual counted once per attribute
        assert_eq!(total, attrs.len() * attrs.n_attributes());

        // Attribute order: race groups first, then sex
        assert_eq!(groups[0].0.pairs()[0].0, "race");
        assert_eq!(groups[2].0.pairs()[0].0, "sex");
    }

    #[test]
    fn single_valued_attribute_yields_one_group() {
        let attrs = ProtectedAttributes::new(vec![(
            "site".to_string(),
            vec!["x".into(), "x".into(), "x".into()],
        )])
        .unwrap();
        let groups = group_indices(&attrs, Grouping::Intersectional);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].1, vec![0, 1, 2]);
    }
}
