// ── Roster diff ──
//
// Compares two roster snapshots by gateway id. Pure; no I/O.

use std::cmp::Ordering;
use std::fmt;

use symphony_api::Gateway;

/// Outcome of comparing two roster snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatewayDiff {
    pub added: Vec<Gateway>,
    pub removed: Vec<Gateway>,
    /// `(before, after)` pairs whose display name changed.
    pub changed: Vec<(Gateway, Gateway)>,
}

impl GatewayDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl fmt::Display for GatewayDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+{} -{} ~{}",
            self.added.len(),
            self.removed.len(),
            self.changed.len()
        )
    }
}

/// Diff `before` against `after`.
///
/// An empty side short-circuits: with no `before`, `after` is returned as
/// `added` exactly as given; with no `after`, `before` is returned as
/// `removed` exactly as given. Otherwise both sides are sorted by gateway
/// id (byte order, stable) and merge-walked; ids present on both sides
/// land in `changed` when their display names differ.
pub fn diff(before: &[Gateway], after: &[Gateway]) -> GatewayDiff {
    if before.is_empty() {
        return GatewayDiff {
            added: after.to_vec(),
            ..GatewayDiff::default()
        };
    }
    if after.is_empty() {
        return GatewayDiff {
            removed: before.to_vec(),
            ..GatewayDiff::default()
        };
    }

    let before = sorted(before);
    let after = sorted(after);
    let mut result = GatewayDiff::default();

    let (mut i, mut j) = (0, 0);
    while i < before.len() && j < after.len() {
        let (old, new) = (before[i], after[j]);
        match old.gateway_id.cmp(&new.gateway_id) {
            Ordering::Less => {
                result.removed.push(old.clone());
                i += 1;
            }
            Ordering::Greater => {
                result.added.push(new.clone());
                j += 1;
            }
            Ordering::Equal => {
                if old.display_name() != new.display_name() {
                    result.changed.push((old.clone(), new.clone()));
                }
                i += 1;
                j += 1;
            }
        }
    }
    result.removed.extend(before[i..].iter().map(|g| (*g).clone()));
    result.added.extend(after[j..].iter().map(|g| (*g).clone()));

    result
}

fn sorted(gateways: &[Gateway]) -> Vec<&Gateway> {
    let mut refs: Vec<&Gateway> = gateways.iter().collect();
    if refs.len() > 1 {
        refs.sort_by(|a, b| a.gateway_id.cmp(&b.gateway_id));
    }
    refs
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::*;

    fn gw(id: &str, name: &str) -> Gateway {
        Gateway {
            gateway_id: id.into(),
            description: Some(name.into()),
            ..Gateway::default()
        }
    }

    fn ids(list: &[Gateway]) -> Vec<&str> {
        list.iter().map(|g| g.gateway_id.as_str()).collect()
    }

    #[test]
    fn empty_before_returns_after_verbatim() {
        let after = vec![gw("B", "b"), gw("A", "a")];
        let result = diff(&[], &after);
        assert_eq!(result.added, after);
        assert!(result.removed.is_empty());
        assert!(result.changed.is_empty());
    }

    #[test]
    fn empty_after_returns_before_verbatim() {
        let before = vec![gw("Z", "z"), gw("A", "a"), gw("M", "m")];
        let result = diff(&before, &[]);
        assert_eq!(ids(&result.removed), ["Z", "A", "M"]);
        assert!(result.added.is_empty());
        assert!(result.changed.is_empty());
    }

    #[test]
    fn identical_rosters_yield_nothing() {
        let roster = vec![gw("A1", "Living Room"), gw("B2", "Basement")];
        assert!(diff(&roster, &roster).is_empty());
    }

    #[test]
    fn renamed_unit_is_changed_once() {
        let result = diff(&[gw("A1", "Old")], &[gw("A1", "New")]);
        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
        assert_eq!(result.changed.len(), 1);
        let (old, new) = &result.changed[0];
        assert_eq!(old.display_name(), "Old");
        assert_eq!(new.display_name(), "New");
    }

    #[test]
    fn thermostat_name_wins_over_description() {
        let mut renamed = gw("A1", "Old");
        renamed.thermostat_name = Some("Upstairs".into());
        let result = diff(&[gw("A1", "Old")], &[renamed]);
        assert_eq!(result.changed.len(), 1);
    }

    #[test]
    fn ordering_is_byte_wise() {
        let result = diff(&[gw("a", "x")], &[gw("B", "y"), gw("a", "x")]);
        assert_eq!(ids(&result.added), ["B"]);
        assert!(result.removed.is_empty());
    }

    #[test]
    fn mixed_lists_partition_ids() {
        let before = vec![gw("D", "d"), gw("A", "a"), gw("C", "c-old")];
        let after = vec![gw("E", "e"), gw("C", "c-new"), gw("B", "b"), gw("A", "a")];
        let result = diff(&before, &after);

        assert_eq!(ids(&result.added), ["B", "E"]);
        assert_eq!(ids(&result.removed), ["D"]);
        assert_eq!(result.changed.len(), 1);

        let added: BTreeSet<_> = ids(&result.added).into_iter().collect();
        let removed: BTreeSet<_> = ids(&result.removed).into_iter().collect();
        let before_ids: BTreeSet<_> = ids(&before).into_iter().collect();
        let after_ids: BTreeSet<_> = ids(&after).into_iter().collect();
        let both: BTreeSet<_> = before_ids.intersection(&after_ids).copied().collect();

        assert!(added.is_disjoint(&removed));
        assert!(added.is_disjoint(&both));
        assert!(removed.is_disjoint(&both));
        let union: BTreeSet<_> = added.union(&removed).chain(both.iter()).copied().collect();
        let all: BTreeSet<_> = before_ids.union(&after_ids).copied().collect();
        assert_eq!(union, all);
    }

    #[test]
    fn disjoint_rosters_swap_everything() {
        let before = vec![gw("A", "a"), gw("B", "b")];
        let after = vec![gw("C", "c")];
        let result = diff(&before, &after);
        assert_eq!(ids(&result.removed), ["A", "B"]);
        assert_eq!(ids(&result.added), ["C"]);
        assert_eq!(result.to_string(), "+1 -2 ~0");
    }
}
