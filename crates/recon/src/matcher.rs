use std::collections::HashMap;

use crate::error::ReconError;
use crate::model::{AggregatedDemand, DetailRecord, MatchGroup, MatchedVia};
use crate::normalize::{checked_total, normalize_key};

/// Normalized-key lookup over the detail rows, by primary and fallback key.
pub struct DetailIndex {
    primary: HashMap<String, Vec<usize>>,
    fallback: HashMap<String, Vec<usize>>,
}

impl DetailIndex {
    pub fn build(details: &[DetailRecord]) -> Self {
        let mut primary: HashMap<String, Vec<usize>> = HashMap::new();
        let mut fallback: HashMap<String, Vec<usize>> = HashMap::new();

        for (i, row) in details.iter().enumerate() {
            let key = normalize_key(&row.primary_key);
            if !key.is_empty() {
                primary.entry(key).or_default().push(i);
            }
            if let Some(ref raw) = row.fallback_key {
                let key = normalize_key(raw);
                if !key.is_empty() {
                    fallback.entry(key).or_default().push(i);
                }
            }
        }

        Self { primary, fallback }
    }

    pub fn primary(&self, key: &str) -> &[usize] {
        self.primary.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn fallback(&self, key: &str) -> &[usize] {
        self.fallback.get(key).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Link each demand to the detail rows carrying its key.
///
/// The primary key is tried first; the fallback key only when the primary pass
/// finds nothing. A row claimed through its primary key by any demand is never
/// a fallback candidate, so every row belongs to at most one group.
pub fn match_demands(demands: &[AggregatedDemand], details: &[DetailRecord]) -> Vec<MatchGroup> {
    let index = DetailIndex::build(details);

    let mut owned_by_primary = vec![false; details.len()];
    for demand in demands {
        for &i in index.primary(&demand.key) {
            owned_by_primary[i] = true;
        }
    }

    demands
        .iter()
        .map(|demand| {
            let primary = index.primary(&demand.key);
            if !primary.is_empty() {
                return MatchGroup {
                    demand: demand.clone(),
                    matched_rows: primary.to_vec(),
                    matched_via: MatchedVia::Primary,
                };
            }

            let fallback: Vec<usize> = index
                .fallback(&demand.key)
                .iter()
                .copied()
                .filter(|&i| !owned_by_primary[i])
                .collect();
            if !fallback.is_empty() {
                return MatchGroup {
                    demand: demand.clone(),
                    matched_rows: fallback,
                    matched_via: MatchedVia::Fallback,
                };
            }

            MatchGroup {
                demand: demand.clone(),
                matched_rows: Vec::new(),
                matched_via: MatchedVia::None,
            }
        })
        .collect()
}

/// Sum of `quantity` across a group's matched rows.
pub fn internal_total(group: &MatchGroup, details: &[DetailRecord]) -> Result<i64, ReconError> {
    checked_total(
        &group.demand.key,
        group.matched_rows.iter().map(|&i| details[i].quantity),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn row(row_id: usize, primary: &str, fallback: Option<&str>, quantity: i64) -> DetailRecord {
        DetailRecord {
            row_id,
            primary_key: Cell::from(primary),
            fallback_key: fallback.map(Cell::from),
            quantity,
        }
    }

    fn demand(key: &str, total: i64) -> AggregatedDemand {
        AggregatedDemand { key: key.into(), total_quantity: total, event_count: 1 }
    }

    #[test]
    fn primary_match_keeps_row_order() {
        let details = vec![
            row(0, "a100", None, 4),
            row(1, "B200", None, 1),
            row(2, "A100 ", None, 2),
        ];
        let groups = match_demands(&[demand("A100", 6)], &details);
        assert_eq!(groups[0].matched_via, MatchedVia::Primary);
        assert_eq!(groups[0].matched_rows, vec![0, 2]);
        assert_eq!(internal_total(&groups[0], &details).unwrap(), 6);
    }

    #[test]
    fn fallback_used_only_when_primary_empty() {
        let details = vec![
            row(0, "P1", Some("U1"), 3),
            row(1, "U1", None, 2),
            row(2, "P2", Some("U2"), 5),
        ];
        let groups = match_demands(&[demand("U1", 2), demand("U2", 5)], &details);

        // U1 is somebody's primary key, so the fallback pass is skipped
        assert_eq!(groups[0].matched_via, MatchedVia::Primary);
        assert_eq!(groups[0].matched_rows, vec![1]);

        assert_eq!(groups[1].matched_via, MatchedVia::Fallback);
        assert_eq!(groups[1].matched_rows, vec![2]);
    }

    #[test]
    fn row_owned_by_primary_is_not_reused_by_fallback() {
        let details = vec![row(0, "P1", Some("U1"), 3)];
        let groups = match_demands(&[demand("U1", 3), demand("P1", 3)], &details);
        assert_eq!(groups[0].matched_via, MatchedVia::None);
        assert!(groups[0].matched_rows.is_empty());
        assert_eq!(groups[1].matched_via, MatchedVia::Primary);
    }

    #[test]
    fn unmatched_demand() {
        let details = vec![row(0, "X", Some("Y"), 1)];
        let groups = match_demands(&[demand("ABC123", 4)], &details);
        assert_eq!(groups[0].matched_via, MatchedVia::None);
        assert!(groups[0].matched_rows.is_empty());
        assert_eq!(internal_total(&groups[0], &details).unwrap(), 0);
    }

    #[test]
    fn internal_total_overflow_is_an_error() {
        let details = vec![row(0, "K", None, i64::MAX), row(1, "K", None, 1)];
        let groups = match_demands(&[demand("K", 1)], &details);
        assert!(matches!(
            internal_total(&groups[0], &details),
            Err(ReconError::QuantityOverflow { .. })
        ));
    }

    #[test]
    fn empty_keys_never_match_each_other() {
        let details = vec![row(0, "", Some("  "), 1)];
        let index = DetailIndex::build(&details);
        assert!(index.primary("").is_empty());
        assert!(index.fallback("").is_empty());
        let groups = match_demands(&[demand("", 1)], &details);
        assert_eq!(groups[0].matched_via, MatchedVia::None);
    }
}
