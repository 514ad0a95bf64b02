use std::collections::HashMap;

use crate::aggregate::aggregate_events;
use crate::allocate::{allocate_group, AllocRow};
use crate::classify::{compute_summary, key_line, partition_rows, sort_keys, RowClaim, Totals};
use crate::config::{FilterConfig, ReconConfig};
use crate::error::ReconError;
use crate::matcher::{internal_total, match_demands};
use crate::model::{
    AggregateLine, AggregatedDemand, ClaimOutcome, DetailRecord, ExternalEvent, KeyVariance,
    MatchedVia, ReconMode, ReconResult, UnmatchedDemand, UnmatchedReason,
};
use crate::normalize::{checked_total, coerce_quantity, normalize_key, overflow, parse_quantity};
use crate::schema::{
    detect_external, resolve_detail, AggregateColumns, DetailColumns, EventColumns, ExternalShape,
};
use crate::table::Table;

/// Quantity assumed for a detail row or external event with no usable quantity.
pub const DEFAULT_QUANTITY: i64 = 1;
/// Value assumed for a missing pre-aggregated internal/external total.
pub const DEFAULT_TOTAL: i64 = 0;

/// Key used in overflow errors for run-wide totals.
const ALL_KEYS: &str = "(all keys)";

/// Run one reconciliation over two loaded tables.
///
/// The external table's header decides the mode: pre-aggregated totals are
/// used as given, raw events are aggregated and allocated across detail rows.
/// Schema problems abort the run; bad quantities fall back to defaults.
pub fn reconcile(
    config: &ReconConfig,
    detail: &Table,
    external: &Table,
) -> Result<ReconResult, ReconError> {
    let detail_cols = resolve_detail(&detail.headers, &config.detail)?;
    let shape = detect_external(&external.headers, &config.external)?;
    let details = load_details(detail, &detail_cols);

    let result = match shape {
        ExternalShape::Events(cols) => {
            let events = load_events(external, &cols, &config.filter);
            tracing::debug!(
                "{}: row-level mode, {} detail rows, {} events",
                config.name,
                details.len(),
                events.len()
            );
            reconcile_events(&details, &events)?
        }
        ExternalShape::Aggregates(cols) => {
            let lines = load_aggregate_lines(external, &cols, &config.filter)?;
            tracing::debug!(
                "{}: aggregate-diff mode, {} detail rows, {} lines",
                config.name,
                details.len(),
                lines.len()
            );
            reconcile_aggregates(&details, &lines)?
        }
    };

    let s = &result.summary;
    tracing::debug!(
        "{}: {} previously received, {} ready to receive, {} remaining, {} unmatched",
        config.name,
        s.previously_received,
        s.ready_to_receive,
        s.remaining,
        s.unmatched
    );
    Ok(result)
}

fn checked_variance(key: &str, internal: i64, external: i64) -> Result<i64, ReconError> {
    internal.checked_sub(external).ok_or_else(|| overflow(key))
}

fn run_totals(
    internal: i64,
    external: i64,
    variance: i64,
    unmatched: &[UnmatchedDemand],
) -> Result<Totals, ReconError> {
    Ok(Totals {
        internal,
        external,
        variance,
        unmatched: checked_total(ALL_KEYS, unmatched.iter().map(|u| u.quantity))?,
    })
}

// ---------------------------------------------------------------------------
// Row-level allocation mode
// ---------------------------------------------------------------------------

/// Aggregate raw events, match them to detail rows and allocate each key's
/// variance across its rows.
pub fn reconcile_events(
    details: &[DetailRecord],
    events: &[ExternalEvent],
) -> Result<ReconResult, ReconError> {
    let demands = aggregate_events(events)?;
    let groups = match_demands(&demands, details);

    let mut claims = vec![RowClaim::default(); details.len()];
    let mut unmatched = Vec::new();
    let mut keys = Vec::new();

    for group in &groups {
        let key = &group.demand.key;
        let external = group.demand.total_quantity;
        let internal = internal_total(group, details)?;
        let variance = checked_variance(key, internal, external)?;
        keys.push(key_line(key, internal, external, variance, group.matched_via));

        if group.matched_via == MatchedVia::None {
            push_unmatched(&mut unmatched, key, external, UnmatchedReason::NoInventory);
            continue;
        }

        // `row_id` here is the position in `details`, not the caller's row id.
        let rows: Vec<AllocRow> = group
            .matched_rows
            .iter()
            .map(|&i| AllocRow { row_id: i, quantity: details[i].quantity })
            .collect();
        let allocation = allocate_group(&rows, external).ok_or_else(|| overflow(key))?;

        for a in allocation.allocations {
            claims[a.row_id] = RowClaim {
                matched_key: Some(key.clone()),
                matched_via: group.matched_via,
                claimed_quantity: a.claimed_quantity,
                outcome: a.outcome,
            };
        }
        push_unmatched(&mut unmatched, key, allocation.surplus, UnmatchedReason::Surplus);
    }

    keys.extend(internal_only_keys(details, &claims)?);
    sort_keys(&mut keys);

    let internal = checked_total(ALL_KEYS, details.iter().map(|d| d.quantity))?;
    let external = checked_total(ALL_KEYS, demands.iter().map(|d| d.total_quantity))?;
    let variance = checked_variance(ALL_KEYS, internal, external)?;
    let rows = partition_rows(details, &claims);
    let summary = compute_summary(
        &rows,
        &unmatched,
        &keys,
        run_totals(internal, external, variance, &unmatched)?,
    );

    Ok(ReconResult {
        mode: ReconMode::RowLevel,
        summary,
        previously_received: rows.previously_received,
        ready_to_receive: rows.ready_to_receive,
        remaining: rows.remaining,
        unmatched,
        keys,
    })
}

/// Key lines for detail rows no demand reached, grouped by primary key.
fn internal_only_keys(
    details: &[DetailRecord],
    claims: &[RowClaim],
) -> Result<Vec<KeyVariance>, ReconError> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, i64> = HashMap::new();

    for (row, claim) in details.iter().zip(claims) {
        if claim.matched_via != MatchedVia::None {
            continue;
        }
        let key = normalize_key(&row.primary_key);
        if key.is_empty() {
            continue;
        }
        let total = totals.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            0
        });
        *total = total.checked_add(row.quantity).ok_or_else(|| overflow(&key))?;
    }

    Ok(order
        .into_iter()
        .map(|key| {
            let internal = totals[&key];
            key_line(&key, internal, 0, internal, MatchedVia::None)
        })
        .collect())
}

fn push_unmatched(out: &mut Vec<UnmatchedDemand>, key: &str, quantity: i64, reason: UnmatchedReason) {
    if quantity > 0 {
        out.push(UnmatchedDemand { key: key.to_string(), quantity, reason });
    }
}

// ---------------------------------------------------------------------------
// Aggregate-diff mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct KeyTotals {
    key: String,
    internal: i64,
    external: i64,
    variance: i64,
}

impl KeyTotals {
    fn add(&mut self, line: &AggregateLine) -> Result<(), ReconError> {
        let add = |a: i64, b: i64| a.checked_add(b).ok_or_else(|| overflow(&self.key));
        let internal = add(self.internal, line.internal)?;
        let external = add(self.external, line.external)?;
        let variance = add(self.variance, line.variance)?;
        self.internal = internal;
        self.external = external;
        self.variance = variance;
        Ok(())
    }
}

/// Use pre-aggregated per-key totals as given. Rows of keys whose variance is
/// zero or negative are corroborated; everything else remains. No allocation.
pub fn reconcile_aggregates(
    details: &[DetailRecord],
    lines: &[AggregateLine],
) -> Result<ReconResult, ReconError> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut totals: Vec<KeyTotals> = Vec::new();
    for line in lines {
        let key = normalize_key(&line.key);
        if key.is_empty() {
            continue;
        }
        match index.get(&key) {
            Some(&i) => totals[i].add(line)?,
            None => {
                index.insert(key.clone(), totals.len());
                totals.push(KeyTotals {
                    key,
                    internal: line.internal,
                    external: line.external,
                    variance: line.variance,
                });
            }
        }
    }

    let demands: Vec<AggregatedDemand> = totals
        .iter()
        .map(|t| AggregatedDemand {
            key: t.key.clone(),
            total_quantity: t.external,
            event_count: 1,
        })
        .collect();
    let groups = match_demands(&demands, details);

    let mut claims = vec![RowClaim::default(); details.len()];
    let mut unmatched = Vec::new();
    let mut keys = Vec::with_capacity(totals.len());

    for (t, group) in totals.iter().zip(&groups) {
        keys.push(key_line(&t.key, t.internal, t.external, t.variance, group.matched_via));

        let corroborated = t.variance <= 0;
        for &i in &group.matched_rows {
            claims[i] = RowClaim {
                matched_key: Some(t.key.clone()),
                matched_via: group.matched_via,
                claimed_quantity: if corroborated { details[i].quantity } else { 0 },
                outcome: if corroborated {
                    ClaimOutcome::FullyClaimed
                } else {
                    ClaimOutcome::Unclaimed
                },
            };
        }

        if t.variance < 0 {
            let reason = if t.internal == 0 {
                UnmatchedReason::NoInventory
            } else {
                UnmatchedReason::Surplus
            };
            let shortfall = t.variance.checked_neg().ok_or_else(|| overflow(&t.key))?;
            push_unmatched(&mut unmatched, &t.key, shortfall, reason);
        }
    }
    sort_keys(&mut keys);

    let internal = checked_total(ALL_KEYS, totals.iter().map(|t| t.internal))?;
    let external = checked_total(ALL_KEYS, totals.iter().map(|t| t.external))?;
    let variance = checked_total(ALL_KEYS, totals.iter().map(|t| t.variance))?;
    let rows = partition_rows(details, &claims);
    let summary = compute_summary(
        &rows,
        &unmatched,
        &keys,
        run_totals(internal, external, variance, &unmatched)?,
    );

    Ok(ReconResult {
        mode: ReconMode::AggregateDiff,
        summary,
        previously_received: rows.previously_received,
        ready_to_receive: rows.ready_to_receive,
        remaining: rows.remaining,
        unmatched,
        keys,
    })
}

// ---------------------------------------------------------------------------
// Table -> typed records
// ---------------------------------------------------------------------------

/// Turn the detail table into records. Every data row becomes a record,
/// including rows with a blank key; those simply never match.
pub fn load_details(table: &Table, cols: &DetailColumns) -> Vec<DetailRecord> {
    (0..table.rows.len())
        .map(|r| DetailRecord {
            row_id: r,
            primary_key: table.cell(r, cols.primary_key).clone(),
            fallback_key: cols.fallback_key.map(|c| table.cell(r, c).clone()),
            quantity: cols
                .quantity
                .map_or(DEFAULT_QUANTITY, |c| coerce_quantity(table.cell(r, c), DEFAULT_QUANTITY)),
        })
        .collect()
}

/// Turn a raw external table into events, skipping filtered summary rows.
pub fn load_events(table: &Table, cols: &EventColumns, filter: &FilterConfig) -> Vec<ExternalEvent> {
    (0..table.rows.len())
        .filter(|&r| !filter.excludes(&table.cell(r, cols.key).to_text()))
        .map(|r| ExternalEvent {
            key: table.cell(r, cols.key).clone(),
            quantity: cols
                .quantity
                .map_or(DEFAULT_QUANTITY, |c| coerce_quantity(table.cell(r, c), DEFAULT_QUANTITY)),
        })
        .collect()
}

/// Turn a pre-aggregated external table into lines. A missing or unparseable
/// variance is recomputed as internal - external.
pub fn load_aggregate_lines(
    table: &Table,
    cols: &AggregateColumns,
    filter: &FilterConfig,
) -> Result<Vec<AggregateLine>, ReconError> {
    (0..table.rows.len())
        .filter(|&r| !filter.excludes(&table.cell(r, cols.key).to_text()))
        .map(|r| {
            let key = table.cell(r, cols.key);
            let internal = coerce_quantity(table.cell(r, cols.internal), DEFAULT_TOTAL);
            let external = coerce_quantity(table.cell(r, cols.external), DEFAULT_TOTAL);
            let variance = match cols.variance.and_then(|c| parse_quantity(table.cell(r, c))) {
                Some(v) => v,
                None => checked_variance(&key.to_text(), internal, external)?,
            };
            Ok(AggregateLine {
                key: key.clone(),
                internal,
                external,
                variance,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn detail(row_id: usize, key: &str, fallback: Option<&str>, quantity: i64) -> DetailRecord {
        DetailRecord {
            row_id,
            primary_key: Cell::from(key),
            fallback_key: fallback.map(Cell::from),
            quantity,
        }
    }

    fn event(key: &str, quantity: i64) -> ExternalEvent {
        ExternalEvent { key: Cell::from(key), quantity }
    }

    fn line(key: &str, internal: i64, external: i64, variance: i64) -> AggregateLine {
        AggregateLine { key: Cell::from(key), internal, external, variance }
    }

    #[test]
    fn unmatched_demand_touches_no_rows() {
        let details = vec![detail(0, "XYZ", Some("QRS"), 3)];
        let result = reconcile_events(&details, &[event("abc123", 4)]).unwrap();
        assert_eq!(
            result.unmatched,
            vec![UnmatchedDemand {
                key: "ABC123".into(),
                quantity: 4,
                reason: UnmatchedReason::NoInventory,
            }]
        );
        assert!(result.previously_received.is_empty());
        assert!(result.ready_to_receive.is_empty());
        assert_eq!(result.remaining.len(), 1);
        assert_eq!(result.remaining[0].matched_via, MatchedVia::None);
    }

    #[test]
    fn variance_allocated_smallest_first() {
        // T = 16, E = 10, V = 6 over [5, 2, 9]
        let details = vec![
            detail(0, "K1", None, 5),
            detail(1, "K1", None, 2),
            detail(2, "K1", None, 9),
        ];
        let result = reconcile_events(&details, &[event("k1", 4), event("K1", 6)]).unwrap();
        assert_eq!(result.previously_received.len(), 1);
        assert_eq!(result.previously_received[0].row_id, 1);
        assert_eq!(result.ready_to_receive.len(), 1);
        assert_eq!(result.ready_to_receive[0].row_id, 0);
        assert_eq!(result.ready_to_receive[0].claimed_quantity, 4);
        assert_eq!(result.remaining.len(), 1);
        assert_eq!(result.remaining[0].row_id, 2);
        assert_eq!(result.remaining[0].matched_key.as_deref(), Some("K1"));
        assert!(result.unmatched.is_empty());
        assert_eq!(result.summary.variance, 6);
    }

    #[test]
    fn external_surplus_folds_into_unmatched() {
        let details = vec![detail(0, "A", None, 2), detail(1, "A", None, 1)];
        let result = reconcile_events(&details, &[event("A", 5)]).unwrap();
        assert_eq!(result.previously_received.len(), 2);
        assert_eq!(
            result.unmatched,
            vec![UnmatchedDemand {
                key: "A".into(),
                quantity: 2,
                reason: UnmatchedReason::Surplus,
            }]
        );
    }

    #[test]
    fn zero_demand_leaves_rows_remaining() {
        let details = vec![detail(0, "A", None, 2)];
        let result = reconcile_events(&details, &[event("A", 0)]).unwrap();
        assert_eq!(result.remaining.len(), 1);
        assert_eq!(result.remaining[0].matched_via, MatchedVia::Primary);
        assert!(result.unmatched.is_empty());
    }

    #[test]
    fn fallback_key_match() {
        let details = vec![detail(0, "P-1", Some("0001234"), 3)];
        let result = reconcile_events(&details, &[event("0001234", 3)]).unwrap();
        assert_eq!(result.previously_received.len(), 1);
        assert_eq!(result.previously_received[0].matched_via, MatchedVia::Fallback);
        assert_eq!(result.keys[0].matched_via, MatchedVia::Fallback);
    }

    #[test]
    fn internal_only_keys_reported() {
        let details = vec![
            detail(0, "A", None, 1),
            detail(1, "B", None, 2),
            detail(2, "b", None, 3),
            detail(3, "", None, 7),
        ];
        let result = reconcile_events(&details, &[event("A", 1)]).unwrap();
        let b = result.keys.iter().find(|k| k.key == "B").unwrap();
        assert_eq!(b.internal, 5);
        assert_eq!(b.external, 0);
        assert_eq!(b.status, crate::model::KeyStatus::MissingExternally);
        // the blank-key row has no key line but is still partitioned
        assert_eq!(result.keys.len(), 2);
        assert_eq!(result.summary.total_rows, 4);
        assert_eq!(result.summary.internal_quantity, 13);
    }

    #[test]
    fn blank_event_keys_never_surface() {
        let details = vec![detail(0, "", None, 1)];
        let result = reconcile_events(&details, &[event("   ", 3), event("", 1)]).unwrap();
        assert!(result.unmatched.is_empty());
        assert!(result.keys.is_empty());
        assert_eq!(result.summary.external_quantity, 0);
        assert_eq!(result.remaining.len(), 1);
    }

    #[test]
    fn aggregate_diff_zero_variance() {
        let details = vec![detail(0, "T100", None, 10)];
        let result = reconcile_aggregates(&details, &[line("t100", 10, 10, 0)]).unwrap();
        assert_eq!(result.mode, ReconMode::AggregateDiff);
        assert_eq!(result.summary.variance, 0);
        assert_eq!(result.previously_received.len(), 1);
        assert!(result.ready_to_receive.is_empty());
        assert!(result.remaining.is_empty());
        assert!(result.unmatched.is_empty());
        assert_eq!(result.keys[0].status, crate::model::KeyStatus::Reconciled);
    }

    #[test]
    fn aggregate_diff_uses_given_variance() {
        let details = vec![
            detail(0, "A", None, 4),
            detail(1, "B", None, 1),
            detail(2, "C", None, 2),
        ];
        let lines = vec![
            line("A", 4, 1, 3),
            line("B", 1, 3, -2),
            line("N", 0, 5, -5),
        ];
        let result = reconcile_aggregates(&details, &lines).unwrap();
        assert_eq!(result.remaining.len(), 2); // A (positive variance) + C (no line)
        assert_eq!(result.previously_received.len(), 1);
        assert_eq!(result.previously_received[0].row_id, 1);
        assert_eq!(result.unmatched.len(), 2);
        let n = result.unmatched.iter().find(|u| u.key == "N").unwrap();
        assert_eq!(n.reason, UnmatchedReason::NoInventory);
        assert_eq!(n.quantity, 5);
        let b = result.unmatched.iter().find(|u| u.key == "B").unwrap();
        assert_eq!(b.reason, UnmatchedReason::Surplus);
        assert_eq!(result.summary.variance, -4);
        assert_eq!(result.keys[0].key, "N");
    }

    #[test]
    fn load_records_apply_defaults_and_filter() {
        let table = Table::new(
            vec!["IET #".into(), "Qty".into()],
            vec![
                vec![Cell::from("A1"), Cell::from("x")],
                vec![Cell::from("Grand Total"), Cell::from("9")],
                vec![Cell::from("A2")],
            ],
        );
        let events = load_events(
            &table,
            &EventColumns { key: 0, quantity: Some(1) },
            &FilterConfig::default(),
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].quantity, DEFAULT_QUANTITY);
        assert_eq!(events[1].quantity, DEFAULT_QUANTITY);

        let details = load_details(
            &table,
            &DetailColumns { primary_key: 0, fallback_key: None, quantity: Some(1) },
        );
        // detail rows are never filtered
        assert_eq!(details.len(), 3);
        assert_eq!(details[1].quantity, 9);
    }

    #[test]
    fn aggregate_lines_recompute_bad_variance() {
        let table = Table::new(
            vec!["IET #".into(), "SIMPLE".into(), "RT".into(), "DIFF".into()],
            vec![
                vec![Cell::from("A"), Cell::Int(5), Cell::Empty, Cell::from("?")],
                vec![Cell::from("B"), Cell::Int(2), Cell::Int(2), Cell::Int(0)],
            ],
        );
        let lines = load_aggregate_lines(
            &table,
            &AggregateColumns { key: 0, internal: 1, external: 2, variance: Some(3) },
            &FilterConfig::default(),
        )
        .unwrap();
        assert_eq!(lines[0].external, DEFAULT_TOTAL);
        assert_eq!(lines[0].variance, 5);
        assert_eq!(lines[1].variance, 0);
    }

    #[test]
    fn event_totals_out_of_range_are_errors() {
        let details = vec![detail(0, "A", None, 1)];
        let events = [event("A", 5_000_000_000_000_000_000), event("A", 5_000_000_000_000_000_000)];
        assert!(matches!(
            reconcile_events(&details, &events),
            Err(ReconError::QuantityOverflow { key }) if key == "A"
        ));

        // each key fits but the run-wide external total does not
        let events = [event("A", i64::MAX), event("B", 1)];
        assert!(matches!(
            reconcile_events(&details, &events),
            Err(ReconError::QuantityOverflow { .. })
        ));

        // internal minus external leaves the range
        let details = vec![detail(0, "A", None, -2)];
        assert!(matches!(
            reconcile_events(&details, &[event("A", i64::MAX)]),
            Err(ReconError::QuantityOverflow { key }) if key == "A"
        ));
    }

    #[test]
    fn aggregate_totals_out_of_range_are_errors() {
        let details = vec![detail(0, "A", None, 1)];
        let lines = vec![line("A", i64::MAX, 0, 0), line("a", 1, 0, 0)];
        assert!(matches!(
            reconcile_aggregates(&details, &lines),
            Err(ReconError::QuantityOverflow { key }) if key == "A"
        ));

        let lines = vec![line("A", 0, 0, i64::MIN)];
        assert!(matches!(
            reconcile_aggregates(&details, &lines),
            Err(ReconError::QuantityOverflow { key }) if key == "A"
        ));
    }
}
