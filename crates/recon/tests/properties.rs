// Property-based tests for normalization, allocation and classification.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::HashSet;

use proptest::prelude::*;
use stockrecon_recon::allocate::{allocate_group, claim_variance, AllocRow};
use stockrecon_recon::model::{ClaimOutcome, UnmatchedReason};
use stockrecon_recon::normalize::normalize_text;
use stockrecon_recon::{reconcile_events, Cell, DetailRecord, ExternalEvent};

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Keys drawn from a small alphabet so detail rows and events collide often.
fn arb_key() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => r"[a-cA-C][0-2]",
        1 => r"[a-c][0-2]\.0",
        1 => r"[A-C][0-2]\[{1,2}",
        1 => Just("".to_string()),
        1 => Just("   ".to_string()),
    ]
}

fn arb_rows() -> impl Strategy<Value = Vec<AllocRow>> {
    prop::collection::vec(0i64..50, 1..12).prop_map(|qs| {
        qs.into_iter()
            .enumerate()
            .map(|(row_id, quantity)| AllocRow { row_id, quantity })
            .collect()
    })
}

fn arb_details() -> impl Strategy<Value = Vec<DetailRecord>> {
    prop::collection::vec((arb_key(), prop::option::of(arb_key()), 0i64..20), 0..16).prop_map(
        |rows| {
            rows.into_iter()
                .enumerate()
                .map(|(row_id, (primary, fallback, quantity))| DetailRecord {
                    row_id,
                    primary_key: Cell::from(primary),
                    fallback_key: fallback.map(Cell::from),
                    quantity,
                })
                .collect()
        },
    )
}

fn arb_events() -> impl Strategy<Value = Vec<ExternalEvent>> {
    prop::collection::vec((arb_key(), 0i64..20), 0..16).prop_map(|events| {
        events
            .into_iter()
            .map(|(key, quantity)| ExternalEvent { key: Cell::from(key), quantity })
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn normalize_is_idempotent(raw in r"[ a-zA-Z0-9.\[\]-]{0,12}") {
        let once = normalize_text(&raw);
        prop_assert_eq!(normalize_text(&once), once);
    }

    #[test]
    fn claims_cover_variance_with_bounded_overshoot(rows in arb_rows(), pick in 0.0f64..1.0) {
        let total: i64 = rows.iter().map(|r| r.quantity).sum();
        prop_assume!(total > 0);
        let variance = 1 + ((total - 1) as f64 * pick) as i64;
        let max_row = rows.iter().map(|r| r.quantity).max().unwrap_or(0);

        let allocs = claim_variance(&rows, variance).unwrap();
        let claimed: i64 = allocs
            .iter()
            .filter(|a| a.outcome != ClaimOutcome::Unclaimed)
            .map(|a| a.claimed_quantity)
            .sum();

        prop_assert!(claimed >= variance);
        prop_assert!(claimed < variance + max_row);
        prop_assert!(allocs.iter().any(|a| a.outcome != ClaimOutcome::Unclaimed));
        prop_assert!(
            allocs.iter().filter(|a| a.outcome == ClaimOutcome::PartiallyClaimed).count() <= 1
        );
        for a in &allocs {
            let row = rows.iter().find(|r| r.row_id == a.row_id).unwrap();
            prop_assert!(a.claimed_quantity <= row.quantity);
        }
    }

    #[test]
    fn external_at_or_above_total_claims_all(rows in arb_rows(), extra in 0i64..30) {
        let total: i64 = rows.iter().map(|r| r.quantity).sum();
        let external = total + extra;
        prop_assume!(external > 0);

        let group = allocate_group(&rows, external).unwrap();
        prop_assert_eq!(group.surplus, extra);
        prop_assert!(group.allocations.iter().all(|a| a.outcome == ClaimOutcome::FullyClaimed));
    }

    #[test]
    fn every_row_in_exactly_one_partition(details in arb_details(), events in arb_events()) {
        let result = reconcile_events(&details, &events).unwrap();

        let mut seen = HashSet::new();
        for row in result
            .previously_received
            .iter()
            .chain(&result.ready_to_receive)
            .chain(&result.remaining)
        {
            prop_assert!(seen.insert(row.row_id), "row {} reported twice", row.row_id);
            prop_assert!(row.claimed_quantity <= row.quantity);
        }
        prop_assert_eq!(seen.len(), details.len());
        prop_assert_eq!(result.summary.total_rows, details.len());
    }

    #[test]
    fn unmatched_demand_never_has_blank_key(details in arb_details(), events in arb_events()) {
        let result = reconcile_events(&details, &events).unwrap();
        for u in &result.unmatched {
            prop_assert!(!u.key.is_empty());
            prop_assert!(u.quantity > 0);
        }
        let no_inventory: i64 = result
            .unmatched
            .iter()
            .filter(|u| u.reason == UnmatchedReason::NoInventory)
            .map(|u| u.quantity)
            .sum();
        prop_assert!(no_inventory <= result.summary.external_quantity);
    }

    #[test]
    fn external_total_is_exact_sum_of_keyed_events(events in arb_events()) {
        let result = reconcile_events(&[], &events).unwrap();
        let expected: i64 = events
            .iter()
            .filter(|e| !normalize_text(&e.key.to_text()).is_empty())
            .map(|e| e.quantity)
            .sum();
        prop_assert_eq!(result.summary.external_quantity, expected);
        // with no inventory, every keyed unit is unmatched
        prop_assert_eq!(result.summary.unmatched_quantity, expected);
    }
}
