use crate::model::{
    Category, ClaimOutcome, DetailRecord, KeyStatus, KeyVariance, MatchedVia, ReconSummary,
    RowOutcome, UnmatchedDemand,
};

/// Per-row state written back by matching + allocation. Rows never visited by
/// a matched group stay at the default (unmatched, unclaimed).
#[derive(Debug, Clone)]
pub struct RowClaim {
    pub matched_key: Option<String>,
    pub matched_via: MatchedVia,
    pub claimed_quantity: i64,
    pub outcome: ClaimOutcome,
}

impl Default for RowClaim {
    fn default() -> Self {
        Self {
            matched_key: None,
            matched_via: MatchedVia::None,
            claimed_quantity: 0,
            outcome: ClaimOutcome::Unclaimed,
        }
    }
}

/// Row partition a claim outcome lands in.
pub fn category_for(outcome: ClaimOutcome) -> Category {
    match outcome {
        ClaimOutcome::FullyClaimed => Category::PreviouslyReceived,
        ClaimOutcome::PartiallyClaimed => Category::ReadyToReceive,
        ClaimOutcome::Unclaimed => Category::Remaining,
    }
}

/// The three detail-row partitions, each in original row order.
#[derive(Debug, Default)]
pub struct RowPartition {
    pub previously_received: Vec<RowOutcome>,
    pub ready_to_receive: Vec<RowOutcome>,
    pub remaining: Vec<RowOutcome>,
}

/// Split detail rows by claim outcome. `claims[i]` belongs to `details[i]`;
/// every row lands in exactly one partition.
pub fn partition_rows(details: &[DetailRecord], claims: &[RowClaim]) -> RowPartition {
    let mut partition = RowPartition::default();

    for (row, claim) in details.iter().zip(claims) {
        let outcome = RowOutcome {
            row_id: row.row_id,
            primary_key: row.primary_key.to_text(),
            fallback_key: row
                .fallback_key
                .as_ref()
                .filter(|c| !c.is_empty())
                .map(|c| c.to_text()),
            matched_key: claim.matched_key.clone(),
            matched_via: claim.matched_via,
            quantity: row.quantity,
            claimed_quantity: claim.claimed_quantity,
            outcome: claim.outcome,
        };
        match category_for(claim.outcome) {
            Category::PreviouslyReceived => partition.previously_received.push(outcome),
            Category::ReadyToReceive => partition.ready_to_receive.push(outcome),
            Category::Remaining => partition.remaining.push(outcome),
        }
    }

    partition
}

/// Build a per-key line.
pub fn key_line(
    key: &str,
    internal: i64,
    external: i64,
    variance: i64,
    matched_via: MatchedVia,
) -> KeyVariance {
    KeyVariance {
        key: key.to_string(),
        internal,
        external,
        variance,
        matched_via,
        status: KeyStatus::classify(internal, external, variance),
    }
}

/// Largest discrepancies first, then by key.
pub fn sort_keys(keys: &mut [KeyVariance]) {
    keys.sort_by(|a, b| {
        b.variance
            .unsigned_abs()
            .cmp(&a.variance.unsigned_abs())
            .then_with(|| a.key.cmp(&b.key))
    });
}

/// Quantity totals, summed with overflow checks by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct Totals {
    pub internal: i64,
    pub external: i64,
    pub variance: i64,
    pub unmatched: i64,
}

/// Compute summary statistics from the classified partitions.
pub fn compute_summary(
    rows: &RowPartition,
    unmatched: &[UnmatchedDemand],
    keys: &[KeyVariance],
    totals: Totals,
) -> ReconSummary {
    let mut summary = ReconSummary {
        previously_received: rows.previously_received.len(),
        ready_to_receive: rows.ready_to_receive.len(),
        remaining: rows.remaining.len(),
        unmatched: unmatched.len(),
        unmatched_quantity: totals.unmatched,
        internal_quantity: totals.internal,
        external_quantity: totals.external,
        variance: totals.variance,
        keys_total: keys.len(),
        ..ReconSummary::default()
    };
    summary.total_rows = summary.previously_received + summary.ready_to_receive + summary.remaining;

    for k in keys {
        match k.status {
            KeyStatus::Reconciled => summary.keys_reconciled += 1,
            KeyStatus::MissingExternally => {
                summary.keys_with_variance += 1;
                summary.keys_missing_externally += 1;
            }
            KeyStatus::MissingInternally => {
                summary.keys_with_variance += 1;
                summary.keys_missing_internally += 1;
            }
            KeyStatus::InternalSurplus | KeyStatus::ExternalSurplus => {
                summary.keys_with_variance += 1
            }
        }
    }

    summary
}
