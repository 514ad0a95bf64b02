//! Row-level variance allocation.
//!
//! Pure functions: a group's rows and the external quantity in, one
//! [`Allocation`] per row out. Both return `None` when a running total leaves
//! the `i64` range.

use crate::model::{Allocation, ClaimOutcome};

/// A row as seen by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocRow {
    pub row_id: usize,
    pub quantity: i64,
}

/// Result of allocating one matched group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupAllocation {
    pub allocations: Vec<Allocation>,
    /// External quantity beyond the internal total (`E - T` when `E > T`).
    pub surplus: i64,
}

/// Allocate a group with external quantity `external` over `rows` (original order).
///
/// - `external == 0`: nothing corroborates the rows, all stay `Unclaimed`.
/// - `external >= total`: every row is `FullyClaimed`, the excess is surplus.
/// - otherwise the variance `total - external` is claimed greedily, smallest
///   rows first (see [`claim_variance`]).
pub fn allocate_group(rows: &[AllocRow], external: i64) -> Option<GroupAllocation> {
    let total = rows
        .iter()
        .try_fold(0i64, |acc, r| acc.checked_add(r.quantity))?;

    if external == 0 {
        return Some(GroupAllocation {
            allocations: rows.iter().map(|r| unclaimed(r.row_id)).collect(),
            surplus: 0,
        });
    }

    if external >= total {
        return Some(GroupAllocation {
            allocations: rows
                .iter()
                .map(|r| Allocation {
                    row_id: r.row_id,
                    claimed_quantity: r.quantity,
                    outcome: ClaimOutcome::FullyClaimed,
                })
                .collect(),
            surplus: external.checked_sub(total)?,
        });
    }

    Some(GroupAllocation {
        allocations: claim_variance(rows, total.checked_sub(external)?)?,
        surplus: 0,
    })
}

/// Claim `variance` across `rows`, ascending by quantity with ties kept in
/// original order.
///
/// A row that fits the remaining need is `FullyClaimed`. The first row that
/// overshoots it is `PartiallyClaimed` for the remaining need and ends the
/// walk, even if it is the very first row, so a positive variance always
/// claims at least one row. Rows never reached stay `Unclaimed`.
///
/// Allocations are returned in the sorted walk order.
pub fn claim_variance(rows: &[AllocRow], variance: i64) -> Option<Vec<Allocation>> {
    let mut sorted: Vec<AllocRow> = rows.to_vec();
    sorted.sort_by_key(|r| r.quantity);

    let mut allocations = Vec::with_capacity(sorted.len());
    let mut remaining = variance;

    for row in sorted {
        if remaining <= 0 {
            allocations.push(unclaimed(row.row_id));
        } else if row.quantity <= remaining {
            remaining = remaining.checked_sub(row.quantity)?;
            allocations.push(Allocation {
                row_id: row.row_id,
                claimed_quantity: row.quantity,
                outcome: ClaimOutcome::FullyClaimed,
            });
        } else {
            allocations.push(Allocation {
                row_id: row.row_id,
                claimed_quantity: remaining,
                outcome: ClaimOutcome::PartiallyClaimed,
            });
            remaining = 0;
        }
    }

    Some(allocations)
}

fn unclaimed(row_id: usize) -> Allocation {
    Allocation { row_id, claimed_quantity: 0, outcome: ClaimOutcome::Unclaimed }
}
