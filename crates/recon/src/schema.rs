//! Column-role resolution and external source shape detection.
//!
//! Roles are resolved once per table into a typed column mapping. An exact
//! pass runs over every role before any substring matching, and a column is
//! assigned to at most one role.

use crate::config::{DetailRoles, ExternalRoles, RolePredicates};
use crate::error::ReconError;

pub const DETAIL_TABLE: &str = "detail";
pub const EXTERNAL_TABLE: &str = "external";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailColumns {
    pub primary_key: usize,
    pub fallback_key: Option<usize>,
    pub quantity: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventColumns {
    pub key: usize,
    pub quantity: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateColumns {
    pub key: usize,
    pub internal: usize,
    pub external: usize,
    /// Absent in the 3-column shape; variance is then internal - external.
    pub variance: Option<usize>,
}

/// What kind of external source we were handed, decided from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalShape {
    Events(EventColumns),
    Aggregates(AggregateColumns),
}

/// Resolve an ordered list of roles against a header row.
///
/// Returns one slot per role, in the same order.
fn resolve_roles(
    table: &str,
    headers: &[String],
    roles: &[(&str, &RolePredicates)],
) -> Result<Vec<Option<usize>>, ReconError> {
    let mut assigned: Vec<Option<usize>> = vec![None; roles.len()];
    let mut taken = vec![false; headers.len()];

    for (slot, (role, predicates)) in roles.iter().enumerate() {
        let hits: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(i, h)| !taken[*i] && predicates.matches_exact(h))
            .map(|(i, _)| i)
            .collect();
        if hits.len() > 1 {
            return Err(ReconError::AmbiguousColumn {
                table: table.into(),
                role: (*role).into(),
                columns: hits.iter().map(|&i| headers[i].clone()).collect(),
            });
        }
        if let Some(&i) = hits.first() {
            taken[i] = true;
            assigned[slot] = Some(i);
        }
    }

    for (slot, (_, predicates)) in roles.iter().enumerate() {
        if assigned[slot].is_some() {
            continue;
        }
        let hit = headers
            .iter()
            .enumerate()
            .find(|(i, h)| !taken[*i] && predicates.matches_contains(h))
            .map(|(i, _)| i);
        if let Some(i) = hit {
            taken[i] = true;
            assigned[slot] = Some(i);
        }
    }

    Ok(assigned)
}

fn required(
    table: &str,
    role: &str,
    predicates: &RolePredicates,
    slot: Option<usize>,
) -> Result<usize, ReconError> {
    slot.ok_or_else(|| ReconError::MissingColumn {
        table: table.into(),
        role: role.into(),
        candidates: predicates.candidates(),
    })
}

/// Map the detail table's header onto primary key / fallback key / quantity.
pub fn resolve_detail(headers: &[String], roles: &DetailRoles) -> Result<DetailColumns, ReconError> {
    let slots = resolve_roles(
        DETAIL_TABLE,
        headers,
        &[
            ("primary_key", &roles.primary_key),
            ("fallback_key", &roles.fallback_key),
            ("quantity", &roles.quantity),
        ],
    )?;

    Ok(DetailColumns {
        primary_key: required(DETAIL_TABLE, "primary_key", &roles.primary_key, slots[0])?,
        fallback_key: slots[1],
        quantity: slots[2],
    })
}

/// Decide the external source's shape and map its columns.
///
/// A source that carries both an internal and an external total column is
/// pre-aggregated and must be exactly 3 or 4 columns wide. Anything else is a
/// raw event list that only needs a key column.
pub fn detect_external(headers: &[String], roles: &ExternalRoles) -> Result<ExternalShape, ReconError> {
    let slots = resolve_roles(
        EXTERNAL_TABLE,
        headers,
        &[
            ("key", &roles.key),
            ("internal_total", &roles.internal_total),
            ("external_total", &roles.external_total),
            ("variance", &roles.variance),
            ("quantity", &roles.quantity),
        ],
    )?;
    let key = required(EXTERNAL_TABLE, "key", &roles.key, slots[0])?;

    match (slots[1], slots[2]) {
        (Some(internal), Some(external)) => {
            let columns = headers.len();
            let variance = match columns {
                3 => None,
                4 => Some(required(EXTERNAL_TABLE, "variance", &roles.variance, slots[3])?),
                _ => {
                    return Err(ReconError::UnexpectedShape {
                        table: EXTERNAL_TABLE.into(),
                        columns,
                    })
                }
            };
            Ok(ExternalShape::Aggregates(AggregateColumns {
                key,
                internal,
                external,
                variance,
            }))
        }
        _ => Ok(ExternalShape::Events(EventColumns {
            key,
            quantity: slots[4],
        })),
    }
}
