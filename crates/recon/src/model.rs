use serde::Serialize;

use crate::table::Cell;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One internal inventory line. `row_id` is the 0-based data row index in the
/// caller's detail table.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    pub row_id: usize,
    pub primary_key: Cell,
    pub fallback_key: Option<Cell>,
    pub quantity: i64,
}

/// One raw external scan / comparison line.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEvent {
    pub key: Cell,
    pub quantity: i64,
}

/// One pre-aggregated external line (aggregate-diff mode).
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateLine {
    pub key: Cell,
    pub internal: i64,
    pub external: i64,
    pub variance: i64,
}

// ---------------------------------------------------------------------------
// Aggregation + matching
// ---------------------------------------------------------------------------

/// External demand for a single normalized key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedDemand {
    pub key: String,
    pub total_quantity: i64,
    pub event_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedVia {
    Primary,
    Fallback,
    None,
}

/// A demand plus the detail rows (indices into the detail slice, original
/// order) that carry its key.
#[derive(Debug, Clone)]
pub struct MatchGroup {
    pub demand: AggregatedDemand,
    pub matched_rows: Vec<usize>,
    pub matched_via: MatchedVia,
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    FullyClaimed,
    PartiallyClaimed,
    Unclaimed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub row_id: usize,
    pub claimed_quantity: i64,
    pub outcome: ClaimOutcome,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Partition a detail row is reported in. Unmatched demand is not a row and
/// is reported separately as [`UnmatchedDemand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    PreviouslyReceived,
    ReadyToReceive,
    Remaining,
}

/// A detail row as reported in one of the three row partitions.
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
    pub row_id: usize,
    pub primary_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_key: Option<String>,
    /// Normalized key of the demand this row was matched to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_key: Option<String>,
    pub matched_via: MatchedVia,
    pub quantity: i64,
    pub claimed_quantity: i64,
    pub outcome: ClaimOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// No internal row carries the key.
    NoInventory,
    /// External quantity exceeds the internal total for the key.
    Surplus,
}

/// Demand-side quantity with no (or insufficient) internal coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedDemand {
    pub key: String,
    pub quantity: i64,
    pub reason: UnmatchedReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Reconciled,
    InternalSurplus,
    ExternalSurplus,
    MissingExternally,
    MissingInternally,
}

impl KeyStatus {
    /// Status of a key from its totals and signed variance (internal - external).
    pub fn classify(internal: i64, external: i64, variance: i64) -> Self {
        if variance == 0 {
            Self::Reconciled
        } else if external == 0 {
            Self::MissingExternally
        } else if internal == 0 {
            Self::MissingInternally
        } else if variance > 0 {
            Self::InternalSurplus
        } else {
            Self::ExternalSurplus
        }
    }
}

/// Per-key variance line.
#[derive(Debug, Clone, Serialize)]
pub struct KeyVariance {
    pub key: String,
    pub internal: i64,
    pub external: i64,
    pub variance: i64,
    pub matched_via: MatchedVia,
    pub status: KeyStatus,
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconMode {
    /// Raw external events, aggregated and allocated across detail rows.
    RowLevel,
    /// External source already carries per-key internal/external/variance.
    AggregateDiff,
}

impl std::fmt::Display for ReconMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RowLevel => write!(f, "row_level"),
            Self::AggregateDiff => write!(f, "aggregate_diff"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub total_rows: usize,
    pub previously_received: usize,
    pub ready_to_receive: usize,
    pub remaining: usize,
    pub unmatched: usize,
    pub unmatched_quantity: i64,
    pub internal_quantity: i64,
    pub external_quantity: i64,
    /// internal - external
    pub variance: i64,
    pub keys_total: usize,
    pub keys_reconciled: usize,
    pub keys_with_variance: usize,
    pub keys_missing_externally: usize,
    pub keys_missing_internally: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub mode: ReconMode,
    pub summary: ReconSummary,
    pub previously_received: Vec<RowOutcome>,
    pub ready_to_receive: Vec<RowOutcome>,
    pub remaining: Vec<RowOutcome>,
    pub unmatched: Vec<UnmatchedDemand>,
    pub keys: Vec<KeyVariance>,
}

impl ReconResult {
    /// True when every key reconciled and no demand went unmatched.
    pub fn is_clean(&self) -> bool {
        self.unmatched.is_empty() && self.keys.iter().all(|k| k.variance == 0)
    }
}
