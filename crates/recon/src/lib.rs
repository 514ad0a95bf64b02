//! `stockrecon-recon`: inventory detail vs. external count reconciliation.
//!
//! Pure engine crate: receives loaded tables, returns classified results.
//! No CLI dependencies. The only IO is the CSV table loader.

pub mod aggregate;
pub mod allocate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod schema;
pub mod table;

pub use config::ReconConfig;
pub use engine::{reconcile, reconcile_aggregates, reconcile_events};
pub use error::ReconError;
pub use model::{
    AggregateLine, ClaimOutcome, DetailRecord, ExternalEvent, KeyStatus, MatchedVia, ReconMode,
    ReconResult, ReconSummary, RowOutcome, UnmatchedDemand, UnmatchedReason,
};
pub use table::{Cell, Table};
