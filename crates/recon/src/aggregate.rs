use std::collections::HashMap;

use crate::error::ReconError;
use crate::model::{AggregatedDemand, ExternalEvent};
use crate::normalize::{normalize_key, overflow};

/// Group events by normalized key and sum their quantities.
///
/// Events whose key normalizes to the empty string are dropped entirely.
/// Groups come back in first-appearance order. A key whose total leaves the
/// `i64` range is an error.
pub fn aggregate_events(events: &[ExternalEvent]) -> Result<Vec<AggregatedDemand>, ReconError> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut demands: Vec<AggregatedDemand> = Vec::new();
    let mut dropped = 0usize;

    for event in events {
        let key = normalize_key(&event.key);
        if key.is_empty() {
            dropped += 1;
            continue;
        }
        match index.get(&key) {
            Some(&i) => {
                let demand = &mut demands[i];
                demand.total_quantity = demand
                    .total_quantity
                    .checked_add(event.quantity)
                    .ok_or_else(|| overflow(&demand.key))?;
                demand.event_count += 1;
            }
            None => {
                index.insert(key.clone(), demands.len());
                demands.push(AggregatedDemand {
                    key,
                    total_quantity: event.quantity,
                    event_count: 1,
                });
            }
        }
    }

    if dropped > 0 {
        tracing::debug!("aggregate: skipped {dropped} event(s) with an empty key");
    }
    Ok(demands)
}
