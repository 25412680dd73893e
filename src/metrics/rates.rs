use std::collections::BTreeMap;

use tracing::debug;

use super::base::{endpoint_matches, has_endpoint, Direction, EntityRef, RESPONSE_CODE_LABEL};
use crate::parsing::{is_error_code, parse_sample_value};
use crate::types::Sample;

/// Request rates seen from one entity, summed per response code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateBundle {
    pub inbound: BTreeMap<String, f64>,
    pub outbound: BTreeMap<String, f64>,
}

/// Error and total rate for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateTotals {
    pub errors: f64,
    pub total: f64,
}

impl RateTotals {
    pub fn from_codes(codes: &BTreeMap<String, f64>) -> Self {
        let mut totals = RateTotals::default();
        for (code, rate) in codes {
            if is_error_code(code) {
                totals.errors += rate;
            }
            totals.total += rate;
        }
        totals
    }
}

impl RateBundle {
    pub fn inbound_totals(&self) -> RateTotals {
        RateTotals::from_codes(&self.inbound)
    }

    pub fn outbound_totals(&self) -> RateTotals {
        RateTotals::from_codes(&self.outbound)
    }

    pub fn is_empty(&self) -> bool {
        self.inbound.is_empty() && self.outbound.is_empty()
    }
}

/// Split a sample vector into inbound and outbound rates for `entity`.
///
/// Samples without a response code, without any endpoint label or with an
/// unusable value are skipped. A sample whose source and destination are both
/// the entity is counted in both directions.
pub fn parse_rates(samples: &[Sample], entity: &EntityRef) -> RateBundle {
    let mut bundle = RateBundle::default();
    let mut skipped = 0usize;

    for sample in samples {
        let code = match sample.label(RESPONSE_CODE_LABEL) {
            Some(c) if !c.is_empty() => c,
            _ => {
                skipped += 1;
                continue;
            }
        };
        if !has_endpoint(sample, Direction::Source)
            && !has_endpoint(sample, Direction::Destination)
        {
            skipped += 1;
            continue;
        }
        let value = match parse_sample_value(&sample.value) {
            Some(v) => v,
            None => {
                skipped += 1;
                continue;
            }
        };

        if endpoint_matches(sample, Direction::Destination, entity) {
            *bundle.inbound.entry(code.to_string()).or_insert(0.0) += value;
        }
        if endpoint_matches(sample, Direction::Source, entity) {
            *bundle.outbound.entry(code.to_string()).or_insert(0.0) += value;
        }
    }

    if skipped > 0 {
        debug!(
            "skipped {} malformed samples while reading rates for {}/{}",
            skipped, entity.namespace, entity.name
        );
    }
    bundle
}
