//! Active catalog rules to distinct evaluation units

use indexmap::{IndexMap, IndexSet};
use tracing::warn;

use sg_storage::{ActiveRule, PositionKey};

use crate::rules::SignalRule;
use crate::types::EvaluationUnit;

/// Deduplicate catalog rules into evaluation units, first occurrence first
///
/// CDC rules collapse regardless of any EMA period on the row. EMA rules
/// without a positive period cannot be evaluated and are dropped.
pub fn group_units(rules: impl IntoIterator<Item = ActiveRule>) -> Vec<EvaluationUnit> {
    let mut units = IndexSet::new();

    for rule in rules {
        match SignalRule::from_parts(rule.rule_type, rule.ema_period) {
            Ok(signal_rule) => {
                units.insert(EvaluationUnit::new(rule.symbol, rule.timeframe, signal_rule));
            }
            Err(e) => warn!("Skipping catalog rule {}/{}: {}", rule.symbol, rule.timeframe, e),
        }
    }

    units.into_iter().collect()
}

/// Split units into runs sharing one position key, first key seen first
///
/// The key leaves out the EMA period, so `EMA(15)` and `EMA(50)` on one
/// symbol read and write the same record. Units of a run must be evaluated
/// one after another, in the order given.
pub fn partition_by_key(units: Vec<EvaluationUnit>) -> Vec<Vec<EvaluationUnit>> {
    let mut runs: IndexMap<PositionKey, Vec<EvaluationUnit>> = IndexMap::new();

    for unit in units {
        runs.entry(unit.key()).or_default().push(unit);
    }

    runs.into_values().collect()
}
