//! Module: reference
//! Responsibility: single-threaded ground-truth aggregation.
//! Does not own: capacity limits or batching.
//! Boundary: used only when a run asks for verification.

use crate::{
    function::{AggregateFunction, AggregateState, FunctionError},
    index::RecordSet,
    obs::sink::{self, MetricsEvent},
    result::ResultMapping,
    sampling::SamplingPlan,
};
use std::collections::HashMap;

///
/// ReferenceAggregator
///
/// Walks the sampling plan row by row in plan order.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReferenceAggregator {
    function: AggregateFunction,
}

impl ReferenceAggregator {
    #[must_use]
    pub const fn new(function: AggregateFunction) -> Self {
        Self { function }
    }

    pub fn aggregate(
        &self,
        records: &RecordSet,
        plan: &SamplingPlan,
    ) -> Result<ResultMapping, FunctionError> {
        let mut table: HashMap<&[u8], AggregateState> = HashMap::new();
        for range in plan.ranges() {
            for row in range.start()..range.end_exclusive() {
                let state = table
                    .entry(records.key(row))
                    .or_insert_with(|| self.function.init_state());
                self.function.add(state, records.value(row))?;
            }
        }

        let result_keys = table.len() as u64;
        sink::record(MetricsEvent::ReferenceAggregated {
            function: self.function,
            result_keys,
        });

        Ok(table
            .into_iter()
            .map(|(key, state)| (Box::from(key), state))
            .collect())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sampling::SamplingRange,
        test_support::{five_records, full_plan, results},
    };

    #[test]
    fn counts_five_records() {
        let records = five_records();
        let mapping = ReferenceAggregator::new(AggregateFunction::Count)
            .aggregate(&records, &full_plan(&records))
            .expect("aggregate");

        assert_eq!(
            results(&mapping, AggregateFunction::Count),
            vec![
                ("a".to_string(), 2),
                ("b".to_string(), 2),
                ("c".to_string(), 1),
            ]
        );
    }

    #[test]
    fn overlapping_ranges_revisit_rows() {
        let records = five_records();
        let ranges = [SamplingRange::new(0, 2), SamplingRange::new(2, 2)];
        let plan = SamplingPlan::resolve(Some(&ranges), records.len()).expect("plan");
        let mapping = ReferenceAggregator::new(AggregateFunction::Count)
            .aggregate(&records, &plan)
            .expect("aggregate");

        // row 2 ("a") is visited by both ranges
        assert_eq!(
            results(&mapping, AggregateFunction::Count),
            vec![("a".to_string(), 3), ("b".to_string(), 1)]
        );
    }

    #[test]
    fn distinct_counts_values_per_key() {
        let records = crate::test_support::record_set(&[
            ("k", "x"),
            ("k", "y"),
            ("k", "x"),
            ("j", "x"),
        ]);
        let mapping = ReferenceAggregator::new(AggregateFunction::UniqHll12)
            .aggregate(&records, &full_plan(&records))
            .expect("aggregate");

        assert_eq!(
            results(&mapping, AggregateFunction::UniqHll12),
            vec![("j".to_string(), 1), ("k".to_string(), 2)]
        );
    }

    #[test]
    fn empty_plan_yields_empty_mapping() {
        let records = crate::test_support::record_set::<&str, &str>(&[]);
        let mapping = ReferenceAggregator::new(AggregateFunction::Count)
            .aggregate(&records, &full_plan(&records))
            .expect("aggregate");

        assert!(mapping.is_empty());
    }
}
