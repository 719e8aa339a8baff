use std::collections::HashSet;

use serde::Serialize;

use crate::aggregate::DeliveryIndex;
use crate::classify::LineClassification;
use crate::metrics::percentage;
use crate::model::OrderLine;
use crate::rollup::OrderRollup;

/// Per-row issues found during a run. None of them stop the run.
///
/// Counts come from two scopes. Line and order counts cover the lines kept
/// by the selection and filters. Event counts (`delivery_events`,
/// `invalid_event_quantities`, `events_missing_line_id`, `orphan_events`)
/// and `unparsable_dates` cover the whole loaded input, since receipts are
/// aggregated over the full event table and dates are parsed at load time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataQualityReport {
    pub classified_lines: usize,
    pub delivery_events: usize,
    pub missing_expected_date: usize,
    pub missing_expected_date_pct: f64,
    pub expected_before_order: usize,
    pub invalid_line_quantities: usize,
    pub invalid_event_quantities: usize,
    /// Date cells in either source that could not be parsed. Whole input.
    pub unparsable_dates: usize,
    pub missing_line_id: usize,
    /// Lines with no order id, left out of every order.
    pub missing_order_id: usize,
    pub events_missing_line_id: usize,
    /// Events referencing a line id absent from the order-line table.
    pub orphan_events: usize,
    pub inconsistent_orders: Vec<String>,
    pub multi_supplier_orders: Vec<String>,
}

impl DataQualityReport {
    pub fn issue_count(&self) -> usize {
        self.missing_expected_date
            + self.expected_before_order
            + self.invalid_line_quantities
            + self.invalid_event_quantities
            + self.unparsable_dates
            + self.missing_line_id
            + self.missing_order_id
            + self.events_missing_line_id
            + self.orphan_events
            + self.inconsistent_orders.len()
            + self.multi_supplier_orders.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }

    fn log_warnings(&self) {
        let classes = [
            ("lines without an expected delivery date", self.missing_expected_date),
            ("lines expected before their order date", self.expected_before_order),
            ("lines with an unparsable quantity", self.invalid_line_quantities),
            ("delivery events with an unparsable quantity", self.invalid_event_quantities),
            ("unparsable date cells", self.unparsable_dates),
            ("order lines without a line id", self.missing_line_id),
            ("order lines without an order id", self.missing_order_id),
            ("delivery events without a line id", self.events_missing_line_id),
            ("delivery events for unknown lines", self.orphan_events),
            ("orders with inconsistent expected dates", self.inconsistent_orders.len()),
            ("orders spanning several suppliers", self.multi_supplier_orders.len()),
        ];
        for (what, count) in classes {
            if count > 0 {
                log::warn!("data quality: {count} {what}");
            }
        }
    }
}

/// Number of events whose line id is not in the base order-line table.
///
/// Checked against the unfiltered table: a line dropped by a filter still
/// owns its deliveries.
pub fn count_orphan_events(index: &DeliveryIndex, base_lines: &[OrderLine]) -> usize {
    let known: HashSet<&str> = base_lines.iter().map(|l| l.line_id.as_str()).collect();
    index
        .iter()
        .filter(|(line_id, _)| !known.contains(line_id.as_str()))
        .map(|(_, fact)| fact.delivery_count)
        .sum()
}

pub fn compute_quality(
    classification: &LineClassification,
    index: &DeliveryIndex,
    rollup: &OrderRollup,
    delivery_events: usize,
    orphan_events: usize,
    unparsable_dates: usize,
) -> DataQualityReport {
    let classified_lines = classification.lines.len();
    let report = DataQualityReport {
        classified_lines,
        delivery_events,
        missing_expected_date: classification.missing_expected_date,
        missing_expected_date_pct: percentage(classification.missing_expected_date, classified_lines),
        expected_before_order: classification.expected_before_order,
        invalid_line_quantities: classification.invalid_quantities,
        invalid_event_quantities: index.invalid_quantities,
        unparsable_dates,
        missing_line_id: classification.missing_line_id,
        missing_order_id: classification.missing_order_id,
        events_missing_line_id: index.events_missing_line_id,
        orphan_events,
        inconsistent_orders: rollup.inconsistent_orders.clone(),
        multi_supplier_orders: rollup.multi_supplier_orders.clone(),
    };
    report.log_warnings();
    report
}
