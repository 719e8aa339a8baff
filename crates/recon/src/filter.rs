//! Row selection applied to the base order-line table before classification.

use std::collections::BTreeSet;

use chrono::Datelike;
use serde::Serialize;

use crate::config::FilterConfig;
use crate::model::OrderLine;
use crate::resolve::expected_delivery_dates;

/// Interactive selection: order years and suppliers. Empty sets admit everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub years: BTreeSet<i32>,
    pub suppliers: BTreeSet<String>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_years(mut self, years: impl IntoIterator<Item = i32>) -> Self {
        self.years.extend(years);
        self
    }

    pub fn with_suppliers<S: Into<String>>(mut self, suppliers: impl IntoIterator<Item = S>) -> Self {
        self.suppliers.extend(suppliers.into_iter().map(Into::into));
        self
    }

    pub fn admits(&self, line: &OrderLine) -> bool {
        let year_ok = self.years.is_empty()
            || line.order_date.is_some_and(|d| self.years.contains(&d.year()));
        let supplier_ok = self.suppliers.is_empty() || self.suppliers.contains(&line.supplier_name);
        year_ok && supplier_ok
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSummary {
    pub input_lines: usize,
    pub kept_lines: usize,
    pub outside_selection: usize,
    pub excluded_year: usize,
    pub excluded_status: usize,
    pub lead_time_exceeded: usize,
    pub expected_before_order: usize,
}

/// Keep the lines admitted by the selection and the configured rules.
///
/// Each dropped line is counted under the first rule that rejected it.
pub fn apply_filters(
    lines: &[OrderLine],
    filters: &FilterConfig,
    selection: &Selection,
) -> (Vec<OrderLine>, FilterSummary) {
    let expected = expected_delivery_dates(lines);
    let mut summary = FilterSummary {
        input_lines: lines.len(),
        ..Default::default()
    };
    let mut kept = Vec::with_capacity(lines.len());

    for (line, expected_date) in lines.iter().zip(expected) {
        let lead_time = match (expected_date, line.order_date) {
            (Some(e), Some(o)) => Some((e - o).num_days()),
            _ => None,
        };

        if !selection.admits(line) {
            summary.outside_selection += 1;
        } else if line
            .order_date
            .is_some_and(|d| filters.exclude_years.contains(&d.year()))
        {
            summary.excluded_year += 1;
        } else if line
            .status
            .as_ref()
            .is_some_and(|s| filters.exclude_statuses.contains(s))
        {
            summary.excluded_status += 1;
        } else if matches!((lead_time, filters.max_lead_time_days), (Some(lt), Some(max)) if lt > max) {
            summary.lead_time_exceeded += 1;
        } else if filters.drop_expected_before_order && lead_time.is_some_and(|lt| lt < 0) {
            summary.expected_before_order += 1;
        } else {
            kept.push(line.clone());
        }
    }

    summary.kept_lines = kept.len();
    log::debug!("filters kept {} of {} order lines", summary.kept_lines, summary.input_lines);
    (kept, summary)
}
