//! Timeliness metrics layered on top of classified lines and orders.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use crate::association::Categorical;
use crate::config::Dimension;
use crate::model::{ClassifiedLine, ClassifiedOrder, DelayCategory, Metrics};

/// Label used for rows missing the grouping value.
pub const MISSING_LABEL: &str = "(missing)";

/// `part / whole` as a percentage, 0 for an empty whole.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Missing expected dates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateGroupStats {
    pub lines: usize,
    pub share_pct: f64,
    pub without_deliveries: usize,
    pub without_deliveries_pct: f64,
    pub fully_delivered: usize,
    pub fully_delivered_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodCount {
    pub period: String,
    pub count: usize,
    pub pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MissingDateBreakdown {
    pub with_expected_date: DateGroupStats,
    pub without_expected_date: DateGroupStats,
    /// Lines without an expected date per order year, share of all such lines.
    pub missing_by_year: Vec<PeriodCount>,
}

fn group_stats<'a>(group: impl Iterator<Item = &'a ClassifiedLine>, total: usize) -> DateGroupStats {
    let mut stats = DateGroupStats::default();
    for line in group {
        stats.lines += 1;
        if line.delivery.delivery_count == 0 {
            stats.without_deliveries += 1;
        }
        if line.fully_delivered {
            stats.fully_delivered += 1;
        }
    }
    stats.share_pct = percentage(stats.lines, total);
    stats.without_deliveries_pct = percentage(stats.without_deliveries, stats.lines);
    stats.fully_delivered_pct = percentage(stats.fully_delivered, stats.lines);
    stats
}

pub fn missing_date_breakdown(lines: &[ClassifiedLine]) -> MissingDateBreakdown {
    let total = lines.len();
    let with_expected_date = group_stats(lines.iter().filter(|l| l.expected_delivery_date.is_some()), total);
    let without_expected_date = group_stats(lines.iter().filter(|l| l.expected_delivery_date.is_none()), total);

    let mut per_year: BTreeMap<String, usize> = BTreeMap::new();
    for line in lines.iter().filter(|l| l.expected_delivery_date.is_none()) {
        let year = line
            .order_date
            .map(|d| d.year().to_string())
            .unwrap_or_else(|| MISSING_LABEL.to_string());
        *per_year.entry(year).or_insert(0) += 1;
    }
    let missing_by_year = per_year
        .into_iter()
        .map(|(period, count)| PeriodCount {
            pct: percentage(count, without_expected_date.lines),
            period,
            count,
        })
        .collect();

    MissingDateBreakdown {
        with_expected_date,
        without_expected_date,
        missing_by_year,
    }
}

// ---------------------------------------------------------------------------
// Timeliness per group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimelinessRow {
    pub key: String,
    pub lines: usize,
    /// Lines with a defined delay (delivered and dated).
    pub measured: usize,
    pub early: usize,
    pub on_time: usize,
    pub late: usize,
    pub fully_delivered: usize,
    pub missing_expected_date: usize,
    pub mean_delay_days: Option<f64>,
    /// Early or on time, as a share of measured lines.
    pub on_time_rate_pct: Option<f64>,
}

/// Timeliness counts per value of `dimension`, sorted by key.
pub fn timeliness_by(lines: &[ClassifiedLine], dimension: Dimension) -> Vec<TimelinessRow> {
    let mut groups: BTreeMap<String, (TimelinessRow, i64)> = BTreeMap::new();

    for line in lines {
        let key = line.category(dimension).unwrap_or_else(|| MISSING_LABEL.to_string());
        let (row, delay_sum) = groups.entry(key).or_default();
        row.lines += 1;
        if line.fully_delivered {
            row.fully_delivered += 1;
        }
        if line.expected_delivery_date.is_none() {
            row.missing_expected_date += 1;
        }
        if let (Some(days), Some(category)) = (line.delivery_delay_days, line.delay_category) {
            row.measured += 1;
            *delay_sum += days;
            match category {
                DelayCategory::Early => row.early += 1,
                DelayCategory::OnTime => row.on_time += 1,
                DelayCategory::Late => row.late += 1,
            }
        }
    }

    groups
        .into_iter()
        .map(|(key, (mut row, delay_sum))| {
            row.key = key;
            if row.measured > 0 {
                row.mean_delay_days = Some(delay_sum as f64 / row.measured as f64);
                row.on_time_rate_pct = Some(percentage(row.early + row.on_time, row.measured));
            }
            row
        })
        .collect()
}

/// Orders per order month (`YYYY-MM`), chronological.
pub fn orders_per_month(orders: &[ClassifiedOrder]) -> Vec<PeriodCount> {
    let mut per_month: BTreeMap<String, usize> = BTreeMap::new();
    for order in orders {
        if let Some(d) = order.order_date {
            *per_month.entry(d.format("%Y-%m").to_string()).or_insert(0) += 1;
        }
    }
    let dated: usize = per_month.values().sum();
    per_month
        .into_iter()
        .map(|(period, count)| PeriodCount {
            pct: percentage(count, dated),
            period,
            count,
        })
        .collect()
}

pub fn compute_metrics(lines: &[ClassifiedLine], orders: &[ClassifiedOrder]) -> Metrics {
    Metrics {
        missing_dates: missing_date_breakdown(lines),
        by_supplier: timeliness_by(lines, Dimension::Supplier),
        by_responsible_party: timeliness_by(lines, Dimension::ResponsibleParty),
        by_month: timeliness_by(lines, Dimension::OrderMonth),
        orders_per_month: orders_per_month(orders),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{delay_between, DeliveryFact};
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn cl(supplier: &str, ordered: &str, expected: Option<&str>, actual: Option<&str>, fully: bool) -> ClassifiedLine {
        let expected = expected.map(d);
        let actual = actual.map(d);
        let delay = delay_between(actual, expected);
        ClassifiedLine {
            line_id: "l".into(),
            order_id: "o".into(),
            order_date: Some(d(ordered)),
            expected_delivery_date: expected,
            quantity_ordered: 1.0,
            supplier_name: supplier.into(),
            responsible_party: None,
            status: None,
            delivery: DeliveryFact {
                delivery_count: usize::from(actual.is_some()),
                total_received: if fully { 1.0 } else { 0.0 },
                last_received_date: actual,
            },
            fully_delivered: fully,
            delivery_delay_days: delay,
            delay_category: delay.map(DelayCategory::from_delay_days),
        }
    }

    #[test]
    fn percentage_of_empty_is_zero() {
        assert_eq!(percentage(3, 0), 0.0);
        assert_eq!(percentage(1, 4), 25.0);
    }

    #[test]
    fn breakdown_splits_on_expected_date() {
        let lines = vec![
            cl("Acme", "2023-01-10", None, None, false),
            cl("Acme", "2023-02-10", None, Some("2023-02-20"), true),
            cl("Acme", "2024-01-10", None, None, false),
            cl("Acme", "2024-01-10", Some("2024-01-20"), Some("2024-01-21"), true),
        ];
        let b = missing_date_breakdown(&lines);
        assert_eq!(b.without_expected_date.lines, 3);
        assert_eq!(b.without_expected_date.share_pct, 75.0);
        assert_eq!(b.without_expected_date.without_deliveries, 2);
        assert_eq!(b.without_expected_date.fully_delivered, 1);
        assert_eq!(b.with_expected_date.lines, 1);
        assert_eq!(b.with_expected_date.fully_delivered_pct, 100.0);

        assert_eq!(b.missing_by_year.len(), 2);
        assert_eq!(b.missing_by_year[0].period, "2023");
        assert_eq!(b.missing_by_year[0].count, 2);
        assert!((b.missing_by_year[1].pct - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn timeliness_per_supplier() {
        let lines = vec![
            cl("Acme", "2024-01-01", Some("2024-01-10"), Some("2024-01-08"), true),
            cl("Acme", "2024-01-01", Some("2024-01-10"), Some("2024-01-14"), true),
            cl("Acme", "2024-01-01", Some("2024-01-10"), None, false),
            cl("Globex", "2024-02-01", Some("2024-02-10"), Some("2024-02-10"), true),
        ];
        let rows = timeliness_by(&lines, Dimension::Supplier);
        assert_eq!(rows.len(), 2);

        let acme = &rows[0];
        assert_eq!(acme.key, "Acme");
        assert_eq!(acme.lines, 3);
        assert_eq!(acme.measured, 2);
        assert_eq!((acme.early, acme.on_time, acme.late), (1, 0, 1));
        assert_eq!(acme.mean_delay_days, Some(1.0));
        assert_eq!(acme.on_time_rate_pct, Some(50.0));

        let globex = &rows[1];
        assert_eq!(globex.on_time, 1);
        assert_eq!(globex.on_time_rate_pct, Some(100.0));
    }

    #[test]
    fn unmeasured_group_has_no_rates() {
        let lines = vec![cl("Acme", "2024-01-01", None, None, false)];
        let rows = timeliness_by(&lines, Dimension::ResponsibleParty);
        assert_eq!(rows[0].key, MISSING_LABEL);
        assert_eq!(rows[0].mean_delay_days, None);
        assert_eq!(rows[0].on_time_rate_pct, None);
        assert_eq!(rows[0].missing_expected_date, 1);
    }

    #[test]
    fn monthly_grouping_is_chronological() {
        let lines = vec![
            cl("Acme", "2024-03-05", None, None, false),
            cl("Acme", "2024-01-05", None, None, false),
            cl("Acme", "2024-03-25", None, None, false),
        ];
        let rows = timeliness_by(&lines, Dimension::OrderMonth);
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-01", "2024-03"]);
        assert_eq!(rows[1].lines, 2);
    }
}
