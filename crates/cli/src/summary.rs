//! Human-readable summaries, written to stderr so stdout stays JSON-only.

use otd_recon::metrics::TimelinessRow;
use otd_recon::{AssociationOutcome, AssociationReport, ContingencyResult, Granularity, PipelineResult};

pub fn granularity_label(granularity: Granularity) -> &'static str {
    match granularity {
        Granularity::Line => "line",
        Granularity::Order => "order",
    }
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}{suffix}"))
}

pub fn print_run_summary(result: &PipelineResult) {
    let f = &result.filters;
    let q = &result.quality;

    eprintln!(
        "{}: {} of {} lines kept, {} orders",
        result.meta.config_name,
        f.kept_lines,
        f.input_lines,
        result.orders.len()
    );
    let dropped = f.input_lines - f.kept_lines;
    if dropped > 0 {
        eprintln!(
            "filtered: {} outside selection, {} excluded year, {} excluded status, {} lead time, {} expected before order",
            f.outside_selection, f.excluded_year, f.excluded_status, f.lead_time_exceeded, f.expected_before_order,
        );
    }

    let lines = &result.lines;
    let fully = lines.iter().filter(|l| l.fully_delivered).count();
    let measured: Vec<_> = lines.iter().filter_map(|l| l.delay_category).collect();
    eprintln!(
        "lines: {} fully delivered, {} with a measured delay, {} without expected date ({:.1}%)",
        fully,
        measured.len(),
        q.missing_expected_date,
        q.missing_expected_date_pct,
    );

    eprintln!("by supplier:");
    print_timeliness(&result.metrics.by_supplier);

    if !q.is_clean() {
        eprintln!(
            "data quality: {} issue(s) ({} unparsable dates, {} invalid quantities, {} lines without id, {} orphan events, {} inconsistent orders, {} multi-supplier orders)",
            q.issue_count(),
            q.unparsable_dates,
            q.invalid_line_quantities + q.invalid_event_quantities,
            q.missing_line_id + q.missing_order_id,
            q.orphan_events,
            q.inconsistent_orders.len(),
            q.multi_supplier_orders.len(),
        );
    }

    print_association(&result.association);
}

fn print_timeliness(rows: &[TimelinessRow]) {
    for row in rows {
        eprintln!(
            "  {:<24} {:>6} lines  {:>4} early {:>4} on time {:>4} late  mean {:>7}  on-time {:>7}",
            row.key,
            row.lines,
            row.early,
            row.on_time,
            row.late,
            fmt_opt(row.mean_delay_days, "d"),
            fmt_opt(row.on_time_rate_pct, "%"),
        );
    }
}

pub fn print_association(report: &AssociationReport) {
    eprintln!(
        "association: {} x {} per {} (top {})",
        report.rows,
        report.columns,
        granularity_label(report.granularity),
        report.top_n
    );
    match &report.outcome {
        AssociationOutcome::Tested(table) => print_table(table),
        AssociationOutcome::InsufficientData { detail } => eprintln!("  not tested: {detail}"),
    }
}

fn print_table(table: &ContingencyResult) {
    let label_width = table.row_labels.iter().map(String::len).max().unwrap_or(0).max(8);

    let mut header = format!("  {:<label_width$}", "");
    for c in &table.column_labels {
        header.push_str(&format!(" {c:>10}"));
    }
    eprintln!("{header}");
    for (label, row) in table.row_labels.iter().zip(&table.observed) {
        let mut line = format!("  {label:<label_width$}");
        for count in row {
            line.push_str(&format!(" {count:>10}"));
        }
        eprintln!("{line}");
    }

    eprintln!(
        "  n = {}, other = {}, missing = {}",
        table.n, table.other_count, table.missing_count
    );
    eprintln!(
        "  chi2 = {:.4}, dof = {}, p = {:.4}, Cramér's V = {:.4}{}",
        table.chi2_statistic,
        table.degrees_of_freedom,
        table.p_value,
        table.cramers_v,
        if table.yates_corrected { " (Yates)" } else { "" },
    );
}
