use crate::aggregate::aggregate_deliveries;
use crate::association::analyze;
use crate::classify::classify_lines;
use crate::config::PipelineConfig;
use crate::error::ReconError;
use crate::filter::{apply_filters, Selection};
use crate::metrics::compute_metrics;
use crate::model::{PipelineInput, PipelineMeta, PipelineResult};
use crate::quality::{compute_quality, count_orphan_events};
use crate::rollup::rollup_orders;

/// Run the full pipeline over one selection of the base tables.
///
/// The input is only read; every run recomputes all derived tables.
pub fn run(
    config: &PipelineConfig,
    input: &PipelineInput,
    selection: &Selection,
) -> Result<PipelineResult, ReconError> {
    let (lines, filters) = apply_filters(&input.lines, &config.filters, selection);
    if lines.is_empty() {
        return Err(ReconError::InsufficientData(format!(
            "no order lines remain after filtering ({} in input)",
            input.lines.len()
        )));
    }

    // Events are aggregated over the full table; filtered lines just never look them up.
    let deliveries = aggregate_deliveries(&input.events);
    let orphan_events = count_orphan_events(&deliveries, &input.lines);

    let classification = classify_lines(&lines, &deliveries);
    let rollup = rollup_orders(&classification.lines);

    let quality = compute_quality(
        &classification,
        &deliveries,
        &rollup,
        input.events.len(),
        orphan_events,
        input.unparsable_dates,
    );
    let metrics = compute_metrics(&classification.lines, &rollup.orders);
    let association = analyze(&config.analysis, &classification.lines, &rollup.orders);

    log::info!(
        "{}: {} lines in {} orders classified ({} data-quality issues)",
        config.name,
        classification.lines.len(),
        rollup.orders.len(),
        quality.issue_count()
    );

    Ok(PipelineResult {
        meta: PipelineMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            selection: selection.clone(),
        },
        filters,
        quality,
        metrics,
        association,
        lines: classification.lines,
        orders: rollup.orders,
    })
}
