//! Contingency tables and the chi-square test of independence.

use std::collections::HashMap;

use chrono::Datelike;
use serde::Serialize;

use crate::config::{AnalysisConfig, Dimension, Granularity};
use crate::error::InsufficientData;
use crate::model::{ClassifiedLine, ClassifiedOrder};
use crate::stats::chi2_survival;

// ---------------------------------------------------------------------------
// Categorical views
// ---------------------------------------------------------------------------

/// A row that can be read along a categorical dimension.
pub trait Categorical {
    fn category(&self, dimension: Dimension) -> Option<String>;
}

impl Categorical for ClassifiedLine {
    fn category(&self, dimension: Dimension) -> Option<String> {
        match dimension {
            Dimension::Supplier => non_empty(&self.supplier_name),
            Dimension::ResponsibleParty => self.responsible_party.clone(),
            Dimension::Status => self.status.clone(),
            Dimension::DelayCategory => self.delay_category.map(|c| c.to_string()),
            Dimension::FullyDelivered => Some(self.fully_delivered.to_string()),
            Dimension::OrderYear => self.order_date.map(|d| d.year().to_string()),
            Dimension::OrderMonth => self.order_date.map(|d| d.format("%Y-%m").to_string()),
        }
    }
}

impl Categorical for ClassifiedOrder {
    fn category(&self, dimension: Dimension) -> Option<String> {
        match dimension {
            Dimension::Supplier => non_empty(&self.supplier_name),
            Dimension::ResponsibleParty => self.responsible_party.clone(),
            Dimension::Status => self.status.clone(),
            Dimension::DelayCategory => self.order_delay_category.map(|c| c.to_string()),
            Dimension::FullyDelivered => Some(self.fully_delivered.to_string()),
            Dimension::OrderYear => self.order_date.map(|d| d.year().to_string()),
            Dimension::OrderMonth => self.order_date.map(|d| d.format("%Y-%m").to_string()),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ContingencyResult {
    /// Kept row categories, most frequent first.
    pub row_labels: Vec<String>,
    /// Column categories in first-encountered order.
    pub column_labels: Vec<String>,
    pub observed: Vec<Vec<u64>>,
    pub expected_counts: Vec<Vec<f64>>,
    pub row_totals: Vec<u64>,
    pub column_totals: Vec<u64>,
    pub n: u64,
    /// Rows whose row category fell outside the top-N.
    pub other_count: u64,
    /// Rows missing either category.
    pub missing_count: u64,
    pub chi2_statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    pub cramers_v: f64,
    pub yates_corrected: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssociationOutcome {
    Tested(ContingencyResult),
    InsufficientData { detail: InsufficientData },
}

#[derive(Debug, Clone, Serialize)]
pub struct AssociationReport {
    pub rows: Dimension,
    pub columns: Dimension,
    pub granularity: Granularity,
    pub top_n: usize,
    #[serde(flatten)]
    pub outcome: AssociationOutcome,
}

impl AssociationReport {
    pub fn result(&self) -> Result<&ContingencyResult, &InsufficientData> {
        match &self.outcome {
            AssociationOutcome::Tested(r) => Ok(r),
            AssociationOutcome::InsufficientData { detail } => Err(detail),
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Build the top-N restricted contingency table and test it.
///
/// Only the row dimension is restricted. Ties in frequency keep
/// first-encountered order.
pub fn contingency<R, C, I>(
    pairs: I,
    top_n: usize,
    yates_correction: bool,
) -> Result<ContingencyResult, InsufficientData>
where
    R: AsRef<str>,
    C: AsRef<str>,
    I: IntoIterator<Item = (Option<R>, Option<C>)>,
{
    let pairs: Vec<(Option<R>, Option<C>)> = pairs.into_iter().collect();

    // Frequency of the row dimension, in first-encountered order.
    let mut row_seen: Vec<(&str, u64)> = Vec::new();
    let mut row_pos: HashMap<&str, usize> = HashMap::new();
    for (r, _) in &pairs {
        if let Some(r) = r {
            let r = r.as_ref();
            let pos = *row_pos.entry(r).or_insert_with(|| {
                row_seen.push((r, 0));
                row_seen.len() - 1
            });
            row_seen[pos].1 += 1;
        }
    }
    // Stable sort keeps first-encountered order among ties.
    row_seen.sort_by(|a, b| b.1.cmp(&a.1));
    row_seen.truncate(top_n);

    let row_labels: Vec<String> = row_seen.iter().map(|(r, _)| r.to_string()).collect();
    let kept_rows: HashMap<&str, usize> = row_seen.iter().enumerate().map(|(i, (r, _))| (*r, i)).collect();

    let mut column_labels: Vec<String> = Vec::new();
    let mut col_pos: HashMap<String, usize> = HashMap::new();
    let mut cells: Vec<(usize, usize)> = Vec::new();
    let mut other_count = 0u64;
    let mut missing_count = 0u64;

    for (r, c) in &pairs {
        let Some(r) = r else {
            missing_count += 1;
            continue;
        };
        let Some(&ri) = kept_rows.get(r.as_ref()) else {
            other_count += 1;
            continue;
        };
        let Some(c) = c else {
            missing_count += 1;
            continue;
        };
        let c = c.as_ref();
        let ci = match col_pos.get(c) {
            Some(&ci) => ci,
            None => {
                column_labels.push(c.to_string());
                col_pos.insert(c.to_string(), column_labels.len() - 1);
                column_labels.len() - 1
            }
        };
        cells.push((ri, ci));
    }

    if cells.is_empty() {
        return Err(InsufficientData::NoObservations);
    }
    if row_labels.len() < 2 {
        return Err(InsufficientData::TooFewRows { found: row_labels.len() });
    }
    if column_labels.len() < 2 {
        return Err(InsufficientData::TooFewColumns { found: column_labels.len() });
    }

    let mut observed = vec![vec![0u64; column_labels.len()]; row_labels.len()];
    for (ri, ci) in cells {
        observed[ri][ci] += 1;
    }
    let row_totals: Vec<u64> = observed.iter().map(|row| row.iter().sum()).collect();
    let column_totals: Vec<u64> = (0..column_labels.len())
        .map(|ci| observed.iter().map(|row| row[ci]).sum())
        .collect();
    let n: u64 = row_totals.iter().sum();

    if let Some(i) = row_totals.iter().position(|&t| t == 0) {
        return Err(InsufficientData::ZeroMarginal {
            axis: "row".into(),
            category: row_labels[i].clone(),
        });
    }
    if let Some(i) = column_totals.iter().position(|&t| t == 0) {
        return Err(InsufficientData::ZeroMarginal {
            axis: "column".into(),
            category: column_labels[i].clone(),
        });
    }

    let degrees_of_freedom = (row_labels.len() - 1) * (column_labels.len() - 1);
    let yates_corrected = yates_correction && degrees_of_freedom == 1;

    let nf = n as f64;
    let mut expected_counts = vec![vec![0.0; column_labels.len()]; row_labels.len()];
    let mut chi2_statistic = 0.0;
    for (ri, row) in observed.iter().enumerate() {
        for (ci, &o) in row.iter().enumerate() {
            let e = row_totals[ri] as f64 * column_totals[ci] as f64 / nf;
            expected_counts[ri][ci] = e;
            let mut diff = (o as f64 - e).abs();
            if yates_corrected {
                diff -= diff.min(0.5);
            }
            chi2_statistic += diff * diff / e;
        }
    }

    let k = (row_labels.len() - 1).min(column_labels.len() - 1) as f64;
    let cramers_v = ((chi2_statistic / nf) / k).sqrt();

    Ok(ContingencyResult {
        row_labels,
        column_labels,
        observed,
        expected_counts,
        row_totals,
        column_totals,
        n,
        other_count,
        missing_count,
        chi2_statistic,
        degrees_of_freedom,
        p_value: chi2_survival(chi2_statistic, degrees_of_freedom),
        cramers_v,
        yates_corrected,
    })
}

/// Contingency analysis of any categorical rows along two dimensions.
pub fn associate<T: Categorical>(
    rows: &[T],
    row_dimension: Dimension,
    column_dimension: Dimension,
    top_n: usize,
    yates_correction: bool,
) -> Result<ContingencyResult, InsufficientData> {
    contingency(
        rows.iter()
            .map(|r| (r.category(row_dimension), r.category(column_dimension))),
        top_n,
        yates_correction,
    )
}

/// Run the configured analysis at the configured granularity.
pub fn analyze(
    config: &AnalysisConfig,
    lines: &[ClassifiedLine],
    orders: &[ClassifiedOrder],
) -> AssociationReport {
    let result = match config.granularity {
        Granularity::Line => associate(lines, config.rows, config.columns, config.top_n, config.yates_correction),
        Granularity::Order => associate(orders, config.rows, config.columns, config.top_n, config.yates_correction),
    };
    let outcome = match result {
        Ok(r) => AssociationOutcome::Tested(r),
        Err(detail) => {
            log::warn!("association {} x {}: insufficient data ({detail})", config.rows, config.columns);
            AssociationOutcome::InsufficientData { detail }
        }
    };
    AssociationReport {
        rows: config.rows,
        columns: config.columns,
        granularity: config.granularity,
        top_n: config.top_n,
        outcome,
    }
}
