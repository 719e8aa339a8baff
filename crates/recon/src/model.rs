use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::association::AssociationReport;
use crate::filter::{FilterSummary, Selection};
use crate::metrics::{MissingDateBreakdown, PeriodCount, TimelinessRow};
use crate::quality::DataQualityReport;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A numeric cell as it arrived from the export.
///
/// Unparsable values are kept (not coerced on load) so the classifier can
/// count them; every consumer reads them as zero.
#[derive(Debug, Clone, PartialEq)]
pub enum Quantity {
    Value(f64),
    Missing,
    Invalid(String),
}

impl Quantity {
    pub fn value_or_zero(&self) -> f64 {
        match self {
            Self::Value(v) => *v,
            Self::Missing | Self::Invalid(_) => 0.0,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

impl From<f64> for Quantity {
    fn from(v: f64) -> Self {
        Self::Value(v)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::Missing | Self::Invalid(_) => serializer.serialize_none(),
        }
    }
}

/// One purchase-order line.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub line_id: String,
    pub order_id: String,
    pub order_date: Option<NaiveDate>,
    /// Originally promised delivery date.
    pub promised_date: Option<NaiveDate>,
    /// Operator-adjusted delivery date; wins over `promised_date`.
    pub override_date: Option<NaiveDate>,
    pub quantity_ordered: Quantity,
    pub supplier_name: String,
    pub responsible_party: Option<String>,
    pub status: Option<String>,
}

/// One receipt transaction against an order line.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryEvent {
    pub source_line_id: Option<String>,
    pub received_date: Option<NaiveDate>,
    pub quantity_received: Quantity,
    pub status: Option<String>,
    pub item_code: Option<String>,
    pub item_name: Option<String>,
}

/// Pre-loaded base tables. Never mutated by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    pub lines: Vec<OrderLine>,
    pub events: Vec<DeliveryEvent>,
    /// Cells that failed date coercion while loading.
    pub unparsable_dates: usize,
}

// ---------------------------------------------------------------------------
// Delivery facts
// ---------------------------------------------------------------------------

/// Everything received against one line. The default is "nothing yet".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryFact {
    pub delivery_count: usize,
    pub total_received: f64,
    pub last_received_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayCategory {
    Early,
    OnTime,
    Late,
}

impl DelayCategory {
    /// Strict three-way partition on the sign of the delay.
    pub fn from_delay_days(days: i64) -> Self {
        match days.cmp(&0) {
            std::cmp::Ordering::Less => Self::Early,
            std::cmp::Ordering::Equal => Self::OnTime,
            std::cmp::Ordering::Greater => Self::Late,
        }
    }
}

impl std::fmt::Display for DelayCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Early => write!(f, "early"),
            Self::OnTime => write!(f, "on_time"),
            Self::Late => write!(f, "late"),
        }
    }
}

/// Delay between two optional dates, defined only when both are present.
pub fn delay_between(actual: Option<NaiveDate>, expected: Option<NaiveDate>) -> Option<i64> {
    match (actual, expected) {
        (Some(a), Some(e)) => Some((a - e).num_days()),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedLine {
    pub line_id: String,
    pub order_id: String,
    pub order_date: Option<NaiveDate>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub quantity_ordered: f64,
    pub supplier_name: String,
    pub responsible_party: Option<String>,
    pub status: Option<String>,
    #[serde(flatten)]
    pub delivery: DeliveryFact,
    pub fully_delivered: bool,
    pub delivery_delay_days: Option<i64>,
    pub delay_category: Option<DelayCategory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedOrder {
    pub order_id: String,
    pub line_count: usize,
    /// Earliest order date across the lines.
    pub order_date: Option<NaiveDate>,
    /// First encountered supplier.
    pub supplier_name: String,
    /// First non-missing responsible party.
    pub responsible_party: Option<String>,
    /// First non-missing status.
    pub status: Option<String>,
    pub max_expected_date: Option<NaiveDate>,
    pub max_actual_date: Option<NaiveDate>,
    pub fully_delivered: bool,
    pub order_delay_days: Option<i64>,
    pub order_delay_category: Option<DelayCategory>,
    pub expected_dates_consistent: bool,
    pub single_supplier: bool,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub missing_dates: MissingDateBreakdown,
    pub by_supplier: Vec<TimelinessRow>,
    pub by_responsible_party: Vec<TimelinessRow>,
    pub by_month: Vec<TimelinessRow>,
    pub orders_per_month: Vec<PeriodCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub selection: Selection,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub meta: PipelineMeta,
    pub filters: FilterSummary,
    pub quality: DataQualityReport,
    pub metrics: Metrics,
    pub association: AssociationReport,
    pub lines: Vec<ClassifiedLine>,
    pub orders: Vec<ClassifiedOrder>,
}
