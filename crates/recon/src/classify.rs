use crate::aggregate::DeliveryIndex;
use crate::model::{delay_between, ClassifiedLine, DelayCategory, OrderLine};
use crate::resolve::expected_delivery_dates;

/// Classified lines plus the per-row issues found while classifying.
#[derive(Debug, Clone, Default)]
pub struct LineClassification {
    pub lines: Vec<ClassifiedLine>,
    pub missing_expected_date: usize,
    pub expected_before_order: usize,
    pub invalid_quantities: usize,
    /// Lines with an empty line id; they can never match a delivery.
    pub missing_line_id: usize,
    /// Lines with an empty order id; left out of the order roll-up.
    pub missing_order_id: usize,
}

/// Join each line with its delivery facts and derive delivery flags.
pub fn classify_lines(lines: &[OrderLine], deliveries: &DeliveryIndex) -> LineClassification {
    let expected = expected_delivery_dates(lines);
    let mut out = LineClassification {
        lines: Vec::with_capacity(lines.len()),
        ..Default::default()
    };

    for (line, expected_date) in lines.iter().zip(expected) {
        if line.line_id.is_empty() {
            out.missing_line_id += 1;
        }
        if line.order_id.is_empty() {
            out.missing_order_id += 1;
        }
        if line.quantity_ordered.is_invalid() {
            log::debug!(
                "line '{}': unparsable ordered quantity {:?}, treating as zero",
                line.line_id,
                line.quantity_ordered
            );
            out.invalid_quantities += 1;
        }
        match (expected_date, line.order_date) {
            (None, _) => out.missing_expected_date += 1,
            (Some(e), Some(o)) if e < o => out.expected_before_order += 1,
            _ => {}
        }

        let delivery = deliveries.lookup(&line.line_id);
        let quantity_ordered = line.quantity_ordered.value_or_zero();
        let fully_delivered = delivery.total_received >= quantity_ordered;
        let delivery_delay_days = delay_between(delivery.last_received_date, expected_date);

        out.lines.push(ClassifiedLine {
            line_id: line.line_id.clone(),
            order_id: line.order_id.clone(),
            order_date: line.order_date,
            expected_delivery_date: expected_date,
            quantity_ordered,
            supplier_name: line.supplier_name.clone(),
            responsible_party: line.responsible_party.clone(),
            status: line.status.clone(),
            delivery,
            fully_delivered,
            delivery_delay_days,
            delay_category: delivery_delay_days.map(DelayCategory::from_delay_days),
        });
    }

    if out.invalid_quantities > 0 {
        log::warn!(
            "{} order line(s) had an unparsable quantity; treated as zero",
            out.invalid_quantities
        );
    }
    out
}
