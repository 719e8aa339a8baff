//! Order-level roll-up of classified lines.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::{delay_between, ClassifiedLine, ClassifiedOrder, DelayCategory};

#[derive(Debug, Clone, Default)]
pub struct OrderRollup {
    pub orders: Vec<ClassifiedOrder>,
    /// Orders whose lines disagree on the expected delivery date.
    pub inconsistent_orders: Vec<String>,
    /// Orders whose lines name more than one supplier.
    pub multi_supplier_orders: Vec<String>,
}

struct OrderAcc<'a> {
    first: &'a ClassifiedLine,
    line_count: usize,
    order_date: Option<NaiveDate>,
    responsible_party: Option<&'a str>,
    status: Option<&'a str>,
    expected_dates: Vec<NaiveDate>,
    max_actual_date: Option<NaiveDate>,
    fully_delivered: bool,
    single_supplier: bool,
}

impl<'a> OrderAcc<'a> {
    fn new(first: &'a ClassifiedLine) -> Self {
        Self {
            first,
            line_count: 0,
            order_date: None,
            responsible_party: None,
            status: None,
            expected_dates: Vec::new(),
            max_actual_date: None,
            fully_delivered: true,
            single_supplier: true,
        }
    }

    fn push(&mut self, line: &'a ClassifiedLine) {
        self.line_count += 1;
        self.order_date = min_date(self.order_date, line.order_date);
        if self.responsible_party.is_none() {
            self.responsible_party = line.responsible_party.as_deref();
        }
        if self.status.is_none() {
            self.status = line.status.as_deref();
        }
        if let Some(e) = line.expected_delivery_date {
            if !self.expected_dates.contains(&e) {
                self.expected_dates.push(e);
            }
        }
        self.max_actual_date = self.max_actual_date.max(line.delivery.last_received_date);
        self.fully_delivered &= line.fully_delivered;
        if line.supplier_name != self.first.supplier_name {
            self.single_supplier = false;
        }
    }

    fn finish(self) -> ClassifiedOrder {
        let max_expected_date = self.expected_dates.iter().max().copied();
        let order_delay_days = delay_between(self.max_actual_date, max_expected_date);
        ClassifiedOrder {
            order_id: self.first.order_id.clone(),
            line_count: self.line_count,
            order_date: self.order_date,
            supplier_name: self.first.supplier_name.clone(),
            responsible_party: self.responsible_party.map(String::from),
            status: self.status.map(String::from),
            max_expected_date,
            max_actual_date: self.max_actual_date,
            fully_delivered: self.fully_delivered,
            order_delay_days,
            order_delay_category: order_delay_days.map(DelayCategory::from_delay_days),
            expected_dates_consistent: self.expected_dates.len() <= 1,
            single_supplier: self.single_supplier,
        }
    }
}

fn min_date(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, y) => x.or(y),
    }
}

/// Group lines by order id, preserving first-encountered order.
///
/// Lines with an empty order id belong to no order and are skipped; the
/// classifier counts them.
pub fn rollup_orders(lines: &[ClassifiedLine]) -> OrderRollup {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut accs: Vec<OrderAcc<'_>> = Vec::new();

    for line in lines.iter().filter(|l| !l.order_id.is_empty()) {
        let pos = *positions.entry(line.order_id.as_str()).or_insert_with(|| {
            accs.push(OrderAcc::new(line));
            accs.len() - 1
        });
        accs[pos].push(line);
    }

    let mut rollup = OrderRollup {
        orders: Vec::with_capacity(accs.len()),
        ..Default::default()
    };
    for acc in accs {
        let order = acc.finish();
        if !order.expected_dates_consistent {
            rollup.inconsistent_orders.push(order.order_id.clone());
        }
        if !order.single_supplier {
            rollup.multi_supplier_orders.push(order.order_id.clone());
        }
        rollup.orders.push(order);
    }

    if !rollup.inconsistent_orders.is_empty() {
        log::warn!(
            "{} order(s) have inconsistent expected delivery dates; using the latest",
            rollup.inconsistent_orders.len()
        );
    }
    if !rollup.multi_supplier_orders.is_empty() {
        log::warn!(
            "{} order(s) span more than one supplier; keeping the first",
            rollup.multi_supplier_orders.len()
        );
    }
    rollup
}
