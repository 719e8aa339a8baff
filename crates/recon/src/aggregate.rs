use std::collections::HashMap;

use crate::model::{DeliveryEvent, DeliveryFact};

/// Per-line delivery facts, built in one pass over all receipt events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryIndex {
    facts: HashMap<String, DeliveryFact>,
    /// Events that carried no source line id and were left out.
    pub events_missing_line_id: usize,
    /// Events whose received quantity could not be parsed (summed as zero).
    pub invalid_quantities: usize,
}

impl DeliveryIndex {
    /// Facts for `line_id`; a line with no events gets the empty fact.
    pub fn lookup(&self, line_id: &str) -> DeliveryFact {
        self.facts.get(line_id).cloned().unwrap_or_default()
    }

    pub fn get(&self, line_id: &str) -> Option<&DeliveryFact> {
        self.facts.get(line_id)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeliveryFact)> {
        self.facts.iter()
    }
}

/// Group events by source line id: count, summed quantity, latest date.
pub fn aggregate_deliveries(events: &[DeliveryEvent]) -> DeliveryIndex {
    let mut index = DeliveryIndex::default();

    for event in events {
        let Some(line_id) = event.source_line_id.as_deref().filter(|id| !id.is_empty()) else {
            index.events_missing_line_id += 1;
            continue;
        };
        if event.quantity_received.is_invalid() {
            index.invalid_quantities += 1;
        }

        let fact = index.facts.entry(line_id.to_string()).or_default();
        fact.delivery_count += 1;
        fact.total_received += event.quantity_received.value_or_zero();
        if event.received_date > fact.last_received_date {
            fact.last_received_date = event.received_date;
        }
    }

    log::debug!(
        "aggregated {} events into {} delivery facts ({} without line id)",
        events.len(),
        index.facts.len(),
        index.events_missing_line_id
    );
    index
}
