//! Field resolution: one logical column from several overlapping sources.

use chrono::NaiveDate;

use crate::error::ReconError;
use crate::model::OrderLine;

/// Coalesce candidate columns in priority order.
///
/// Row `i` of the output is the first `Some` among `candidates[..][i]`, or
/// `None` when every candidate is missing for that row. Row order and count
/// are preserved; all candidates must have the same length.
pub fn resolve_first<T: Clone>(candidates: &[&[Option<T>]]) -> Result<Vec<Option<T>>, ReconError> {
    let Some(first) = candidates.first() else {
        return Ok(Vec::new());
    };
    let len = first.len();
    for (index, column) in candidates.iter().enumerate() {
        if column.len() != len {
            return Err(ReconError::ColumnLengthMismatch {
                index,
                expected: len,
                actual: column.len(),
            });
        }
    }

    Ok((0..len)
        .map(|row| candidates.iter().find_map(|column| column[row].clone()))
        .collect())
}

/// Expected delivery date per line: override first, then promised.
pub fn expected_delivery_dates(lines: &[OrderLine]) -> Vec<Option<NaiveDate>> {
    let overrides: Vec<Option<NaiveDate>> = lines.iter().map(|l| l.override_date).collect();
    let promised: Vec<Option<NaiveDate>> = lines.iter().map(|l| l.promised_date).collect();
    // Both columns are built from the same slice, so lengths always agree.
    resolve_first(&[overrides.as_slice(), promised.as_slice()]).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Quantity;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn line(promised: Option<&str>, override_date: Option<&str>) -> OrderLine {
        OrderLine {
            line_id: "l1".into(),
            order_id: "o1".into(),
            order_date: Some(d("2023-12-01")),
            promised_date: promised.map(d),
            override_date: override_date.map(d),
            quantity_ordered: Quantity::Value(1.0),
            supplier_name: "Acme".into(),
            responsible_party: None,
            status: None,
        }
    }

    #[test]
    fn override_wins_then_promised_then_missing() {
        let lines = vec![
            line(Some("2024-01-01"), None),
            line(None, Some("2024-02-01")),
            line(Some("2024-01-01"), Some("2024-02-01")),
            line(None, None),
        ];
        let resolved = expected_delivery_dates(&lines);
        assert_eq!(
            resolved,
            vec![
                Some(d("2024-01-01")),
                Some(d("2024-02-01")),
                Some(d("2024-02-01")),
                None,
            ]
        );
    }

    #[test]
    fn fully_missing_candidate_still_resolves() {
        let a: Vec<Option<i32>> = vec![None, None, None];
        let b = vec![Some(1), None, Some(3)];
        assert_eq!(resolve_first(&[a.as_slice(), b.as_slice()]).unwrap(), vec![Some(1), None, Some(3)]);
    }

    #[test]
    fn length_mismatch_is_structural() {
        let a = vec![Some(1), None];
        let b = vec![Some(2)];
        let err = resolve_first(&[a.as_slice(), b.as_slice()]).unwrap_err();
        assert!(matches!(err, ReconError::ColumnLengthMismatch { index: 1, expected: 2, actual: 1 }));
    }

    #[test]
    fn no_candidates_is_empty() {
        let out: Vec<Option<u8>> = resolve_first(&[]).unwrap();
        assert!(out.is_empty());
    }
}
