use std::path::PathBuf;

use chrono::NaiveDate;
use otd_recon::config::PipelineConfig;
use otd_recon::engine::run;
use otd_recon::load::load_input;
use otd_recon::model::{DelayCategory, PipelineResult};
use otd_recon::{InsufficientData, ReconError, Selection};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_toml(name: &str) -> String {
    std::fs::read_to_string(fixtures_dir().join(name)).unwrap()
}

fn load_and_run(config_toml: &str, selection: &Selection) -> PipelineResult {
    let config = PipelineConfig::from_toml(config_toml).unwrap();
    let input = load_input(&config, &fixtures_dir()).unwrap();
    run(&config, &input, selection).unwrap()
}

fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, day)
}

// -------------------------------------------------------------------------
// CSV exports
// -------------------------------------------------------------------------

#[test]
fn csv_lines_classified() {
    let result = load_and_run(&fixture_toml("inkoop.otd.toml"), &Selection::all());
    assert_eq!(result.lines.len(), 10);
    assert_eq!(result.filters.kept_lines, 10);

    let line = |id: &str| result.lines.iter().find(|l| l.line_id == id).unwrap();

    // two partial receipts add up to the ordered quantity
    let l01 = line("L01");
    assert_eq!(l01.delivery.delivery_count, 2);
    assert_eq!(l01.delivery.total_received, 10.0);
    assert!(l01.fully_delivered);
    assert_eq!(l01.delivery_delay_days, Some(1));
    assert_eq!(l01.delay_category, Some(DelayCategory::Late));

    // override date wins over the promised date
    let l02 = line("L02");
    assert_eq!(l02.expected_delivery_date, d(2024, 1, 15));
    assert_eq!(l02.delay_category, Some(DelayCategory::OnTime));

    let l03 = line("L03");
    assert!(!l03.fully_delivered);
    assert_eq!(l03.delivery_delay_days, Some(5));

    assert_eq!(line("L04").delay_category, Some(DelayCategory::Early));

    // no expected date: delivered, but no delay
    let l05 = line("L05");
    assert!(l05.fully_delivered);
    assert_eq!(l05.delivery_delay_days, None);

    let l07 = line("L07");
    assert_eq!(l07.delivery.delivery_count, 0);
    assert_eq!(l07.delivery.last_received_date, None);
    assert!(!l07.fully_delivered);

    // unparsable quantity is read as zero, so any receipt completes it
    let l08 = line("L08");
    assert_eq!(l08.quantity_ordered, 0.0);
    assert!(l08.fully_delivered);

    // received, but the receipt date is unusable
    let l10 = line("L10");
    assert_eq!(l10.delivery.delivery_count, 1);
    assert!(l10.fully_delivered);
    assert_eq!(l10.delay_category, None);
}

#[test]
fn csv_orders_rolled_up() {
    let result = load_and_run(&fixture_toml("inkoop.otd.toml"), &Selection::all());
    assert_eq!(result.orders.len(), 9);
    assert_eq!(result.orders[0].order_id, "PO-100");

    let po100 = &result.orders[0];
    assert_eq!(po100.line_count, 2);
    assert!(!po100.expected_dates_consistent);
    assert_eq!(po100.max_expected_date, d(2024, 1, 15));
    assert_eq!(po100.max_actual_date, d(2024, 1, 15));
    assert_eq!(po100.order_delay_days, Some(0));
    assert_eq!(po100.order_delay_category, Some(DelayCategory::OnTime));
    assert!(po100.fully_delivered);

    // single-line orders mirror their line
    for order in result.orders.iter().filter(|o| o.line_count == 1) {
        let line = result.lines.iter().find(|l| l.order_id == order.order_id).unwrap();
        assert_eq!(order.order_delay_category, line.delay_category);
        assert_eq!(order.fully_delivered, line.fully_delivered);
        assert!(order.expected_dates_consistent);
    }
}

#[test]
fn csv_data_quality() {
    let result = load_and_run(&fixture_toml("inkoop.otd.toml"), &Selection::all());
    let q = &result.quality;
    assert_eq!(q.classified_lines, 10);
    assert_eq!(q.delivery_events, 11);
    assert_eq!(q.missing_expected_date, 1);
    assert!((q.missing_expected_date_pct - 10.0).abs() < 1e-9);
    assert_eq!(q.expected_before_order, 1);
    assert_eq!(q.invalid_line_quantities, 1);
    assert_eq!(q.invalid_event_quantities, 0);
    assert_eq!(q.unparsable_dates, 1);
    assert_eq!(q.events_missing_line_id, 1);
    assert_eq!(q.orphan_events, 1);
    assert_eq!(q.inconsistent_orders, vec!["PO-100".to_string()]);
    assert!(q.multi_supplier_orders.is_empty());
    assert!(!q.is_clean());
}

#[test]
fn csv_association_top_n_and_missing() {
    let result = load_and_run(&fixture_toml("inkoop.otd.toml"), &Selection::all());
    let table = result.association.result().unwrap();

    assert_eq!(table.row_labels, vec!["jan", "piet"]);
    assert_eq!(table.column_labels, vec!["late", "on_time", "early"]);
    assert_eq!(table.observed, vec![vec![1, 2, 0], vec![2, 0, 1]]);
    // klaas falls outside the top 2
    assert_eq!(table.other_count, 2);
    // L10 has no responsible party, L09 no delay category
    assert_eq!(table.missing_count, 2);
    assert_eq!(table.n, 6);
    assert_eq!(table.degrees_of_freedom, 2);
    assert!((table.chi2_statistic - 10.0 / 3.0).abs() < 1e-9);
    assert!((table.p_value - (-5.0f64 / 3.0).exp()).abs() < 1e-6);
    assert!((table.cramers_v - (5.0f64 / 9.0).sqrt()).abs() < 1e-9);
}

#[test]
fn csv_metrics() {
    let result = load_and_run(&fixture_toml("inkoop.otd.toml"), &Selection::all());
    let acme = result.metrics.by_supplier.iter().find(|r| r.key == "Acme").unwrap();
    assert_eq!(acme.lines, 5);
    assert_eq!(acme.measured, 3);
    assert_eq!((acme.early, acme.on_time, acme.late), (0, 1, 2));
    assert_eq!(acme.mean_delay_days, Some(2.0));

    let months: Vec<&str> = result
        .metrics
        .orders_per_month
        .iter()
        .map(|p| p.period.as_str())
        .collect();
    assert_eq!(months, vec!["2021-05", "2024-01", "2024-02", "2024-03"]);
    assert_eq!(result.metrics.missing_dates.without_expected_date.lines, 1);
}

// -------------------------------------------------------------------------
// Filters and selection
// -------------------------------------------------------------------------

#[test]
fn configured_filters_drop_lines() {
    let toml = format!(
        "{}\n[filters]\nexclude_years = [2021]\nexclude_statuses = [\"C\"]\ndrop_expected_before_order = true\n",
        fixture_toml("inkoop.otd.toml")
    );
    let result = load_and_run(&toml, &Selection::all());

    assert_eq!(result.filters.input_lines, 10);
    assert_eq!(result.filters.kept_lines, 7);
    assert_eq!(result.filters.excluded_year, 1);
    assert_eq!(result.filters.excluded_status, 1);
    assert_eq!(result.filters.expected_before_order, 1);
    assert_eq!(result.quality.expected_before_order, 0);
    // dropped lines still own their receipts
    assert_eq!(result.quality.orphan_events, 1);
    assert!(result.lines.iter().all(|l| !["L06", "L07", "L09"].contains(&l.line_id.as_str())));
}

#[test]
fn selection_by_year_and_supplier() {
    let selection = Selection::all().with_years([2024]).with_suppliers(["Acme"]);
    let result = load_and_run(&fixture_toml("inkoop.otd.toml"), &selection);

    assert_eq!(result.filters.outside_selection, 6);
    let ids: Vec<&str> = result.lines.iter().map(|l| l.line_id.as_str()).collect();
    assert_eq!(ids, vec!["L01", "L02", "L03", "L10"]);
    assert_eq!(result.orders.len(), 3);
    assert_eq!(result.meta.selection, selection);
}

#[test]
fn empty_selection_is_insufficient_data() {
    let config = PipelineConfig::from_toml(&fixture_toml("inkoop.otd.toml")).unwrap();
    let input = load_input(&config, &fixtures_dir()).unwrap();
    let err = run(&config, &input, &Selection::all().with_suppliers(["Umbrella"])).unwrap_err();
    assert!(matches!(err, ReconError::InsufficientData(_)));
}

#[test]
fn order_granularity_association() {
    let toml = fixture_toml("inkoop.otd.toml").replace("granularity = \"line\"", "granularity = \"order\"");
    let result = load_and_run(&toml, &Selection::all());
    let table = result.association.result().unwrap();
    // one observation per order
    assert_eq!(table.n + table.other_count + table.missing_count, 9);
}

// -------------------------------------------------------------------------
// JSON exports
// -------------------------------------------------------------------------

#[test]
fn json_exports_with_ms_dates() {
    let result = load_and_run(&fixture_toml("json.otd.toml"), &Selection::all());
    assert_eq!(result.lines.len(), 3);

    let j1 = &result.lines[0];
    assert_eq!(j1.order_date, d(2024, 1, 5));
    assert_eq!(j1.delay_category, Some(DelayCategory::Early));

    // offset timestamps are normalised to UTC before taking the date
    let j2 = &result.lines[1];
    assert_eq!(j2.delivery.last_received_date, d(2024, 1, 16));
    assert_eq!(j2.quantity_ordered, 2.5);
    assert!(j2.fully_delivered);

    let j3 = &result.lines[2];
    assert_eq!(j3.expected_delivery_date, d(2024, 2, 9));
    assert_eq!(j3.delay_category, Some(DelayCategory::OnTime));
    assert_eq!(result.quality.unparsable_dates, 0);
}

#[test]
fn json_multi_supplier_order_reported() {
    let result = load_and_run(&fixture_toml("json.otd.toml"), &Selection::all());
    assert_eq!(result.quality.multi_supplier_orders, vec!["PO-9".to_string()]);

    let po9 = &result.orders[0];
    assert!(!po9.single_supplier);
    assert_eq!(po9.supplier_name, "Acme");
    assert_eq!(po9.order_delay_days, Some(1));
    assert_eq!(po9.order_delay_category, Some(DelayCategory::Late));

    // defaults: responsible party x status per order, only one party present
    assert_eq!(
        result.association.result().unwrap_err(),
        &InsufficientData::TooFewRows { found: 1 }
    );
}

// -------------------------------------------------------------------------
// Failure modes
// -------------------------------------------------------------------------

#[test]
fn missing_file_is_io_error() {
    let toml = fixture_toml("inkoop.otd.toml").replace("receipts.csv", "nope.csv");
    let config = PipelineConfig::from_toml(&toml).unwrap();
    let err = load_input(&config, &fixtures_dir()).unwrap_err();
    assert!(matches!(err, ReconError::Io(_)));
    assert!(err.to_string().contains("nope.csv"));
}

#[test]
fn misnamed_column_is_reported() {
    let toml = fixture_toml("inkoop.otd.toml").replace("\"QuUn\"", "\"Aantal\"");
    let config = PipelineConfig::from_toml(&toml).unwrap();
    let err = load_input(&config, &fixtures_dir()).unwrap_err();
    assert!(matches!(err, ReconError::MissingColumn { ref column, .. } if column == "Aantal"));
}

#[test]
fn config_in_temp_dir_resolves_relative_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(fixtures_dir().join("orders.csv"), dir.path().join("orders.csv")).unwrap();
    std::fs::copy(fixtures_dir().join("receipts.csv"), dir.path().join("receipts.csv")).unwrap();

    let config = PipelineConfig::from_toml(&fixture_toml("inkoop.otd.toml")).unwrap();
    let input = load_input(&config, dir.path()).unwrap();
    assert_eq!(input.lines.len(), 10);
    assert_eq!(input.events.len(), 11);
    assert_eq!(input.unparsable_dates, 1);
}

// -------------------------------------------------------------------------
// Row order and keys
// -------------------------------------------------------------------------

/// Run the JSON fixture config against sources written into a temp dir.
fn run_json_sources(orders: &str, receipts: &str) -> PipelineResult {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("orders.json"), orders).unwrap();
    std::fs::write(dir.path().join("receipts.json"), receipts).unwrap();
    let config = PipelineConfig::from_toml(&fixture_toml("json.otd.toml")).unwrap();
    let input = load_input(&config, dir.path()).unwrap();
    run(&config, &input, &Selection::all()).unwrap()
}

fn order_record(line: &str, order: &str, supplier: &str, qty: &str) -> String {
    format!(
        r#"{{"GuLiIOR": "{line}", "OrderNr": "{order}", "Datum": "2024-01-02", "DatumToegezegd": "2024-01-10", "AfwijkendeAfleverdatum": null, "QuUn": "{qty}", "Naam": "{supplier}", "Medewerker": "jan", "Status": "20"}}"#
    )
}

const ONE_RECEIPT: &str =
    r#"[{"BronregelGuid": "L0", "Datum": "2024-01-09", "AantalOntvangen": 1, "Status_regel": "OK"}]"#;

#[test]
fn json_object_export_keeps_file_order() {
    // keys "0".."10": "10" sorts before "2" as text
    let records: Vec<String> = (0..11)
        .map(|i| {
            let (order, supplier) = match i {
                2 => ("PO-1".to_string(), "Acme"),
                10 => ("PO-1".to_string(), "Globex"),
                _ => (format!("PO-{}", i + 10), "Acme"),
            };
            format!(r#""{i}": {}"#, order_record(&format!("L{i}"), &order, supplier, "1"))
        })
        .collect();
    let result = run_json_sources(&format!("{{{}}}", records.join(",\n")), ONE_RECEIPT);

    let ids: Vec<&str> = result.lines.iter().map(|l| l.line_id.as_str()).collect();
    let expected: Vec<String> = (0..11).map(|i| format!("L{i}")).collect();
    assert_eq!(ids, expected);

    let po1 = result.orders.iter().find(|o| o.order_id == "PO-1").unwrap();
    assert_eq!(po1.supplier_name, "Acme");
    assert_eq!(result.quality.multi_supplier_orders, vec!["PO-1".to_string()]);
    assert_eq!(result.orders[0].order_id, "PO-10");
}

#[test]
fn lines_without_keys_are_counted_not_merged() {
    let orders = format!(
        "[{}, {}, {}, {}]",
        order_record("L0", "PO-1", "Acme", "1"),
        order_record("L1", "", "Acme", "1"),
        order_record("L2", "", "Globex", "1"),
        order_record("", "PO-2", "Acme", "1"),
    );
    let result = run_json_sources(&orders, ONE_RECEIPT);

    assert_eq!(result.lines.len(), 4);
    assert_eq!(result.quality.missing_order_id, 2);
    assert_eq!(result.quality.missing_line_id, 1);
    // no fake order for the empty id
    let order_ids: Vec<&str> = result.orders.iter().map(|o| o.order_id.as_str()).collect();
    assert_eq!(order_ids, vec!["PO-1", "PO-2"]);
    assert!(result.quality.multi_supplier_orders.is_empty());
    assert!(result.quality.inconsistent_orders.is_empty());
    assert!(result.quality.issue_count() >= 3);
}

#[test]
fn negative_quantities_are_invalid() {
    let orders = format!("[{}]", order_record("L0", "PO-1", "Acme", "-5"));
    let receipts =
        r#"[{"BronregelGuid": "L0", "Datum": "2024-01-09", "AantalOntvangen": -2, "Status_regel": "OK"}]"#;
    let result = run_json_sources(&orders, receipts);

    assert_eq!(result.quality.invalid_line_quantities, 1);
    assert_eq!(result.quality.invalid_event_quantities, 1);
    assert_eq!(result.lines[0].quantity_ordered, 0.0);
    assert_eq!(result.lines[0].delivery.total_received, 0.0);
}

#[test]
fn load_time_counts_cover_the_whole_input() {
    // the only unparsable date sits on a receipt of L10, outside this selection
    let selection = Selection::all().with_suppliers(["Globex"]);
    let result = load_and_run(&fixture_toml("inkoop.otd.toml"), &selection);
    assert_eq!(result.quality.classified_lines, 3);
    assert_eq!(result.quality.missing_expected_date, 1);
    assert_eq!(result.quality.unparsable_dates, 1);
    assert_eq!(result.quality.delivery_events, 11);
}
