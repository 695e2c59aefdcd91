use statdesk_core::filter::FilterState;
use statdesk_core::pivot::{build_pivot, period_cmp, PivotOptions, RowOrder};
use statdesk_core::record::{CellValue, MetricRecord};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn rec(description: &str, period_type: &str, period: &str, value: f64) -> MetricRecord {
    MetricRecord {
        description: description.into(),
        premium_type: "Life".into(),
        category: "Premiums".into(),
        period_type: period_type.into(),
        period: period.into(),
        unit: "INR Cr".into(),
        value: CellValue::Number(value),
        entity_key: String::new(),
        row_id: 0,
        is_active: true,
    }
}

fn no_filters() -> FilterState {
    FilterState::default()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// The worked example from the dashboard: duplicate (description, period)
/// pairs resolve last-write-wins, and periods sort ascending.
#[test]
fn duplicate_rows_resolve_last_write_wins() {
    let records = vec![
        rec("FYP", "Monthly", "2024", 10.0),
        rec("FYP", "Monthly", "2024", 12.0),
        rec("FYP", "Monthly", "2025", 20.0),
    ];

    let build = build_pivot(&records, &no_filters(), PivotOptions::default());
    let group = build.group("Monthly").expect("Monthly group must exist");

    assert_eq!(group.periods, vec!["2024", "2025"]);
    assert_eq!(group.cells["FYP"]["2024"], CellValue::Number(12.0));
    assert_eq!(group.cells["FYP"]["2025"], CellValue::Number(20.0));
}

/// Every record passing the filter must appear in its group's
/// descriptions and periods.
#[test]
fn pivot_is_complete_over_filtered_records() {
    let records = vec![
        rec("FYP", "Monthly", "2024", 1.0),
        rec("Renewal Premium", "Monthly", "2025", 2.0),
        rec("FYP", "Annual", "2023", 3.0),
        rec("Claims Settled", "Quarterly", "2024-Q1", 4.0),
    ];

    let build = build_pivot(&records, &no_filters(), PivotOptions::default());

    for r in &records {
        let group = build
            .group(&r.period_type)
            .unwrap_or_else(|| panic!("missing group for {}", r.period_type));
        assert!(
            group.descriptions.contains(&r.description),
            "{} missing from {} descriptions",
            r.description,
            r.period_type
        );
        assert!(
            group.periods.contains(&r.period),
            "{} missing from {} periods",
            r.period,
            r.period_type
        );
        assert!(
            group.cells[&r.description].contains_key(&r.period),
            "cell ({}, {}) missing",
            r.description,
            r.period
        );
    }
}

/// Identical inputs must give structurally identical output — no hidden
/// randomness in ordering.
#[test]
fn build_is_deterministic() {
    let records = vec![
        rec("Renewal Premium", "Monthly", "2025", 2.0),
        rec("FYP", "Monthly", "2024", 1.0),
        rec("Claims Settled", "Monthly", "2024", 4.0),
        rec("FYP", "Annual", "2023", 3.0),
    ];

    let a = build_pivot(&records, &no_filters(), PivotOptions::default());
    let b = build_pivot(&records, &no_filters(), PivotOptions::default());
    assert_eq!(a, b, "two builds over identical input diverged");
}

/// Unit and classification stick to the FIRST record for a description,
/// even when later rows disagree — intentionally asymmetric with cell
/// values, which take the LAST.
#[test]
fn unit_and_meta_are_first_write_wins() {
    let mut first = rec("FYP", "Monthly", "2024", 1.0);
    first.unit = "INR Cr".into();
    let mut second = rec("FYP", "Monthly", "2025", 2.0);
    second.unit = "USD Mn".into();
    second.category = "Other".into();

    let build = build_pivot(&[first, second], &no_filters(), PivotOptions::default());
    let group = build.group("Monthly").unwrap();

    assert_eq!(group.units["FYP"], "INR Cr");
    assert_eq!(group.meta["FYP"].category, "Premiums");
}

/// Periods that all parse as integers sort numerically; anything else
/// falls back to lexical order.
#[test]
fn period_sort_is_numeric_aware() {
    let records = vec![
        rec("FYP", "Annual", "100", 1.0),
        rec("FYP", "Annual", "9", 2.0),
        rec("FYP", "Annual", "10", 3.0),
    ];
    let build = build_pivot(&records, &no_filters(), PivotOptions::default());
    assert_eq!(build.group("Annual").unwrap().periods, vec!["9", "10", "100"]);

    // Mixed labels stay lexical.
    assert_eq!(period_cmp("2024-Q1", "2024-Q2"), std::cmp::Ordering::Less);
    assert_eq!(period_cmp("9", "10"), std::cmp::Ordering::Less);
    assert_eq!(period_cmp("Q9", "Q10"), std::cmp::Ordering::Greater);
}

/// Both row orderings are supported: first-seen (default) and
/// alphabetical.
#[test]
fn row_order_option_is_honored() {
    let records = vec![
        rec("Renewal Premium", "Monthly", "2024", 1.0),
        rec("Claims Settled", "Monthly", "2024", 2.0),
        rec("FYP", "Monthly", "2024", 3.0),
    ];

    let first_seen = build_pivot(&records, &no_filters(), PivotOptions::default());
    assert_eq!(
        first_seen.group("Monthly").unwrap().descriptions,
        vec!["Renewal Premium", "Claims Settled", "FYP"]
    );

    let alpha = build_pivot(
        &records,
        &no_filters(),
        PivotOptions {
            row_order: RowOrder::Alphabetical,
            ..PivotOptions::default()
        },
    );
    assert_eq!(
        alpha.group("Monthly").unwrap().descriptions,
        vec!["Claims Settled", "FYP", "Renewal Premium"]
    );
}

/// Soft-deleted rows are invisible to the default build and visible to
/// the privileged audit build.
#[test]
fn inactive_rows_respect_the_audit_option() {
    let mut dead = rec("FYP", "Monthly", "2024", 1.0);
    dead.is_active = false;
    let records = vec![dead, rec("Renewal Premium", "Monthly", "2024", 2.0)];

    let default_view = build_pivot(&records, &no_filters(), PivotOptions::default());
    assert!(!default_view
        .group("Monthly")
        .unwrap()
        .descriptions
        .contains(&"FYP".to_string()));

    let audit_view = build_pivot(
        &records,
        &no_filters(),
        PivotOptions {
            include_inactive: true,
            ..PivotOptions::default()
        },
    );
    assert!(audit_view
        .group("Monthly")
        .unwrap()
        .descriptions
        .contains(&"FYP".to_string()));
}

/// Malformed rows (missing grouping keys) are skipped and counted; the
/// rest of the build proceeds.
#[test]
fn malformed_rows_are_skipped_and_counted() {
    let no_desc = rec("", "Monthly", "2024", 1.0);
    let no_period = rec("FYP", "Monthly", "", 2.0);
    let no_period_type = rec("FYP", "", "2024", 3.0);
    let good = rec("Renewal Premium", "Monthly", "2024", 4.0);

    let build = build_pivot(
        &[no_desc, no_period, no_period_type, good],
        &no_filters(),
        PivotOptions::default(),
    );

    assert_eq!(build.skipped, 3, "three malformed rows must be counted");
    let group = build.group("Monthly").expect("good row still builds");
    assert_eq!(group.descriptions, vec!["Renewal Premium"]);
}

/// A period type whose rows were all malformed or filtered away is
/// dropped, never emitted as an empty group.
#[test]
fn empty_groups_are_never_emitted() {
    let bad = rec("FYP", "Quarterly", "", 1.0);
    let records = vec![bad, rec("FYP", "Monthly", "2024", 2.0)];

    let build = build_pivot(&records, &no_filters(), PivotOptions::default());
    assert!(build.group("Quarterly").is_none());
    assert!(build.group("Monthly").is_some());
}

/// An empty filter dimension is a wildcard; a set one narrows exactly.
#[test]
fn filter_dimensions_act_as_wildcards_when_empty() {
    let mut life = rec("FYP", "Monthly", "2024", 1.0);
    life.premium_type = "Life".into();
    let mut nonlife = rec("Gross Claims", "Monthly", "2024", 2.0);
    nonlife.premium_type = "Non-Life".into();
    nonlife.category = "Claims".into();
    let records = vec![life, nonlife];

    let all = build_pivot(&records, &no_filters(), PivotOptions::default());
    assert_eq!(all.group("Monthly").unwrap().descriptions.len(), 2);

    let narrowed = build_pivot(
        &records,
        &FilterState {
            premium_type: "Life".into(),
            category: String::new(),
            description: String::new(),
        },
        PivotOptions::default(),
    );
    assert_eq!(
        narrowed.group("Monthly").unwrap().descriptions,
        vec!["FYP"]
    );
}

/// A "-" on the wire is a present cell holding the missing sentinel —
/// distinct from an absent (description, period) pair, and never zero.
#[test]
fn missing_values_are_sentinels_not_zero() {
    let mut dashed = rec("FYP", "Monthly", "2024", 0.0);
    dashed.value = CellValue::Missing;
    let records = vec![dashed, rec("FYP", "Monthly", "2025", 5.0)];

    let build = build_pivot(&records, &no_filters(), PivotOptions::default());
    let group = build.group("Monthly").unwrap();

    assert_eq!(group.cells["FYP"]["2024"], CellValue::Missing);
    assert!(group.cells["FYP"]["2024"].as_f64().is_none());
    // 2026 was never reported: no cell at all.
    assert!(!group.cells["FYP"].contains_key("2026"));
}
