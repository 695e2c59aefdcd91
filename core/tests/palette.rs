use statdesk_core::palette::{ColorAssigner, NEUTRAL, PALETTE};
use statdesk_core::record::{CellValue, MetricRecord};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn rec(category: &str, premium: &str) -> MetricRecord {
    MetricRecord {
        description: format!("{category} metric"),
        premium_type: premium.into(),
        category: category.into(),
        period_type: "Annual".into(),
        period: "2024".into(),
        unit: "INR Cr".into(),
        value: CellValue::Number(1.0),
        entity_key: String::new(),
        row_id: 0,
        is_active: true,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Within one snapshot the same pair always resolves to the same color,
/// however many times it is looked up.
#[test]
fn same_pair_same_color_within_snapshot() {
    let records = vec![
        rec("Premiums", "Life"),
        rec("Claims", "Life"),
        rec("Premiums", "Life"),
    ];
    let assigner = ColorAssigner::from_records(&records);

    let first = assigner.color_for("Premiums", "Life");
    for _ in 0..5 {
        assert_eq!(assigner.color_for("Premiums", "Life"), first);
    }
    assert_eq!(assigner.len(), 2, "duplicate pairs must not consume palette slots");
}

/// Assignment is round-robin in first-seen order: pair i gets palette
/// entry i mod N.
#[test]
fn assignment_is_round_robin_in_first_seen_order() {
    let categories = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];
    let records: Vec<_> = categories.iter().map(|c| rec(c, "Life")).collect();
    let assigner = ColorAssigner::from_records(&records);

    for (i, category) in categories.iter().enumerate() {
        assert_eq!(
            assigner.color_for(category, "Life"),
            PALETTE[i % PALETTE.len()],
            "pair #{i} ({category}) got the wrong palette slot"
        );
    }
    // The ninth pair wrapped around to the first color.
    assert_eq!(
        assigner.color_for("I", "Life"),
        assigner.color_for("A", "Life")
    );
}

/// The pair key is (category, premium_type) — the same category under a
/// different premium type is a distinct pair.
#[test]
fn premium_type_distinguishes_pairs() {
    let records = vec![rec("Premiums", "Life"), rec("Premiums", "Non-Life")];
    let assigner = ColorAssigner::from_records(&records);

    assert_ne!(
        assigner.color_for("Premiums", "Life"),
        assigner.color_for("Premiums", "Non-Life")
    );
}

/// A pair the snapshot never produced gets the neutral default.
#[test]
fn unknown_pairs_get_the_neutral_default() {
    let assigner = ColorAssigner::from_records(&[rec("Premiums", "Life")]);

    assert_eq!(assigner.color_for("Claims", "Life"), NEUTRAL);
    assert_eq!(ColorAssigner::default().color_for("Premiums", "Life"), NEUTRAL);
}

/// Rebuilding from the same snapshot reproduces the same assignment —
/// determinism is over input composition and order, nothing hidden.
#[test]
fn rebuild_from_same_snapshot_is_identical() {
    let records = vec![
        rec("Premiums", "Life"),
        rec("Claims", "Non-Life"),
        rec("Expenses", "Life"),
    ];
    let a = ColorAssigner::from_records(&records);
    let b = ColorAssigner::from_records(&records);

    for r in &records {
        assert_eq!(
            a.color_for(&r.category, &r.premium_type),
            b.color_for(&r.category, &r.premium_type)
        );
    }
}
