use statdesk_core::filter::FilterCascade;
use statdesk_core::record::{CellValue, MetricRecord, RecordStore};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn rec(premium: &str, category: &str, description: &str) -> MetricRecord {
    MetricRecord {
        description: description.into(),
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

fn store() -> RecordStore {
    let mut store = RecordStore::empty();
    store.replace(vec![
        rec("Life", "Premiums", "FYP"),
        rec("Life", "Premiums", "Renewal Premium"),
        rec("Life", "Claims", "Claims Settled"),
        rec("Non-Life", "Premiums", "Gross Direct Premium"),
    ]);
    store
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// For any sequence of setter calls, no dimension is ever set while an
/// upstream dimension is empty.
#[test]
fn cascade_invariant_holds_for_any_setter_sequence() {
    let store = store();
    let mut cascade = FilterCascade::new();

    // Deliberately out-of-order and partly illegal sequence.
    let moves: [(&str, &str); 8] = [
        ("description", "FYP"),
        ("category", "Premiums"),
        ("premium_type", "Life"),
        ("category", "Premiums"),
        ("description", "FYP"),
        ("premium_type", "Non-Life"),
        ("category", "Claims"),
        ("premium_type", ""),
    ];

    for (dimension, value) in moves {
        match dimension {
            "premium_type" => {
                cascade.set_premium_type(&store, value);
            }
            "category" => {
                cascade.set_category(&store, value);
            }
            _ => {
                cascade.set_description(&store, value);
            }
        }
        assert!(
            cascade.state().is_consistent(),
            "invariant broken after ({dimension}, {value:?}): {:?}",
            cascade.state()
        );
    }
}

/// Changing an upstream dimension clears everything below it in the same
/// call — never observable in a half-cleared state.
#[test]
fn changing_premium_type_clears_downstream() {
    let store = store();
    let mut cascade = FilterCascade::new();

    assert!(cascade.set_premium_type(&store, "Life"));
    assert!(cascade.set_category(&store, "Premiums"));
    assert!(cascade.set_description(&store, "FYP"));

    assert!(cascade.set_premium_type(&store, "Non-Life"));
    assert_eq!(cascade.state().premium_type, "Non-Life");
    assert_eq!(cascade.state().category, "");
    assert_eq!(cascade.state().description, "");
}

#[test]
fn changing_category_clears_description_only() {
    let store = store();
    let mut cascade = FilterCascade::new();

    cascade.set_premium_type(&store, "Life");
    cascade.set_category(&store, "Premiums");
    cascade.set_description(&store, "FYP");

    assert!(cascade.set_category(&store, "Claims"));
    assert_eq!(cascade.state().premium_type, "Life");
    assert_eq!(cascade.state().category, "Claims");
    assert_eq!(cascade.state().description, "");
}

/// Illegal values are rejected silently: the setter reports false and the
/// state is untouched — mirrors defensive dropdown behavior.
#[test]
fn illegal_values_are_silent_no_ops() {
    let store = store();
    let mut cascade = FilterCascade::new();

    assert!(!cascade.set_premium_type(&store, "Health"));
    assert_eq!(cascade.state().premium_type, "");

    // Category can't be set while premium type is empty — its option
    // list is empty, so everything non-'' is illegal.
    assert!(!cascade.set_category(&store, "Premiums"));
    assert_eq!(cascade.state().category, "");

    cascade.set_premium_type(&store, "Life");
    // "Premiums" exists, but only under the selected premium type's
    // records; a category of the other branch is rejected.
    assert!(!cascade.set_category(&store, "Liability"));
    assert_eq!(cascade.state().category, "");
}

/// Empty string deselects and is always legal.
#[test]
fn empty_string_is_always_accepted() {
    let store = store();
    let mut cascade = FilterCascade::new();

    cascade.set_premium_type(&store, "Life");
    cascade.set_category(&store, "Premiums");
    assert!(cascade.set_category(&store, ""));
    assert!(cascade.set_premium_type(&store, ""));
    assert_eq!(cascade.state().premium_type, "");
}

/// Option lists derive from the store and respect the hierarchy: nothing
/// downstream is offered until upstream is chosen.
#[test]
fn option_lists_follow_the_hierarchy() {
    let store = store();
    let mut cascade = FilterCascade::new();

    assert_eq!(cascade.premium_type_options(&store), vec!["Life", "Non-Life"]);
    assert!(cascade.category_options(&store).is_empty());
    assert!(cascade.description_options(&store).is_empty());

    cascade.set_premium_type(&store, "Life");
    assert_eq!(cascade.category_options(&store), vec!["Premiums", "Claims"]);
    assert!(cascade.description_options(&store).is_empty());

    cascade.set_category(&store, "Premiums");
    assert_eq!(
        cascade.description_options(&store),
        vec!["FYP", "Renewal Premium"]
    );
}

/// Inactive rows contribute no options.
#[test]
fn inactive_rows_offer_no_options() {
    let mut dead = rec("Marine", "Hull", "Hull Premium");
    dead.is_active = false;
    let mut store = RecordStore::empty();
    store.replace(vec![dead, rec("Life", "Premiums", "FYP")]);

    let cascade = FilterCascade::new();
    assert_eq!(cascade.premium_type_options(&store), vec!["Life"]);
}

/// After a snapshot replace, selections that no longer resolve cascade to
/// '' exactly as a setter change would.
#[test]
fn revalidate_cascades_after_snapshot_change() {
    let mut store = store();
    let mut cascade = FilterCascade::new();

    cascade.set_premium_type(&store, "Life");
    cascade.set_category(&store, "Premiums");
    cascade.set_description(&store, "FYP");

    // New snapshot without any Life records at all.
    store.replace(vec![rec("Non-Life", "Premiums", "Gross Direct Premium")]);

    assert!(cascade.revalidate(&store), "revalidation must report a change");
    assert_eq!(cascade.state().premium_type, "");
    assert_eq!(cascade.state().category, "");
    assert_eq!(cascade.state().description, "");
    assert!(cascade.state().is_consistent());

    // Running it again is a no-op.
    assert!(!cascade.revalidate(&store));
}

/// Revalidation clears only as deep as the damage goes.
#[test]
fn revalidate_preserves_still_valid_upstream() {
    let mut store = store();
    let mut cascade = FilterCascade::new();

    cascade.set_premium_type(&store, "Life");
    cascade.set_category(&store, "Premiums");
    cascade.set_description(&store, "Renewal Premium");

    // Renewal Premium disappears; Life/Premiums survive via FYP.
    store.replace(vec![rec("Life", "Premiums", "FYP")]);

    assert!(cascade.revalidate(&store));
    assert_eq!(cascade.state().premium_type, "Life");
    assert_eq!(cascade.state().category, "Premiums");
    assert_eq!(cascade.state().description, "");
}
