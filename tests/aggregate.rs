mod common;

use chrono::NaiveDate;
use common::{approx, dated, item, movement, selection_summary, with_movements, with_totals};
use consumo_pdf::aggregate::{
    MovementKind, build_group_hierarchy, collect_movements, compute_percentages,
    compute_segment_scale, derive_base_id, grand_totals, normalize_item_totals, parse_fecha,
};
use consumo_pdf::model::{Item, Percentages, RawDate, Totals};
use consumo_pdf::pdf::bar::segment_widths;

#[test]
fn over_consumed_item_matches_worked_example() {
    let it = item("100-2", 1000.0, 300.0, 800.0);
    let n = normalize_item_totals(&it);

    assert_eq!(n.totals.total_consumo, 1100.0);
    assert_eq!(n.totals.restante, 0.0);
    assert_eq!(n.percentages.rem, 30.0);
    assert_eq!(n.percentages.fac, 80.0);
    assert_eq!(n.percentages.rest, 0.0);
    assert_eq!(n.percentages.consumo, 100.0);

    let scale = compute_segment_scale(&n.percentages);
    assert_eq!(scale, 110.0);

    let [rem_w, fac_w, rest_w] = segment_widths(&n.percentages, 220.0);
    assert!((rem_w - 60.0).abs() < 1e-3, "rem width {rem_w}");
    assert!((fac_w - 160.0).abs() < 1e-3, "fac width {fac_w}");
    assert_eq!(rest_w, 0.0);
}

#[test]
fn group_hierarchy_orders_base_then_extensions() {
    let summary = selection_summary(
        vec![
            item("500-2", 300.0, 0.0, 0.0),
            item("500", 1000.0, 0.0, 0.0),
            item("500-1", 200.0, 0.0, 0.0),
        ],
        &[],
    );
    let groups = build_group_hierarchy(&summary);

    assert_eq!(groups.len(), 1);
    let g = &groups[0];
    assert_eq!(g.base_id, "500");
    assert_eq!(g.extension_ids, vec!["500-1", "500-2"]);
    let order: Vec<&str> = g.items.iter().map(|m| m.item.id.as_str()).collect();
    assert_eq!(order, vec!["500", "500-1", "500-2"]);
    assert!(g.items[0].is_base);
    assert!(!g.items[1].is_base && !g.items[2].is_base);
}

#[test]
fn group_totals_are_sums_of_raw_member_amounts() {
    let summary = selection_summary(
        vec![
            item("700", 100.1, 50.0, 80.0),
            item("700-1", 0.2, 10.0, 0.0),
            item("700-3", 33.33, 0.0, 1.11),
            item("800", 1e6, 1.0, 2.0),
            item("800-10", 0.07, 0.0, 0.0),
            item("900-x", 10.0, 0.0, 0.0),
        ],
        &[],
    );
    for g in build_group_hierarchy(&summary) {
        let sum_total: f64 = g.items.iter().map(|m| m.totals.total).sum();
        let sum_rem: f64 = g.items.iter().map(|m| m.totals.total_rem).sum();
        let sum_fac: f64 = g.items.iter().map(|m| m.totals.total_fac).sum();
        assert!(approx(g.totals.total, sum_total), "group {}", g.base_id);
        assert!(approx(g.totals.total_rem, sum_rem), "group {}", g.base_id);
        assert!(approx(g.totals.total_fac, sum_fac), "group {}", g.base_id);
    }
}

#[test]
fn groups_sorted_by_base_id() {
    let summary = selection_summary(
        vec![
            item("B-7", 1.0, 0.0, 0.0),
            item("A-1", 1.0, 0.0, 0.0),
            item("C", 1.0, 0.0, 0.0),
            item("A", 1.0, 0.0, 0.0),
        ],
        &[],
    );
    let bases: Vec<String> = build_group_hierarchy(&summary)
        .into_iter()
        .map(|g| g.base_id)
        .collect();
    assert_eq!(bases, vec!["A", "B", "C"]);
}

#[test]
fn missing_base_member_falls_back_to_earliest_date() {
    let summary = selection_summary(
        vec![
            dated(item("42-3", 1.0, 0.0, 0.0), "2024-03-01"),
            item("42-1", 1.0, 0.0, 0.0),
            dated(item("42-2", 1.0, 0.0, 0.0), "15/01/2024"),
        ],
        &[],
    );
    let groups = build_group_hierarchy(&summary);
    let order: Vec<&str> = groups[0].items.iter().map(|m| m.item.id.as_str()).collect();
    assert_eq!(order, vec!["42-2", "42-1", "42-3"]);
    assert!(groups[0].items.iter().all(|m| !m.is_base));
}

#[test]
fn explicit_base_id_wins_over_suffix() {
    let mut ext = item("PO-extra", 10.0, 0.0, 0.0);
    ext.base_id = Some("PO".to_string());
    let summary = selection_summary(vec![ext, item("PO", 10.0, 0.0, 0.0)], &[]);
    let groups = build_group_hierarchy(&summary);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].base_id, "PO");
    assert_eq!(groups[0].extension_ids, vec!["PO-extra"]);
    assert_eq!(groups[0].items[0].item.id, "PO");
}

#[test]
fn base_id_derivation() {
    assert_eq!(derive_base_id("500-2"), "500");
    assert_eq!(derive_base_id("500-12"), "500");
    assert_eq!(derive_base_id("OC-2024-7"), "OC-2024");
    assert_eq!(derive_base_id("500"), "500");
    assert_eq!(derive_base_id("500-a"), "500-a");
    assert_eq!(derive_base_id("500-"), "500-");
    assert_eq!(derive_base_id("-5"), "-5");
}

#[test]
fn percentages_clamped_for_any_totals() {
    let cases = [
        (0.0, 0.0, 0.0),
        (100.0, 0.0, 0.0),
        (100.0, 100.0, 100.0),
        (1.0, 50_000.0, 0.0),
        (-20.0, 5.0, 5.0),
        (100.0, -30.0, 10.0),
        (f64::NAN, 1.0, 1.0),
        (1e12, 1e-3, 0.0),
    ];
    for (total, rem, fac) in cases {
        let p = compute_percentages(&Totals::new(total, rem, fac));
        assert!((0.0..=100.0).contains(&p.rest), "rest {} for {total}/{rem}/{fac}", p.rest);
        assert!(p.rem >= 0.0 && p.fac >= 0.0, "{p:?}");
        assert!(compute_segment_scale(&p) >= 100.0);
    }
}

#[test]
fn zero_authorized_reports_overage_instead_of_percentages() {
    let p = compute_percentages(&Totals::new(0.0, 40.0, 60.0));
    assert_eq!(p.rem, 0.0);
    assert_eq!(p.fac, 0.0);
    assert_eq!(p.rest, 0.0);
    assert_eq!(p.overage, Some(100.0));
}

#[test]
fn segment_widths_never_exceed_bar() {
    let samples = [
        Percentages { rem: 0.0, fac: 0.0, rest: 100.0, consumo: 0.0, overage: None },
        Percentages { rem: 999.99, fac: 999.99, rest: 0.0, consumo: 1999.98, overage: None },
        Percentages { rem: 33.33, fac: 33.33, rest: 33.34, consumo: 66.66, overage: None },
        Percentages { rem: 50.0, fac: 60.0, rest: 0.0, consumo: 110.0, overage: None },
    ];
    for p in samples {
        let w: f32 = segment_widths(&p, 400.0).iter().sum();
        assert!(w <= 400.0 + 1e-3, "{w} for {p:?}");
    }
}

#[test]
fn normalization_is_idempotent() {
    let items = [
        item("1", 1000.0, 300.0, 800.0),
        item("2", 500.0, 100.0, 50.0),
        item("3", 0.0, 10.0, 0.0),
        item("4", -5.0, -1.0, 3.0),
        Item { subtotal: 250.0, ..Item::new("5", 0.0) },
    ];
    for it in &items {
        let first = normalize_item_totals(it);
        let second = normalize_item_totals(&first.totals);
        assert_eq!(first.totals, second.totals, "item {}", it.id);
    }
}

#[test]
fn item_amounts_fall_back_to_subtotal_and_movement_sums() {
    let it = with_movements(
        Item { subtotal: 900.0, ..Item::new("10", 0.0) },
        &[("R1", 100.0), ("R2", 50.0)],
        &[("F1", 200.0)],
    );
    let n = normalize_item_totals(&it);
    assert_eq!(n.totals.total, 900.0);
    assert_eq!(n.totals.total_rem, 150.0);
    assert_eq!(n.totals.total_fac, 200.0);
    assert_eq!(n.totals.restante, 550.0);
}

#[test]
fn movements_sorted_descending_and_stable() {
    let items = vec![
        with_movements(item("1", 100.0, 0.0, 0.0), &[("a", 10.0), ("b", 30.0)], &[]),
        with_movements(item("2", 100.0, 0.0, 0.0), &[("c", 10.0), ("d", 5.0)], &[]),
    ];
    let grand = Totals::new(200.0, 55.0, 0.0);
    let list = collect_movements(&items, &grand, MovementKind::Remisiones);

    let ids: Vec<&str> = list.movements.iter().map(|e| e.movement.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a", "c", "d"]);
    assert_eq!(list.movements[0].item_id, "1");
    assert_eq!(list.movements[2].item_id, "2");
    assert_eq!(list.subtotal, 55.0);
    assert_eq!(list.percentage_of_grand_total, 27.5);
    // share of the grand total, not of the owning item
    assert_eq!(list.movements[0].percentage, 15.0);
}

#[test]
fn movement_percentages_zero_without_grand_total() {
    let items = vec![with_movements(item("1", 0.0, 0.0, 0.0), &[], &[("f", 12.0)])];
    let list = collect_movements(&items, &Totals::default(), MovementKind::Facturas);
    assert_eq!(list.movements.len(), 1);
    assert_eq!(list.movements[0].percentage, 0.0);
    assert_eq!(list.percentage_of_grand_total, 0.0);
    assert_eq!(list.subtotal, 12.0);
}

#[test]
fn grand_totals_prefer_supplied_but_rederive() {
    let items = vec![item("1", 100.0, 20.0, 0.0), item("2", 50.0, 0.0, 10.0)];
    let summed = grand_totals(&selection_summary(items.clone(), &[]));
    assert_eq!(summed, Totals::new(150.0, 20.0, 10.0));

    let supplied = with_totals(selection_summary(items, &[]), 1000.0, 400.0, 700.0);
    let t = grand_totals(&supplied);
    assert_eq!(t.total, 1000.0);
    assert_eq!(t.total_consumo, 1100.0);
    assert_eq!(t.restante, 0.0);
}

#[test]
fn fecha_encodings() {
    let d = NaiveDate::from_ymd_opt(2024, 3, 9);
    for raw in [
        "2024-03-09",
        "09/03/2024",
        "2024/03/09",
        "2024-03-09T10:15:00",
        "2024-03-09T10:15:00.000Z",
        "2024-03-09 08:00:00",
    ] {
        assert_eq!(parse_fecha(&RawDate::Text(raw.to_string())), d, "{raw}");
    }
    // 2024-03-09T12:00:00Z
    assert_eq!(parse_fecha(&RawDate::Millis(1_709_985_600_000)), d);
    assert_eq!(parse_fecha(&RawDate::Text("1709985600000".to_string())), d);
    assert_eq!(parse_fecha(&RawDate::Text("mañana".to_string())), None);
    assert_eq!(parse_fecha(&RawDate::Text("  ".to_string())), None);
}

#[test]
fn fully_consumed_groups_flagged() {
    let summary = selection_summary(
        vec![
            item("1", 100.0, 60.0, 40.0),
            item("2", 100.0, 10.0, 0.0),
            item("3", 0.0, 0.0, 0.0),
        ],
        &[],
    );
    let flags: Vec<bool> = build_group_hierarchy(&summary)
        .iter()
        .map(|g| g.is_fully_consumed())
        .collect();
    assert_eq!(flags, vec![true, false, false]);
}

#[test]
fn movement_helper_keeps_amount() {
    assert_eq!(movement("x", 12.5).monto, 12.5);
}
