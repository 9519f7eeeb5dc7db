use consumo_pdf::Customization;
use consumo_pdf::aggregate::{build_group_hierarchy, grand_totals, normalize_item_totals};
use consumo_pdf::model::{Branding, Severity, Summary};
use serde_json::json;

#[test]
fn amounts_accept_numbers_strings_and_null() {
    let summary: Summary = serde_json::from_value(json!({
        "items": [
            { "id": "1", "total": "1,234.50", "totalRem": "$300", "totalFac": null },
            { "id": "2", "total": 99.5, "subtotal": "abc" },
            { "id": "3" }
        ],
        "selectedIds": ["1"],
        "companyName": "ACME"
    }))
    .expect("summary parses");

    let first = &summary.items[0];
    assert_eq!(first.total, 1234.5);
    assert_eq!(first.total_rem, Some(300.0));
    assert_eq!(first.total_fac, None);
    assert_eq!(summary.items[1].subtotal, 0.0);
    assert_eq!(summary.items[2].total, 0.0);
    assert!(!summary.is_universe());
    assert!(summary.totals.is_none());
}

#[test]
fn upstream_totals_are_rederived() {
    let summary: Summary = serde_json::from_value(json!({
        "items": [],
        "totals": {
            "total": 1000,
            "totalRem": 400,
            "totalFac": 700,
            "totalConsumo": 5,
            "restante": 995
        }
    }))
    .expect("summary parses");

    let t = summary.totals.expect("totals present");
    assert_eq!(t.total_consumo, 1100.0);
    assert_eq!(t.restante, 0.0);
    assert_eq!(grand_totals(&summary), t);
}

#[test]
fn movements_and_alerts() {
    let summary: Summary = serde_json::from_value(json!({
        "universe": { "isUniverse": true, "label": "Todo", "description": "", "title": "Universo" },
        "items": [{
            "id": "500-1",
            "fecha": 1709985600000i64,
            "total": 100,
            "remisiones": [{ "id": "R1", "monto": "40" }, { "monto": 10 }],
            "facturas": [{ "id": "F1", "monto": 25.25, "observaciones": "parcial" }],
            "alerts": [
                { "severity": "critical", "message": "Excede" },
                { "severity": "WARN", "message": "Revisar" },
                { "severity": "purple", "message": "?" },
                { "message": "sin nivel" }
            ]
        }]
    }))
    .expect("summary parses");

    assert!(summary.is_universe());
    let it = &summary.items[0];
    let severities: Vec<Severity> = it.alerts.iter().map(|a| a.severity).collect();
    assert_eq!(
        severities,
        vec![Severity::Critical, Severity::Warning, Severity::Unknown, Severity::Unknown]
    );
    assert_eq!(it.remisiones[1].id, "");

    // totals absent upstream: derived from the movements
    let n = normalize_item_totals(it);
    assert_eq!(n.totals.total_rem, 50.0);
    assert_eq!(n.totals.total_fac, 25.25);

    let groups = build_group_hierarchy(&summary);
    assert_eq!(groups[0].base_id, "500");
    assert!(!groups[0].items[0].is_base);
}

#[test]
fn customization_switches_default_on() {
    let c: Customization = serde_json::from_value(json!({ "includeMovements": false })).expect("parses");
    assert!(!c.include_movements);
    assert!(c.include_summary && c.include_detail && c.include_charts);
    assert!(c.include_observations && c.include_universe && c.always_show_observations);
    assert!(c.generated_at.is_none());

    let c: Customization =
        serde_json::from_value(json!({ "generatedAt": "2024-02-29", "observations": ["a", "b"] }))
            .expect("parses");
    assert_eq!(c.generated_at, chrono::NaiveDate::from_ymd_opt(2024, 2, 29));
    assert_eq!(c.observations.len(), 2);
}

#[test]
fn disable_by_switch_name() {
    let mut c = Customization::default();
    assert!(c.disable("Charts"));
    assert!(c.disable(" detail "));
    assert!(!c.disable("footer"));
    assert!(!c.include_charts);
    assert!(!c.include_detail);
    assert!(c.include_summary);
}

#[test]
fn branding_defaults_and_overrides() {
    let b: Branding = serde_json::from_value(json!({
        "companyName": "ACME",
        "colors": { "accent": [10, 20, 30] }
    }))
    .expect("parses");
    assert_eq!(b.company_name, "ACME");
    assert_eq!(b.colors.accent, [10, 20, 30]);
    assert_eq!(b.colors.remisiones, Branding::default().colors.remisiones);
    assert!(b.letterhead_top.is_none());
    assert!(b.font_regular.is_none());
}

#[test]
fn invalid_json_is_an_input_error() {
    let err = consumo_pdf::Engine::builtin()
        .compile_json(b"{ \"items\": [ { \"total\": 5 } ] }", &Branding::default(), &Customization::default())
        .expect_err("missing id is rejected");
    assert_eq!(err.kind(), consumo_pdf::ErrorKind::Input);
}
