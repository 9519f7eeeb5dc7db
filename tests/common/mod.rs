#![allow(dead_code)]

use chrono::NaiveDate;
use consumo_pdf::Customization;
use consumo_pdf::model::{Alert, Item, Movement, RawDate, Severity, Summary, Totals, Universe};

pub fn movement(id: &str, monto: f64) -> Movement {
    Movement {
        id: id.to_string(),
        monto,
        observaciones: None,
    }
}

/// Item whose remisiones/facturas totals are given directly.
pub fn item(id: &str, total: f64, rem: f64, fac: f64) -> Item {
    Item {
        total_rem: Some(rem),
        total_fac: Some(fac),
        ..Item::new(id, total)
    }
}

pub fn dated(mut item: Item, fecha: &str) -> Item {
    item.fecha = Some(RawDate::Text(fecha.to_string()));
    item
}

pub fn with_movements(mut item: Item, remisiones: &[(&str, f64)], facturas: &[(&str, f64)]) -> Item {
    item.remisiones = remisiones.iter().map(|(id, m)| movement(id, *m)).collect();
    item.facturas = facturas.iter().map(|(id, m)| movement(id, *m)).collect();
    item
}

pub fn with_alert(mut item: Item, severity: Severity, message: &str) -> Item {
    item.alerts.push(Alert {
        severity,
        message: message.to_string(),
    });
    item
}

pub fn universe_summary(items: Vec<Item>) -> Summary {
    Summary {
        items,
        totals: None,
        universe: Some(Universe {
            is_universe: true,
            label: "Proveedor: ACME".to_string(),
            description: "Órdenes emitidas en 2024".to_string(),
            title: "Consumo de órdenes 2024".to_string(),
        }),
        selected_ids: Vec::new(),
        company_name: "Constructora del Norte".to_string(),
    }
}

pub fn selection_summary(items: Vec<Item>, selected: &[&str]) -> Summary {
    Summary {
        items,
        totals: None,
        universe: None,
        selected_ids: selected.iter().map(|s| s.to_string()).collect(),
        company_name: "Constructora del Norte".to_string(),
    }
}

pub fn with_totals(mut summary: Summary, total: f64, rem: f64, fac: f64) -> Summary {
    summary.totals = Some(Totals::new(total, rem, fac));
    summary
}

/// Customization with a fixed generation date so output is reproducible.
pub fn customization() -> Customization {
    Customization {
        generated_at: NaiveDate::from_ymd_opt(2024, 5, 1),
        ..Default::default()
    }
}

/// A selection with `n` base orders, each carrying movements on both sides.
pub fn large_selection(n: usize) -> Summary {
    let items = (0..n)
        .flat_map(|i| {
            let base = format!("{}", 1000 + i);
            let ext = format!("{base}-1");
            [
                with_movements(
                    item(&base, 10_000.0, 2_500.0, 1_500.0),
                    &[(&format!("R-{i}-a"), 1_500.0), (&format!("R-{i}-b"), 1_000.0)],
                    &[(&format!("F-{i}-a"), 1_500.0)],
                ),
                with_movements(item(&ext, 2_000.0, 500.0, 0.0), &[(&format!("R-{i}-c"), 500.0)], &[]),
            ]
        })
        .collect();
    selection_summary(items, &[])
}

pub fn pdf_page_count(pdf: &[u8]) -> usize {
    let doc = lopdf::Document::load_mem(pdf).expect("generated PDF parses");
    doc.get_pages().len()
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Strings shown on each page, in drawing order. Bytes are read as Latin-1,
/// which matches WinAnsi for the accented letters the reports use.
pub fn page_texts(pdf: &[u8]) -> Vec<Vec<String>> {
    let doc = lopdf::Document::load_mem(pdf).expect("generated PDF parses");
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let content = doc
                .get_and_decode_page_content(page_id)
                .expect("page content decodes");
            content
                .operations
                .iter()
                .filter(|op| op.operator == "Tj")
                .flat_map(|op| op.operands.iter())
                .filter_map(|operand| match operand {
                    lopdf::Object::String(bytes, _) => Some(bytes.iter().map(|&b| b as char).collect()),
                    _ => None,
                })
                .collect()
        })
        .collect()
}
