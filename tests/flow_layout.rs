use std::cell::Cell as StdCell;
use std::rc::Rc;

use consumo_pdf::Fonts;
use consumo_pdf::model::Severity;
use consumo_pdf::pdf::flow::{Align, Canvas, FlowContext, PageGeometry, TextStyle};
use consumo_pdf::pdf::observations::{ObservationBox, render_observations};
use consumo_pdf::pdf::table::{Cell, Column, Row, Table, render_table};

fn flow() -> FlowContext {
    FlowContext::new(PageGeometry::letter(), Fonts::builtin())
}

fn table(rows: usize) -> Table {
    Table {
        columns: vec![
            Column::new("ID", 120.0, Align::Left),
            Column::new("Monto", 120.0, Align::Right),
        ],
        rows: (0..rows)
            .map(|i| Row::new(vec![format!("OC-{i}").into(), "$1,000.00".into()]))
            .collect(),
        font_size: 9.0,
        header_fill: [0x1E, 0x3A, 0x8A],
    }
}

/// Geometry whose content area fits the header plus exactly `rows` rows.
fn geometry_for(header_h: f32, row_h: f32, rows: usize) -> PageGeometry {
    let mut g = PageGeometry::letter();
    let content = header_h + rows as f32 * row_h + row_h / 2.0;
    g.margin_bottom = g.height - g.margin_top - content;
    g
}

#[test]
fn ensure_space_breaks_only_when_needed() {
    let mut flow = flow();
    let capacity = flow.page_capacity();
    assert!(!flow.ensure_space(capacity));
    flow.canvas().advance(capacity - 10.0);
    assert!(!flow.ensure_space(10.0));
    assert!(flow.ensure_space(10.5));
    assert_eq!(flow.page_count(), 2);
    assert!(flow.at_page_top());
}

#[test]
fn oversized_block_at_page_top_does_not_loop() {
    let mut flow = flow();
    let too_tall = flow.page_capacity() * 3.0;
    assert!(!flow.ensure_space(too_tall));
    assert_eq!(flow.page_count(), 1);
}

#[test]
fn page_hooks_run_in_order_on_every_page() {
    let mut flow = flow();
    let calls = Rc::new(StdCell::new(0usize));
    let log = Rc::new(std::cell::RefCell::new(Vec::new()));

    let (c, l) = (calls.clone(), log.clone());
    flow.on_new_page(Box::new(move |canvas: &mut Canvas| {
        c.set(c.get() + 1);
        l.borrow_mut().push(("first", canvas.page_index()));
        canvas.advance(20.0);
    }));
    let l = log.clone();
    flow.on_new_page(Box::new(move |canvas: &mut Canvas| {
        l.borrow_mut().push(("second", canvas.page_index()));
    }));

    // hook space is reserved on the current page and on fresh pages alike
    let top = flow.geometry().content_top();
    assert_eq!(flow.cursor(), top - 20.0);
    assert!(flow.at_page_top());

    flow.new_page();
    flow.new_page();
    assert_eq!(calls.get(), 3);
    assert_eq!(flow.cursor(), top - 20.0);
    assert_eq!(
        *log.borrow(),
        vec![("first", 0), ("second", 0), ("first", 1), ("second", 1), ("first", 2), ("second", 2)]
    );
}

#[test]
fn gap_is_suppressed_at_page_top() {
    let mut flow = flow();
    let top = flow.cursor();
    flow.gap(12.0);
    assert_eq!(flow.cursor(), top);
    flow.canvas().advance(5.0);
    flow.gap(12.0);
    assert_eq!(flow.cursor(), top - 17.0);
}

#[test]
fn measure_text_wraps() {
    let flow = flow();
    let style = TextStyle::regular(10.0);
    let one = flow.measure_text("corto", 200.0, style);
    let many = flow.measure_text(&"palabra ".repeat(40), 100.0, style);
    assert!(one > 0.0);
    assert!(many >= one * 5.0);
    assert_eq!(flow.measure_text("", 100.0, style), one);
}

#[test]
fn table_pages_match_rows_per_page() {
    let probe = flow();
    let t = table(1);
    let header_h = t.header_height(&probe);
    let row_h = t.row_height(&probe, &t.rows[0]);

    for (n, per_page) in [(10usize, 4usize), (12, 4), (1, 4), (25, 7)] {
        let mut flow = FlowContext::new(geometry_for(header_h, row_h, per_page), Fonts::builtin());
        let stats = render_table(&mut flow, &table(n), 40.0);
        let expected = n.div_ceil(per_page);
        assert_eq!(flow.page_count(), expected, "{n} rows / {per_page}");
        assert_eq!(stats.header_draws, expected, "{n} rows / {per_page}");
        assert_eq!(stats.pages_started, expected - 1, "{n} rows / {per_page}");
    }
}

#[test]
fn table_moves_header_with_first_row() {
    let mut flow = flow();
    let t = table(3);
    let header_h = t.header_height(&flow);
    let row_h = t.row_height(&flow, &t.rows[0]);
    // leave room for the header alone
    let skip = flow.remaining() - header_h - row_h / 2.0;
    flow.canvas().advance(skip);

    let stats = render_table(&mut flow, &t, 40.0);
    assert_eq!(stats.pages_started, 1);
    assert_eq!(stats.header_draws, 1);
    assert_eq!(flow.page_count(), 2);
}

#[test]
fn wrapped_cells_grow_the_row() {
    let flow = flow();
    let t = table(0);
    let short = Row::new(vec!["A".into(), "B".into()]);
    let long = Row::new(vec![
        "texto largo que no cabe en una sola línea de la columna".into(),
        "B".into(),
    ]);
    assert!(t.row_height(&flow, &long) > t.row_height(&flow, &short));
}

#[test]
fn alert_cells_keep_text() {
    let cell = Cell::Alert {
        text: "Excede autorizado".to_string(),
        severity: Severity::Critical,
    };
    assert_eq!(cell.text(), "Excede autorizado");

    let mut flow = flow();
    let mut t = table(0);
    t.rows.push(Row::new(vec!["1".into(), cell]));
    t.rows.push(Row::new(vec![
        "2".into(),
        Cell::Alert {
            text: "?".to_string(),
            severity: Severity::Unknown,
        },
    ]));
    let stats = render_table(&mut flow, &t, 40.0);
    assert_eq!(stats.header_draws, 1);
}

#[test]
fn empty_table_draws_header_only() {
    let mut flow = flow();
    let before = flow.cursor();
    let t = table(0);
    let stats = render_table(&mut flow, &t, 40.0);
    assert_eq!(stats.header_draws, 1);
    assert!((before - flow.cursor() - t.header_height(&flow)).abs() < 1e-3);
}

#[test]
fn observation_box_omitted_or_placeholder() {
    let mut flow = flow();
    let width = flow.geometry().content_width();
    let none: Vec<String> = vec!["  ".to_string()];

    let hidden = ObservationBox {
        title: "Observaciones",
        notes: &none,
        always_show: false,
        min_height: 40.0,
    };
    assert!(hidden.height(&flow, width).is_none());
    let before = flow.cursor();
    assert!(!render_observations(&mut flow, &hidden, 40.0, width));
    assert_eq!(flow.cursor(), before);

    let placeholder = ObservationBox {
        always_show: true,
        ..hidden
    };
    let h = placeholder.height(&flow, width).expect("shown");
    assert!(h >= 40.0);
    assert!(render_observations(&mut flow, &placeholder, 40.0, width));
    assert!((before - flow.cursor() - h).abs() < 1e-3);
}

#[test]
fn observation_box_grows_with_notes() {
    let flow = flow();
    let width = 300.0;
    let notes: Vec<String> = (0..12).map(|i| format!("Nota número {i} sobre el consumo")).collect();
    let b = ObservationBox {
        title: "Observaciones",
        notes: &notes,
        always_show: false,
        min_height: 20.0,
    };
    let h = b.height(&flow, width).expect("shown");
    assert!(h > 12.0 * flow.measure_text("x", width, TextStyle::regular(9.0)));
}

#[test]
fn stamp_reaches_every_page() {
    let mut flow = flow();
    flow.new_page();
    flow.new_page();
    let seen = std::cell::RefCell::new(Vec::new());
    flow.stamp_pages(|canvas, page, total| {
        seen.borrow_mut().push((canvas.page_index(), page, total));
    });
    assert_eq!(*seen.borrow(), vec![(0, 1, 3), (1, 2, 3), (2, 3, 3)]);
}
