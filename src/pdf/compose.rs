//! Section order for the two report variants. All arithmetic comes from
//! [`crate::aggregate`]; all placement goes through the flow context.

use chrono::NaiveDate;

use crate::aggregate::{
    Group, GroupMember, MovementKind, collect_movements, compute_percentages, item_date,
};
use crate::format::{date, money, percent};
use crate::model::{Branding, Customization, Percentages, Severity, Summary, Totals};

use super::bar::{ConsumptionBar, render_consumption_bar};
use super::flow::{Align, FlowContext, TextStyle};
use super::movements::{lead_height, render_movement_columns};
use super::observations::{ObservationBox, render_observations};
use super::table::{Cell, Column, Row, Table, render_table};

const SECTION_GAP: f32 = 14.0;
const GROUP_GAP: f32 = 10.0;
const HEADING_GAP: f32 = 4.0;
const CARD_H: f32 = 52.0;
const CARD_GAP: f32 = 8.0;
const FULLY_CONSUMED: [u8; 3] = [0xFE, 0xE2, 0xE2];
const SUBTOTAL_FILL: [u8; 3] = [0xF3, 0xF4, 0xF6];
const MUTED: [u8; 3] = [0x6B, 0x72, 0x80];
const CARD_FILL: [u8; 3] = [0xF9, 0xFA, 0xFB];
const CARD_BORDER: [u8; 3] = [0xE5, 0xE7, 0xEB];

/// Label, alignment and share of the content width for each column.
type ColumnSpec = (&'static str, Align, f32);

const ITEM_COLUMNS: [ColumnSpec; 9] = [
    ("ID", Align::Left, 0.13),
    ("Tipo", Align::Left, 0.08),
    ("Fecha", Align::Left, 0.10),
    ("Autorizado", Align::Right, 0.125),
    ("Remisiones", Align::Right, 0.125),
    ("Facturas", Align::Right, 0.125),
    ("Restante", Align::Right, 0.115),
    ("% Cons.", Align::Right, 0.075),
    ("Alertas", Align::Left, 0.125),
];

const MEMBER_COLUMNS: [ColumnSpec; 7] = [
    ("ID", Align::Left, 0.2),
    ("Tipo", Align::Left, 0.12),
    ("Fecha", Align::Left, 0.12),
    ("Autorizado", Align::Right, 0.14),
    ("Remisiones", Align::Right, 0.14),
    ("Facturas", Align::Right, 0.14),
    ("Restante", Align::Right, 0.14),
];

fn columns(specs: &[ColumnSpec], width: f32) -> Vec<Column> {
    specs
        .iter()
        .map(|&(label, align, share)| Column::new(label, width * share, align))
        .collect()
}

/// Sections in the order they were emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Header,
    AppliedFilter,
    SummaryCards,
    ConsumptionChart,
    TotalsTable,
    ItemTable,
    Observations,
    GroupDetail,
    Movements,
    Footer,
}

/// Aggregates shared by every section of one compilation.
pub(crate) struct ReportData<'a> {
    pub(crate) summary: &'a Summary,
    pub(crate) groups: Vec<Group<'a>>,
    pub(crate) grand: Totals,
    pub(crate) generated_at: NaiveDate,
}

struct Composer<'f, 'd, 'a> {
    flow: &'f mut FlowContext,
    data: &'d ReportData<'a>,
    branding: &'d Branding,
    customization: &'d Customization,
    sections: Vec<Section>,
}

pub(crate) fn report_title(summary: &Summary, customization: &Customization) -> String {
    if let Some(title) = customization.title.as_deref().map(str::trim)
        && !title.is_empty()
    {
        return title.to_string();
    }
    match &summary.universe {
        Some(u) if u.is_universe && !u.title.trim().is_empty() => u.title.trim().to_string(),
        Some(u) if u.is_universe => "Reporte de consumo: universo de órdenes".to_string(),
        _ => "Reporte de consumo de órdenes seleccionadas".to_string(),
    }
}

pub(crate) fn company_name<'a>(summary: &'a Summary, branding: &'a Branding) -> &'a str {
    if summary.company_name.trim().is_empty() {
        branding.company_name.trim()
    } else {
        summary.company_name.trim()
    }
}

pub(crate) fn compose(
    flow: &mut FlowContext,
    data: &ReportData<'_>,
    branding: &Branding,
    customization: &Customization,
) -> Vec<Section> {
    let mut c = Composer {
        flow,
        data,
        branding,
        customization,
        sections: Vec::new(),
    };
    let opts = customization;

    c.header();
    if data.summary.is_universe() {
        if opts.include_universe {
            c.applied_filter();
        }
        if opts.include_summary {
            c.summary_cards();
        }
        if opts.include_charts {
            c.consumption_chart();
        }
        c.totals_table();
        c.item_table();
        if opts.include_observations {
            c.observations();
        }
        if opts.include_detail {
            c.group_details();
        }
    } else {
        if opts.include_summary {
            c.summary_cards();
        }
        if opts.include_charts {
            c.consumption_chart();
        }
        c.totals_table();
        c.item_table();
        if opts.include_observations {
            c.observations();
        }
        if opts.include_detail {
            c.group_details();
        }
        if opts.include_movements {
            c.movements();
        }
    }
    c.sections.push(Section::Footer);
    c.sections
}

impl Composer<'_, '_, '_> {
    fn content_x(&self) -> f32 {
        self.flow.geometry().margin_left
    }

    fn content_width(&self) -> f32 {
        self.flow.geometry().content_width()
    }

    fn accent(&self) -> [u8; 3] {
        self.branding.colors.accent
    }

    /// Section title kept on the same page as the first `keep_with` points of
    /// what follows it.
    fn heading(&mut self, text: &str, keep_with: f32) {
        let style = TextStyle::bold(12.0).with_color(self.accent());
        let width = self.content_width();
        let h = self.flow.measure_text(text, width, style) + HEADING_GAP;
        self.flow.ensure_space(h + keep_with);
        let x = self.content_x();
        let canvas = self.flow.canvas();
        let top = canvas.cursor();
        canvas.text_block(x, top, width, text, style, Align::Left);
        canvas.advance(h);
    }

    fn header(&mut self) {
        let summary = self.data.summary;
        let title = report_title(summary, self.customization);
        let company = company_name(summary, self.branding).to_string();
        let stats = format!(
            "Generado el {} \u{2022} {} registro(s) en {} grupo(s)",
            date(Some(self.data.generated_at)),
            summary.items.len(),
            self.data.groups.len()
        );
        let selection = (!summary.is_universe()).then(|| {
            let ids: Vec<&str> = if summary.selected_ids.is_empty() {
                self.data.groups.iter().map(|g| g.base_id.as_str()).collect()
            } else {
                summary.selected_ids.iter().map(String::as_str).collect()
            };
            format!("Órdenes seleccionadas: {}", ids.join(", "))
        });

        let width = self.content_width();
        let title_style = TextStyle::bold(16.0).with_color(self.accent());
        let company_style = TextStyle::bold(11.0);
        let meta_style = TextStyle::regular(9.0).with_color(MUTED);

        let mut h = self.flow.measure_text(&title, width, title_style);
        if !company.is_empty() {
            h += self.flow.measure_text(&company, width, company_style);
        }
        h += self.flow.measure_text(&stats, width, meta_style);
        if let Some(sel) = &selection {
            h += self.flow.measure_text(sel, width, meta_style);
        }
        h += 6.0;
        self.flow.ensure_space(h);

        let x = self.content_x();
        let accent = self.accent();
        let canvas = self.flow.canvas();
        let mut y = canvas.cursor();
        y -= canvas.text_block(x, y, width, &title, title_style, Align::Left);
        if !company.is_empty() {
            y -= canvas.text_block(x, y, width, &company, company_style, Align::Left);
        }
        y -= canvas.text_block(x, y, width, &stats, meta_style, Align::Left);
        if let Some(sel) = &selection {
            y -= canvas.text_block(x, y, width, sel, meta_style, Align::Left);
        }
        canvas.hline(x, x + width, y - 3.0, accent, 1.0);
        canvas.advance(h);
        self.sections.push(Section::Header);
    }

    fn applied_filter(&mut self) {
        let universe = self.data.summary.universe.clone().unwrap_or_default();
        let label = if universe.label.trim().is_empty() {
            "Todos los registros".to_string()
        } else {
            universe.label.trim().to_string()
        };
        let statement = format!("Filtro aplicado: {label}");
        let description = universe.description.trim().to_string();

        let width = self.content_width();
        let inner = width - 16.0;
        let bold = TextStyle::bold(9.5);
        let regular = TextStyle::regular(9.0).with_color(MUTED);
        let mut h = self.flow.measure_text(&statement, inner, bold) + 12.0;
        if !description.is_empty() {
            h += self.flow.measure_text(&description, inner, regular);
        }

        self.flow.gap(SECTION_GAP);
        self.flow.ensure_space(h);
        let x = self.content_x();
        let accent = self.accent();
        let canvas = self.flow.canvas();
        let top = canvas.cursor();
        canvas.fill_rounded_rect(x, top - h, width, h, 4.0, CARD_FILL);
        canvas.fill_rect(x, top - h, 3.0, h, accent);
        let mut y = top - 6.0;
        y -= canvas.text_block(x + 8.0, y, inner, &statement, bold, Align::Left);
        if !description.is_empty() {
            canvas.text_block(x + 8.0, y, inner, &description, regular, Align::Left);
        }
        canvas.advance(h);
        self.sections.push(Section::AppliedFilter);
    }

    fn summary_cards(&mut self) {
        let grand = self.data.grand;
        let pct = compute_percentages(&grand);
        let colors = &self.branding.colors;
        let cards = [
            ("Autorizado", money(grand.total), String::new(), self.accent()),
            ("Remisiones", money(grand.total_rem), percent(pct.rem), colors.remisiones),
            ("Facturas", money(grand.total_fac), percent(pct.fac), colors.facturas),
            ("Restante", money(grand.restante), percent(pct.rest), colors.restante),
        ];

        self.flow.gap(SECTION_GAP);
        self.flow.ensure_space(CARD_H);
        let x0 = self.content_x();
        let card_w = (self.content_width() - CARD_GAP * (cards.len() as f32 - 1.0)) / cards.len() as f32;
        let canvas = self.flow.canvas();
        let top = canvas.cursor();
        for (i, (label, amount, share, color)) in cards.iter().enumerate() {
            let x = x0 + i as f32 * (card_w + CARD_GAP);
            canvas.fill_rounded_rect(x, top - CARD_H, card_w, CARD_H, 4.0, CARD_FILL);
            canvas.stroke_rounded_rect(x, top - CARD_H, card_w, CARD_H, 4.0, CARD_BORDER, 0.5);
            canvas.fill_rect(x, top - 3.0, card_w, 3.0, *color);
            let inner = card_w - 12.0;
            let mut y = top - 8.0;
            y -= canvas.text_block(x + 6.0, y, inner, label, TextStyle::regular(8.0).with_color(MUTED), Align::Left);
            y -= canvas.text_block(x + 6.0, y, inner, amount, TextStyle::bold(11.0), Align::Left);
            if !share.is_empty() {
                canvas.text_block(x + 6.0, y, inner, share, TextStyle::regular(8.5).with_color(*color), Align::Left);
            }
        }
        canvas.advance(CARD_H);
        self.sections.push(Section::SummaryCards);
    }

    fn consumption_chart(&mut self) {
        let grand = self.data.grand;
        let pct = compute_percentages(&grand);
        let bar = ConsumptionBar {
            title: Some("Distribución del consumo"),
            totals: &grand,
            percentages: &pct,
            palette: &self.branding.colors,
        };
        self.flow.gap(SECTION_GAP);
        let (x, w) = (self.content_x(), self.content_width());
        render_consumption_bar(self.flow, &bar, x, w);
        self.sections.push(Section::ConsumptionChart);
    }

    fn totals_table(&mut self) {
        let grand = self.data.grand;
        let pct = compute_percentages(&grand);
        let w = self.content_width();
        let authorized_share = if grand.total > 0.0 { percent(100.0) } else { "-".to_string() };
        let mut rows = vec![
            Row::new(vec!["Total autorizado".into(), money(grand.total).into(), authorized_share.into()]),
            Row::new(vec!["Remisiones".into(), money(grand.total_rem).into(), percent(pct.rem).into()]),
            Row::new(vec!["Facturas".into(), money(grand.total_fac).into(), percent(pct.fac).into()]),
            Row::new(vec![
                "Consumo total".into(),
                money(grand.total_consumo).into(),
                percent(pct.consumo).into(),
            ])
            .bold(),
            Row::new(vec!["Restante".into(), money(grand.restante).into(), percent(pct.rest).into()]),
        ];
        if let Some(overage) = pct.overage.filter(|o| *o > 0.0) {
            rows.push(
                Row::new(vec!["Consumo sin monto autorizado".into(), money(overage).into(), "-".into()])
                    .shaded(FULLY_CONSUMED),
            );
        }
        let table = Table {
            columns: vec![
                Column::new("Concepto", w * 0.44, Align::Left),
                Column::new("Monto", w * 0.32, Align::Right),
                Column::new("Porcentaje", w * 0.24, Align::Right),
            ],
            rows,
            font_size: 9.0,
            header_fill: self.accent(),
        };

        self.flow.gap(SECTION_GAP);
        let keep = table.header_height(self.flow) + table.row_height(self.flow, &table.rows[0]);
        self.heading("Totales", keep);
        let x = self.content_x();
        render_table(self.flow, &table, x);
        self.sections.push(Section::TotalsTable);
    }

    fn member_row(member: &GroupMember<'_>, group: &Group<'_>, with_alerts: bool) -> Row {
        let kind = if member.is_base { "Base" } else { "Ampliación" };
        let mut cells: Vec<Cell> = vec![
            member.item.id.as_str().into(),
            kind.into(),
            date(item_date(member.item)).into(),
            money(member.totals.total).into(),
            money(member.totals.total_rem).into(),
            money(member.totals.total_fac).into(),
            money(member.totals.restante).into(),
        ];
        if with_alerts {
            cells.push(percent(member.percentages.consumo).into());
            cells.push(alert_cell(member));
        }
        let mut row = Row::new(cells);
        if group.is_fully_consumed() {
            row = row.shaded(FULLY_CONSUMED);
        }
        if member.is_base && group.items.len() > 1 {
            row = row.bold();
        }
        row
    }

    fn item_table(&mut self) {
        let w = self.content_width();
        let mut rows = Vec::new();
        for group in &self.data.groups {
            for member in &group.items {
                rows.push(Self::member_row(member, group, true));
            }
            if group.items.len() > 1 {
                rows.push(group_total_row(group));
            }
        }
        if rows.is_empty() {
            let mut cells: Vec<Cell> = vec!["Sin registros".into()];
            cells.resize_with(ITEM_COLUMNS.len(), || "".into());
            rows.push(Row::new(cells));
        }
        let table = Table {
            columns: columns(&ITEM_COLUMNS, w),
            rows,
            font_size: 7.5,
            header_fill: self.accent(),
        };

        self.flow.gap(SECTION_GAP);
        let keep = table.header_height(self.flow) + table.row_height(self.flow, &table.rows[0]);
        self.heading("Detalle por orden", keep);
        let x = self.content_x();
        let stats = render_table(self.flow, &table, x);
        log::debug!(
            "item table: {} rows, {} header draws, {} page(s) started",
            table.rows.len(),
            stats.header_draws,
            stats.pages_started
        );
        self.sections.push(Section::ItemTable);
    }

    fn observations(&mut self) {
        let obs = ObservationBox {
            title: "Observaciones",
            notes: &self.customization.observations,
            always_show: self.customization.always_show_observations,
            min_height: 48.0,
        };
        let width = self.content_width();
        if obs.height(self.flow, width).is_none() {
            return;
        }
        self.flow.gap(SECTION_GAP);
        let x = self.content_x();
        if render_observations(self.flow, &obs, x, width) {
            self.sections.push(Section::Observations);
        }
    }

    fn group_details(&mut self) {
        let (data, branding) = (self.data, self.branding);
        if data.groups.is_empty() {
            return;
        }
        let x = self.content_x();
        let w = self.content_width();
        self.flow.gap(SECTION_GAP);

        for (gi, group) in data.groups.iter().enumerate() {
            if gi > 0 {
                self.flow.gap(GROUP_GAP);
            }
            let subtitle = if group.extension_ids.is_empty() {
                "Sin ampliaciones".to_string()
            } else {
                format!("Ampliaciones: {}", group.extension_ids.join(", "))
            };
            let bar = ConsumptionBar {
                title: Some(&subtitle),
                totals: &group.totals,
                percentages: &group.percentages,
                palette: &branding.colors,
            };
            let bar_h = bar.height(self.flow, w);
            self.heading(&format!("Orden {}", group.base_id), bar_h);
            render_consumption_bar(self.flow, &bar, x, w);

            let table = Table {
                columns: columns(&MEMBER_COLUMNS, w),
                rows: group
                    .items
                    .iter()
                    .map(|m| Self::member_row(m, group, false))
                    .collect(),
                font_size: 8.0,
                header_fill: self.accent(),
            };
            self.flow.gap(6.0);
            render_table(self.flow, &table, x);

            let notes = group_alert_notes(group);
            let obs = ObservationBox {
                title: "Alertas",
                notes: &notes,
                always_show: false,
                min_height: 0.0,
            };
            if obs.height(self.flow, w).is_some() {
                self.flow.gap(6.0);
                render_observations(self.flow, &obs, x, w);
            }
        }
        self.sections.push(Section::GroupDetail);
    }

    fn movements(&mut self) {
        let data = self.data;
        let items = &data.summary.items;
        let remisiones = collect_movements(items, &data.grand, MovementKind::Remisiones);
        let facturas = collect_movements(items, &data.grand, MovementKind::Facturas);

        self.flow.gap(SECTION_GAP);
        let (x, w) = (self.content_x(), self.content_width());
        let keep = lead_height(self.flow, &remisiones, &facturas, w);
        self.heading("Movimientos", keep);
        render_movement_columns(self.flow, &remisiones, &facturas, x, w);
        self.sections.push(Section::Movements);
    }
}

fn group_total_row(group: &Group<'_>) -> Row {
    let t = &group.totals;
    let p: &Percentages = &group.percentages;
    let mut row = Row::new(vec![
        format!("Total {}", group.base_id).into(),
        "".into(),
        "".into(),
        money(t.total).into(),
        money(t.total_rem).into(),
        money(t.total_fac).into(),
        money(t.restante).into(),
        percent(p.consumo).into(),
        "".into(),
    ])
    .bold();
    row.shading = Some(if group.is_fully_consumed() {
        FULLY_CONSUMED
    } else {
        SUBTOTAL_FILL
    });
    row
}

/// The most severe alert's message, with a count of the rest.
fn alert_cell(member: &GroupMember<'_>) -> Cell {
    let alerts = &member.item.alerts;
    let Some(worst) = alerts.iter().max_by_key(|a| a.severity) else {
        return Cell::Text("-".to_string());
    };
    let mut text = if worst.message.trim().is_empty() {
        "Alerta".to_string()
    } else {
        worst.message.trim().to_string()
    };
    if alerts.len() > 1 {
        text.push_str(&format!(" (+{})", alerts.len() - 1));
    }
    Cell::Alert {
        text,
        severity: worst.severity,
    }
}

fn group_alert_notes(group: &Group<'_>) -> Vec<String> {
    let mut notes = Vec::new();
    for member in &group.items {
        let mut alerts: Vec<_> = member.item.alerts.iter().collect();
        alerts.sort_by(|a, b| b.severity.cmp(&a.severity));
        for alert in alerts {
            let level = match alert.severity {
                Severity::Critical => "Crítica",
                Severity::Warning => "Advertencia",
                Severity::Info => "Info",
                Severity::Unknown => "Alerta",
            };
            notes.push(format!("{} [{}]: {}", member.item.id, level, alert.message.trim()));
        }
    }
    notes
}
