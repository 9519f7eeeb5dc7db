//! Pure aggregation over a [`Summary`]: normalized totals, percentages,
//! base/extension groups and flattened movement lists.
//!
//! Nothing here fails. Missing or negative amounts are treated as 0 and every
//! percentage is clamped, so the renderers can trust the values they get.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::model::{Item, Movement, Percentages, RawDate, Summary, Totals};

const MAX_PARTIAL_PCT: f64 = 999.99;

/// Source of the three independent amounts a [`Totals`] is derived from.
pub trait TotalsSource {
    fn authorized(&self) -> f64;
    fn remisiones(&self) -> f64;
    fn facturas(&self) -> f64;
}

impl TotalsSource for Item {
    fn authorized(&self) -> f64 {
        if self.total <= 0.0 && self.subtotal > 0.0 {
            self.subtotal
        } else {
            self.total
        }
    }

    fn remisiones(&self) -> f64 {
        self.total_rem
            .unwrap_or_else(|| self.remisiones.iter().map(|m| m.monto).sum())
    }

    fn facturas(&self) -> f64 {
        self.total_fac
            .unwrap_or_else(|| self.facturas.iter().map(|m| m.monto).sum())
    }
}

impl TotalsSource for Totals {
    fn authorized(&self) -> f64 {
        self.total
    }

    fn remisiones(&self) -> f64 {
        self.total_rem
    }

    fn facturas(&self) -> f64 {
        self.total_fac
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

pub fn compute_percentages(totals: &Totals) -> Percentages {
    let total = non_negative(totals.total);
    let rem_amount = non_negative(totals.total_rem);
    let fac_amount = non_negative(totals.total_fac);
    let consumo_amount = rem_amount + fac_amount;

    if total <= 0.0 {
        return Percentages {
            overage: Some(consumo_amount),
            ..Default::default()
        };
    }

    let restante = (total - consumo_amount).max(0.0);
    let rem = round2(rem_amount / total * 100.0).clamp(0.0, MAX_PARTIAL_PCT);
    let fac = round2(fac_amount / total * 100.0).clamp(0.0, MAX_PARTIAL_PCT);
    let rest = round2(restante / total * 100.0).clamp(0.0, 100.0);
    Percentages {
        rem,
        fac,
        rest,
        consumo: round2(rem + fac),
        overage: None,
    }
}

/// Denominator for drawing the three bar segments: the observed sum, never
/// less than 100, so over-consumption stays proportional inside the bar.
pub fn compute_segment_scale(p: &Percentages) -> f64 {
    let sum = non_negative(p.rem) + non_negative(p.fac) + non_negative(p.rest);
    sum.max(100.0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedTotals {
    pub totals: Totals,
    pub percentages: Percentages,
}

/// Totals and display percentages for one item. `percentages.consumo` is
/// capped at 100; the raw overage stays visible through `totals`.
pub fn normalize_item_totals<T: TotalsSource + ?Sized>(source: &T) -> NormalizedTotals {
    let totals = Totals::new(
        non_negative(source.authorized()),
        non_negative(source.remisiones()),
        non_negative(source.facturas()),
    );
    let mut percentages = compute_percentages(&totals);
    percentages.consumo = percentages.consumo.min(100.0);
    NormalizedTotals {
        totals,
        percentages,
    }
}

/// `id` with one trailing `-<digits>` suffix removed, or `id` itself.
pub fn derive_base_id(id: &str) -> &str {
    match id.rsplit_once('-') {
        Some((prefix, suffix))
            if !prefix.is_empty()
                && !suffix.is_empty()
                && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            prefix
        }
        _ => id,
    }
}

pub fn base_id_of(item: &Item) -> &str {
    match item.base_id.as_deref().map(str::trim) {
        Some(explicit) if !explicit.is_empty() => explicit,
        _ => derive_base_id(item.id.trim()),
    }
}

/// Parses the raw `fecha` encodings the data layer produces.
pub fn parse_fecha(raw: &RawDate) -> Option<NaiveDate> {
    match raw {
        RawDate::Millis(ms) => DateTime::from_timestamp_millis(*ms).map(|dt| dt.date_naive()),
        RawDate::Text(text) => {
            let s = text.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(ms) = s.parse::<i64>() {
                return DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive());
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.date_naive());
            }
            for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, layout) {
                    return Some(dt.date());
                }
            }
            ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"]
                .iter()
                .find_map(|layout| NaiveDate::parse_from_str(s, layout).ok())
        }
    }
}

pub fn item_date(item: &Item) -> Option<NaiveDate> {
    item.fecha.as_ref().and_then(parse_fecha)
}

#[derive(Clone, Debug)]
pub struct GroupMember<'a> {
    pub item: &'a Item,
    pub is_base: bool,
    pub totals: Totals,
    pub percentages: Percentages,
}

/// All items sharing one base id.
#[derive(Clone, Debug)]
pub struct Group<'a> {
    pub base_id: String,
    pub ids: BTreeSet<String>,
    pub extension_ids: Vec<String>,
    pub totals: Totals,
    pub percentages: Percentages,
    pub items: Vec<GroupMember<'a>>,
}

impl Group<'_> {
    /// Something was authorized and nothing of it remains.
    pub fn is_fully_consumed(&self) -> bool {
        self.totals.total > 0.0 && self.totals.restante <= 0.0
    }
}

pub fn build_group_hierarchy(summary: &Summary) -> Vec<Group<'_>> {
    let mut by_base: BTreeMap<String, Vec<GroupMember<'_>>> = BTreeMap::new();

    for item in &summary.items {
        let base = base_id_of(item).to_string();
        let normalized = normalize_item_totals(item);
        let is_base = item.id.trim() == base;
        by_base.entry(base).or_default().push(GroupMember {
            item,
            is_base,
            totals: normalized.totals,
            percentages: normalized.percentages,
        });
    }

    // BTreeMap iteration already yields groups ordered by base id.
    by_base
        .into_iter()
        .map(|(base_id, mut members)| {
            order_members(&mut members);

            let totals = members
                .iter()
                .fold(Totals::default(), |acc, m| acc.add(&m.totals));
            let mut percentages = compute_percentages(&totals);
            percentages.consumo = percentages.consumo.min(100.0);

            let ids: BTreeSet<String> = members.iter().map(|m| m.item.id.clone()).collect();
            let extension_ids = ids.iter().filter(|id| **id != base_id).cloned().collect();

            Group {
                base_id,
                ids,
                extension_ids,
                totals,
                percentages,
                items: members,
            }
        })
        .collect()
}

/// Base first, then the rest by id. Without a base member the earliest dated
/// member leads (undated members sort after dated ones, ties by id).
fn order_members(members: &mut [GroupMember<'_>]) {
    members.sort_by(|a, b| a.item.id.cmp(&b.item.id));

    let lead = members.iter().position(|m| m.is_base).or_else(|| {
        members
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let (da, db) = (item_date(a.item), item_date(b.item));
                match (da, db) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                }
                .then_with(|| a.item.id.cmp(&b.item.id))
            })
            .map(|(i, _)| i)
    });

    if let Some(i) = lead {
        members[..=i].rotate_right(1);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovementKind {
    Remisiones,
    Facturas,
}

impl MovementKind {
    pub fn label(self) -> &'static str {
        match self {
            MovementKind::Remisiones => "Remisiones",
            MovementKind::Facturas => "Facturas",
        }
    }

    fn of(self, item: &Item) -> &[Movement] {
        match self {
            MovementKind::Remisiones => &item.remisiones,
            MovementKind::Facturas => &item.facturas,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MovementEntry<'a> {
    pub item_id: &'a str,
    pub movement: &'a Movement,
    /// Share of the report's grand total, not of the owning item.
    pub percentage: f64,
}

#[derive(Clone, Debug)]
pub struct MovementList<'a> {
    pub kind: MovementKind,
    pub movements: Vec<MovementEntry<'a>>,
    pub subtotal: f64,
    pub percentage_of_grand_total: f64,
}

fn share_of(amount: f64, grand_total: f64) -> f64 {
    if grand_total <= 0.0 {
        0.0
    } else {
        round2(non_negative(amount) / grand_total * 100.0)
    }
}

pub fn collect_movements<'a>(
    items: &'a [Item],
    totals: &Totals,
    kind: MovementKind,
) -> MovementList<'a> {
    let grand_total = non_negative(totals.total);
    let mut movements: Vec<MovementEntry<'a>> = items
        .iter()
        .flat_map(|item| {
            kind.of(item).iter().map(move |m| MovementEntry {
                item_id: item.id.as_str(),
                movement: m,
                percentage: share_of(m.monto, grand_total),
            })
        })
        .collect();

    // sort_by is stable: equal montos keep their original order
    movements.sort_by(|a, b| b.movement.monto.total_cmp(&a.movement.monto));

    let subtotal: f64 = movements.iter().map(|e| e.movement.monto).sum();
    MovementList {
        kind,
        movements,
        subtotal,
        percentage_of_grand_total: share_of(subtotal, grand_total),
    }
}

/// Grand totals for the report: the supplied totals when present (with the
/// derived fields recomputed), otherwise the sum over all items.
pub fn grand_totals(summary: &Summary) -> Totals {
    match &summary.totals {
        Some(t) => Totals::new(non_negative(t.total), non_negative(t.total_rem), non_negative(t.total_fac)),
        None => summary
            .items
            .iter()
            .map(|item| normalize_item_totals(item).totals)
            .fold(Totals::default(), |acc, t| acc.add(&t)),
    }
}
