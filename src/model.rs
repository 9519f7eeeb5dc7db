use std::path::PathBuf;

use serde::{Deserialize, Deserializer};

/// Accepts a JSON number, a numeric string (`"1,234.50"`, `"$300"`) or null.
/// Anything unparsable becomes 0.
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(amount_from_value(&value))
}

fn lenient_optional_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => None,
        v => Some(amount_from_value(&v)),
    })
}

pub(crate) fn amount_from_value(value: &serde_json::Value) -> f64 {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// `fecha` as it arrives from the data layer: text in one of several layouts,
/// or epoch milliseconds.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDate {
    Millis(i64),
    Text(String),
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Movement {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub monto: f64,
    #[serde(default)]
    pub observaciones: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Unknown,
    Info,
    Warning,
    Critical,
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(match raw.trim().to_lowercase().as_str() {
            "info" | "low" => Severity::Info,
            "warning" | "warn" | "medium" => Severity::Warning,
            "critical" | "error" | "high" => Severity::Critical,
            _ => Severity::Unknown,
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Alert {
    #[serde(default = "unknown_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
}

fn unknown_severity() -> Severity {
    Severity::Unknown
}

/// One authorized record.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(default)]
    pub base_id: Option<String>,
    #[serde(default)]
    pub fecha: Option<RawDate>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub total: f64,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub subtotal: f64,
    #[serde(default, deserialize_with = "lenient_optional_amount")]
    pub total_rem: Option<f64>,
    #[serde(default, deserialize_with = "lenient_optional_amount")]
    pub total_fac: Option<f64>,
    #[serde(default)]
    pub remisiones: Vec<Movement>,
    #[serde(default)]
    pub facturas: Vec<Movement>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl Item {
    pub fn new(id: impl Into<String>, total: f64) -> Self {
        Self {
            id: id.into(),
            total,
            ..Default::default()
        }
    }
}

/// Amounts for one item, one group, or the whole report.
///
/// `total_consumo` and `restante` are always derived from the other three
/// fields; use [`Totals::new`] to build a consistent value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Totals {
    pub total: f64,
    pub total_rem: f64,
    pub total_fac: f64,
    pub total_consumo: f64,
    pub restante: f64,
}

impl Totals {
    pub fn new(total: f64, total_rem: f64, total_fac: f64) -> Self {
        let sanitize = |v: f64| if v.is_finite() { v } else { 0.0 };
        let (total, total_rem, total_fac) = (sanitize(total), sanitize(total_rem), sanitize(total_fac));
        let total_consumo = total_rem + total_fac;
        Self {
            total,
            total_rem,
            total_fac,
            total_consumo,
            restante: (total - total_consumo).max(0.0),
        }
    }

    pub(crate) fn add(&self, other: &Totals) -> Totals {
        Totals::new(
            self.total + other.total,
            self.total_rem + other.total_rem,
            self.total_fac + other.total_fac,
        )
    }
}

/// Upstream totals are only trusted for the three independent amounts.
impl<'de> Deserialize<'de> for Totals {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct RawTotals {
            #[serde(default, deserialize_with = "lenient_amount")]
            total: f64,
            #[serde(default, deserialize_with = "lenient_amount")]
            total_rem: f64,
            #[serde(default, deserialize_with = "lenient_amount")]
            total_fac: f64,
        }
        let raw = RawTotals::deserialize(deserializer)?;
        Ok(Totals::new(raw.total, raw.total_rem, raw.total_fac))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Percentages {
    pub rem: f64,
    pub fac: f64,
    pub rest: f64,
    pub consumo: f64,
    /// Consumed amount reported instead of percentages when nothing was authorized.
    pub overage: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Universe {
    #[serde(default)]
    pub is_universe: bool,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub title: String,
}

/// Whole-report input, fully materialized by the data layer.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub totals: Option<Totals>,
    #[serde(default)]
    pub universe: Option<Universe>,
    #[serde(default)]
    pub selected_ids: Vec<String>,
    #[serde(default)]
    pub company_name: String,
}

impl Summary {
    pub fn is_universe(&self) -> bool {
        self.universe.as_ref().is_some_and(|u| u.is_universe)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Palette {
    pub remisiones: [u8; 3],
    pub facturas: [u8; 3],
    pub restante: [u8; 3],
    pub accent: [u8; 3],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            remisiones: [0x3B, 0x82, 0xF6],
            facturas: [0xF5, 0x9E, 0x0B],
            restante: [0x10, 0xB9, 0x81],
            accent: [0x1E, 0x3A, 0x8A],
        }
    }
}

/// Presentation settings merged from the settings store and per-request overrides.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Branding {
    pub colors: Palette,
    pub header_text: String,
    pub footer_text: String,
    pub company_name: String,
    pub letterhead_top: Option<PathBuf>,
    pub letterhead_bottom: Option<PathBuf>,
    pub font_regular: Option<PathBuf>,
    pub font_bold: Option<PathBuf>,
}

fn enabled() -> bool {
    true
}

/// Section switches. An absent key leaves its section enabled.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
    #[serde(default = "enabled")]
    pub include_summary: bool,
    #[serde(default = "enabled")]
    pub include_detail: bool,
    #[serde(default = "enabled")]
    pub include_charts: bool,
    #[serde(default = "enabled")]
    pub include_movements: bool,
    #[serde(default = "enabled")]
    pub include_observations: bool,
    #[serde(default = "enabled")]
    pub include_universe: bool,
    #[serde(default)]
    pub observations: Vec<String>,
    #[serde(default = "enabled")]
    pub always_show_observations: bool,
    #[serde(default)]
    pub generated_at: Option<chrono::NaiveDate>,
    /// Replaces the document title for both report variants.
    #[serde(default)]
    pub title: Option<String>,
}

impl Default for Customization {
    fn default() -> Self {
        Self {
            include_summary: true,
            include_detail: true,
            include_charts: true,
            include_movements: true,
            include_observations: true,
            include_universe: true,
            observations: Vec::new(),
            always_show_observations: true,
            generated_at: None,
            title: None,
        }
    }
}

impl Customization {
    /// Turns a section off by its switch name (`summary`, `detail`, ...).
    /// Returns false for unrecognized names.
    pub fn disable(&mut self, section: &str) -> bool {
        let switch = match section.trim().to_lowercase().as_str() {
            "summary" => &mut self.include_summary,
            "detail" => &mut self.include_detail,
            "charts" => &mut self.include_charts,
            "movements" => &mut self.include_movements,
            "observations" => &mut self.include_observations,
            "universe" => &mut self.include_universe,
            _ => return false,
        };
        *switch = false;
        true
    }
}
