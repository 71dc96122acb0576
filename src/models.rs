use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "Generación Emergente")]
    EmergingGeneration,
    #[serde(rename = "Ordenanzas y convenios")]
    OrdinancesAndCovenants,
    #[serde(rename = "Ministración")]
    Ministering,
    #[serde(rename = "Otros")]
    Others,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::EmergingGeneration,
        Priority::OrdinancesAndCovenants,
        Priority::Ministering,
        Priority::Others,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Priority::EmergingGeneration => "Generación Emergente",
            Priority::OrdinancesAndCovenants => "Ordenanzas y convenios",
            Priority::Ministering => "Ministración",
            Priority::Others => "Otros",
        }
    }
}

/// How an indicator is presented to leaders. Display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportCriteria {
    #[serde(rename = "Acumulado")]
    Cumulative,
    #[serde(rename = "Promedio Mensual")]
    MonthlyAverage,
}

impl ReportCriteria {
    pub fn label(self) -> &'static str {
        match self {
            ReportCriteria::Cumulative => "Acumulado",
            ReportCriteria::MonthlyAverage => "Promedio Mensual",
        }
    }
}

/// How monthly reports combine into the figure for a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationType {
    /// Each report is the running total; the latest positive report wins.
    Cumulative,
    /// Each report is a monthly delta.
    Sum,
    /// Mean of the months that carry data.
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Month {
    #[serde(rename = "Enero")]
    January,
    #[serde(rename = "Febrero")]
    February,
    #[serde(rename = "Marzo")]
    March,
    #[serde(rename = "Abril")]
    April,
    #[serde(rename = "Mayo")]
    May,
    #[serde(rename = "Junio")]
    June,
    #[serde(rename = "Julio")]
    July,
    #[serde(rename = "Agosto")]
    August,
    #[serde(rename = "Septiembre")]
    September,
    #[serde(rename = "Octubre")]
    October,
    #[serde(rename = "Noviembre")]
    November,
    #[serde(rename = "Diciembre")]
    December,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::January,
        Month::February,
        Month::March,
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
    ];

    const LABELS: [&'static str; 12] = [
        "Enero",
        "Febrero",
        "Marzo",
        "Abril",
        "Mayo",
        "Junio",
        "Julio",
        "Agosto",
        "Septiembre",
        "Octubre",
        "Noviembre",
        "Diciembre",
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Label used by the store and shown to leaders.
    pub fn label(self) -> &'static str {
        Self::LABELS[self.index()]
    }

    pub fn from_label(label: &str) -> Option<Month> {
        let label = label.trim();
        Self::LABELS
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(label))
            .map(|idx| Self::ALL[idx])
    }

    /// Calendar month of the local clock, independent of any selected period.
    pub fn current() -> Month {
        Self::ALL[Local::now().month0() as usize]
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Month {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Month::from_label(s).ok_or_else(|| format!("unknown month '{s}'"))
    }
}

/// The period a dashboard is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisPeriod {
    #[default]
    Annual,
    Month(Month),
}

impl fmt::Display for AnalysisPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisPeriod::Annual => f.write_str("Anual"),
            AnalysisPeriod::Month(month) => f.write_str(month.label()),
        }
    }
}

impl FromStr for AnalysisPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("anual") || trimmed.eq_ignore_ascii_case("annual") {
            return Ok(AnalysisPeriod::Annual);
        }
        Month::from_label(trimmed)
            .map(AnalysisPeriod::Month)
            .ok_or_else(|| format!("unknown period '{s}', expected 'Anual' or a month name"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Council {
    Tegucigalpa,
    #[serde(rename = "Comayagüela")]
    Comayaguela,
}

impl Council {
    pub const ALL: [Council; 2] = [Council::Tegucigalpa, Council::Comayaguela];

    pub fn label(self) -> &'static str {
        match self {
            Council::Tegucigalpa => "Tegucigalpa",
            Council::Comayaguela => "Comayagüela",
        }
    }
}

impl fmt::Display for Council {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Council {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tegucigalpa" => Ok(Council::Tegucigalpa),
            "comayaguela" | "comayagüela" => Ok(Council::Comayaguela),
            other => Err(format!("unknown council '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CouncilFilter {
    #[default]
    All,
    Only(Council),
}

impl CouncilFilter {
    pub fn admits(self, council: Council) -> bool {
        match self {
            CouncilFilter::All => true,
            CouncilFilter::Only(only) => only == council,
        }
    }
}

impl From<Option<Council>> for CouncilFilter {
    fn from(value: Option<Council>) -> Self {
        value.map(CouncilFilter::Only).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorTemplate {
    pub id: &'static str,
    pub priority: Priority,
    pub name: &'static str,
    pub description: &'static str,
    pub criteria: ReportCriteria,
    pub calculation: CalculationType,
    pub goal: f64,
    /// Goals and values are percentages; councils average them instead of summing.
    pub aggregate_as_ratio: bool,
}

/// A stake or district.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Unit {
    pub id: &'static str,
    pub name: &'static str,
    pub council: Council,
    #[serde(skip)]
    pub access_key: &'static str,
}

impl Unit {
    /// Name without the "Estaca"/"Distrito" prefix, for tables and charts.
    pub fn short_name(&self) -> &'static str {
        self.name
            .strip_prefix("Estaca ")
            .or_else(|| self.name.strip_prefix("Distrito "))
            .unwrap_or(self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyReport {
    pub unit_id: String,
    pub indicator_id: String,
    pub month: Month,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalOverride {
    pub unit_id: String,
    pub indicator_id: String,
    pub goal: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    StakeLeader,
    AreaSeventy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "crate::store::phone_string")]
    pub phone: String,
    #[serde(rename = "stakeId", default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

fn default_role() -> Role {
    Role::StakeLeader
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedIndicator {
    pub template: IndicatorTemplate,
    /// One slot per calendar month, January first. Missing reports are 0.
    pub monthly: [f64; 12],
    pub goal: f64,
    pub current: f64,
    /// Clamped to 100.
    pub progress: f64,
    /// Unclamped, used for rankings.
    pub raw_progress: f64,
}

impl EnrichedIndicator {
    pub fn value_in(&self, month: Month) -> f64 {
        self.monthly[month.index()]
    }
}

#[derive(Debug, Clone)]
pub struct UnitStanding {
    pub unit: Unit,
    pub indicators: Vec<EnrichedIndicator>,
    pub avg_progress: f64,
    pub users: Vec<User>,
    pub has_reported: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CouncilIndicator {
    pub template: IndicatorTemplate,
    pub goal: f64,
    pub current: f64,
    pub progress: f64,
}

#[derive(Debug, Clone)]
pub struct CouncilRollup {
    pub council: Council,
    pub indicators: Vec<CouncilIndicator>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub unit: Unit,
    pub current: f64,
    pub goal: f64,
    pub progress: f64,
}
