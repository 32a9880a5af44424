//! Dashboard summary as returned by `GET /dashboard`, with lenient decoding.
//!
//! Every field is optional on the wire: missing or null values become zero or empty, so a partial
//! summary still renders. Only a body that is not a JSON object at all fails to decode.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DashboardData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: Summary,
    #[serde(default, deserialize_with = "null_as_default")]
    pub trends: Vec<TrendPoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
    #[serde(default)]
    pub risk_alerts: Option<Value>,
    #[serde(default)]
    pub risk_breakdown: Option<Value>,
    #[serde(default)]
    pub students_at_risk: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Summary {
    #[serde(default, deserialize_with = "number_or_zero")]
    pub total_students: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub performance_distribution: PerformanceDistribution,
    #[serde(default, deserialize_with = "null_as_default")]
    pub semester_distribution: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub program_distribution: Map<String, Value>,
}

/// Students per performance band.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PerformanceDistribution {
    #[serde(rename = "Alto", default, deserialize_with = "number_or_zero")]
    pub alto: f64,
    #[serde(rename = "Medio", default, deserialize_with = "number_or_zero")]
    pub medio: f64,
    #[serde(rename = "Bajo", default, deserialize_with = "number_or_zero")]
    pub bajo: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TrendPoint {
    #[serde(default)]
    pub week: Value,
    #[serde(default, deserialize_with = "number_or_zero")]
    pub avg_grade: f64,
    /// Fraction in [0, 1].
    #[serde(default, deserialize_with = "number_or_zero")]
    pub avg_attendance: f64,
    #[serde(default, deserialize_with = "number_or_zero")]
    pub avg_assignments: f64,
    #[serde(default, deserialize_with = "number_or_zero")]
    pub student_count: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Metadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_updated: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub analysis_period: String,
}

/// One row of a two-column table (label, count).
#[derive(Debug, Clone, PartialEq)]
pub struct CountRow {
    pub label: String,
    pub count: f64,
}

/// One line of the risk section.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRow {
    pub label: String,
    pub value: String,
}

fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

fn number_or_zero<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_as_number(&Value::deserialize(d)?))
}

/// Numbers pass through, numeric strings are parsed, anything else is 0.
pub fn value_as_number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Render a number the way the service's consumers expect: `8` not `8.0`.
pub fn format_number(n: f64) -> String {
    format!("{}", n)
}

/// Attendance fraction as a whole percentage, e.g. `0.873` -> `87%`.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

fn value_label(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// Local date-time for `last_updated`; falls back to the raw string when it does not parse.
pub fn format_timestamp(raw: &str) -> String {
    use chrono::{DateTime, Local, NaiveDateTime};
    const SHOWN: &str = "%d/%m/%Y, %H:%M:%S";
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format(SHOWN).to_string();
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => naive.format(SHOWN).to_string(),
        Err(_) => raw.to_string(),
    }
}

fn count_rows(map: &Map<String, Value>) -> Vec<CountRow> {
    map.iter()
        .map(|(k, v)| CountRow {
            label: k.clone(),
            count: value_as_number(v),
        })
        .collect()
}

impl Summary {
    /// Semester table rows, in response order.
    pub fn semester_rows(&self) -> Vec<CountRow> {
        count_rows(&self.semester_distribution)
    }

    /// Program table rows, in response order.
    pub fn program_rows(&self) -> Vec<CountRow> {
        count_rows(&self.program_distribution)
    }
}

impl TrendPoint {
    pub fn week_label(&self) -> String {
        value_label(&self.week)
    }
}

impl DashboardData {
    pub fn has_risk_section(&self) -> bool {
        !self.risk_rows().is_empty()
    }

    /// Flatten the optional risk fields into display rows.
    pub fn risk_rows(&self) -> Vec<RiskRow> {
        let mut rows = Vec::new();
        match &self.students_at_risk {
            Some(Value::Array(items)) => rows.push(RiskRow {
                label: "Estudiantes en riesgo".into(),
                value: items.len().to_string(),
            }),
            Some(Value::Null) | None => {}
            Some(v) => rows.push(RiskRow {
                label: "Estudiantes en riesgo".into(),
                value: value_label(v),
            }),
        }
        if let Some(Value::Object(map)) = &self.risk_breakdown {
            for (k, v) in map {
                rows.push(RiskRow {
                    label: k.clone(),
                    value: value_label(v),
                });
            }
        }
        match &self.risk_alerts {
            Some(Value::Array(items)) => {
                for item in items {
                    rows.push(RiskRow {
                        label: "Alerta".into(),
                        value: alert_text(item),
                    });
                }
            }
            Some(Value::Null) | None => {}
            Some(v) => rows.push(RiskRow {
                label: "Alerta".into(),
                value: alert_text(v),
            }),
        }
        rows
    }
}

fn alert_text(item: &Value) -> String {
    match item {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, value_label(v)))
            .collect::<Vec<_>>()
            .join(", "),
        other => value_label(other),
    }
}
