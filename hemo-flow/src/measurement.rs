use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MalformedNumeric;

/// Shown wherever a measurement field has nothing to display.
pub const PLACEHOLDER: &str = "—";

/// A raw measurement record as delivered by the OCR service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: Option<String>,
    pub value: Option<Value>,
    pub unit: Option<String>,
    pub lower_limit: Option<f64>,
    pub upper_limit: Option<f64>,
}

impl Measurement {
    /// Decode one entry of the `measurements` array. Never fails: fields of
    /// the wrong type are dropped, and a non-object entry becomes an empty
    /// record so the row still shows up in its original position.
    pub fn from_value(raw: &Value) -> Self {
        let Some(fields) = raw.as_object() else {
            return Self::default();
        };

        let text = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let bound = |key: &str| fields.get(key).and_then(|v| numeric_value(v).ok());

        Self {
            name: text("name"),
            value: fields.get("value").filter(|v| !v.is_null()).cloned(),
            unit: text("unit"),
            lower_limit: bound("lower_limit"),
            upper_limit: bound("upper_limit"),
        }
    }
}

/// Clinical flag derived from a value and its reference bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Normal,
    Low,
    High,
    Unknown,
}

impl Status {
    /// Capitalised label for table cells.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Normal => "Normal",
            Status::Low => "Low",
            Status::High => "High",
            Status::Unknown => "Unknown",
        }
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self, Status::Low | Status::High)
    }
}

/// A measurement ready for table rendering. Built once by the normalizer
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMeasurement {
    pub name: String,
    pub value: Option<f64>,
    pub value_text: String,
    pub unit: String,
    pub lower_limit: Option<f64>,
    pub upper_limit: Option<f64>,
    pub status: Status,
    pub status_label: String,
    pub reference_range_text: String,
}

/// Read a lab value written with either `.` or `,` as decimal separator.
pub fn parse_numeric(text: &str) -> Result<f64, MalformedNumeric> {
    let cleaned = text.trim().replace(',', ".");
    match cleaned.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(MalformedNumeric(text.to_string())),
    }
}

/// Numeric reading of a JSON value: numbers as-is, strings via
/// [`parse_numeric`], anything else is malformed.
pub fn numeric_value(value: &Value) -> Result<f64, MalformedNumeric> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| MalformedNumeric(n.to_string())),
        Value::String(s) => parse_numeric(s),
        other => Err(MalformedNumeric(other.to_string())),
    }
}

/// Render a number without a trailing `.0` for whole values.
pub fn format_number(number: f64) -> String {
    format!("{number}")
}
