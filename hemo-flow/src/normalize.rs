use serde_json::Value;
use tracing::debug;

use crate::measurement::{
    DisplayMeasurement, Measurement, PLACEHOLDER, format_number, numeric_value,
};
use crate::range::{evaluate, reference_range_text};

/// Turn one raw OCR record into a display row. Total: malformed values only
/// downgrade the row to `unknown`.
pub fn normalize(raw: &Measurement) -> DisplayMeasurement {
    let value = raw.value.as_ref().and_then(|v| match numeric_value(v) {
        Ok(number) => Some(number),
        Err(err) => {
            debug!(name = ?raw.name, "Measurement value unreadable: {}", err);
            None
        }
    });

    let status = evaluate(value, raw.lower_limit, raw.upper_limit);

    DisplayMeasurement {
        name: or_placeholder(raw.name.as_deref()),
        value,
        value_text: value_text(raw.value.as_ref()),
        unit: or_placeholder(raw.unit.as_deref()),
        lower_limit: raw.lower_limit,
        upper_limit: raw.upper_limit,
        status,
        status_label: status.label().to_string(),
        reference_range_text: reference_range_text(raw.lower_limit, raw.upper_limit),
    }
}

/// Normalize a whole result set, keeping input order.
pub fn normalize_all(raw: &[Measurement]) -> Vec<DisplayMeasurement> {
    raw.iter().map(normalize).collect()
}

fn or_placeholder(text: Option<&str>) -> String {
    match text.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

// The value cell shows what the lab printed, not the parsed number.
fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => or_placeholder(Some(s.as_str())),
        Some(Value::Number(n)) => n.as_f64().map(format_number).unwrap_or_else(|| n.to_string()),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Null) | None => PLACEHOLDER.to_string(),
        Some(other) => other.to_string(),
    }
}
