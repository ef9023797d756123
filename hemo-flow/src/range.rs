//! Reference-range policy: how a value compares to its lab-supplied bounds.

use crate::measurement::{PLACEHOLDER, Status, format_number};

/// Classify `value` against optional `lower`/`upper` bounds.
///
/// A value sitting exactly on a bound is `Normal`. Non-finite values are
/// `Unknown`; non-finite bounds count as absent.
pub fn evaluate(value: Option<f64>, lower: Option<f64>, upper: Option<f64>) -> Status {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return Status::Unknown;
    };

    if let Some(lower) = finite(lower) {
        if value < lower {
            return Status::Low;
        }
    }
    if let Some(upper) = finite(upper) {
        if value > upper {
            return Status::High;
        }
    }
    Status::Normal
}

/// Human-readable reference range for the given bounds.
pub fn reference_range_text(lower: Option<f64>, upper: Option<f64>) -> String {
    match (finite(lower), finite(upper)) {
        (Some(lower), Some(upper)) => {
            format!("{} – {}", format_number(lower), format_number(upper))
        }
        (Some(lower), None) => format!("≥ {}", format_number(lower)),
        (None, Some(upper)) => format!("≤ {}", format_number(upper)),
        (None, None) => PLACEHOLDER.to_string(),
    }
}

fn finite(bound: Option<f64>) -> Option<f64> {
    bound.filter(|b| b.is_finite())
}
