//! Confidence values arrive in two shapes depending on which model produced
//! them: fractions in `[0, 1]` or percentages in `(1, 100]`. Everything
//! downstream works in percent, so normalization happens once at the edge.

/// Converts a raw model confidence to a percentage.
///
/// Values at or below `1.0` are treated as fractions and scaled by 100;
/// anything larger is assumed to already be a percentage and passes through.
pub fn normalize(raw: f64) -> f64 {
    if raw <= 1.0 {
        raw * 100.0
    } else {
        raw
    }
}

/// Formats a percentage with one decimal place, e.g. `82.0`.
pub fn format_percent(pct: f64) -> String {
    format!("{pct:.1}")
}
