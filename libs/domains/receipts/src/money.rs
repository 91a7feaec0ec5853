//! Minor to major unit conversion for display.

/// Format an amount in minor units as major units with two decimals, e.g. `31725` -> `317.25`.
pub fn format_minor_units(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
