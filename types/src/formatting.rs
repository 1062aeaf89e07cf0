//! Number formatting for simulator reports and debug output.
//!
//! Weights, probabilities and tick counts all go through this module so the
//! CLI table and log lines print them the same way.

use crate::settings::TICKS_PER_SECOND;

/// Format a weight with a fixed number of decimals.
///
/// Values within rounding distance of zero print as `0.000` rather than
/// `-0.000`.
///
/// # Examples
/// ```
/// use chaos_types::formatting::format_weight;
/// assert_eq!(format_weight(1.25, 3), "1.250");
/// assert_eq!(format_weight(-0.0000001, 3), "0.000");
/// assert_eq!(format_weight(0.5, 1), "0.5");
/// ```
pub fn format_weight(weight: f64, precision: usize) -> String {
    let scale = 10f64.powi(precision as i32);
    let rounded = (weight * scale).round() / scale;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{:.prec$}", rounded, prec = precision)
}

/// Format a probability in `[0, 1]` as a percentage with 2 decimals.
///
/// # Examples
/// ```
/// use chaos_types::formatting::format_probability;
/// assert_eq!(format_probability(0.3), "30.00%");
/// assert_eq!(format_probability(0.0512), "5.12%");
/// ```
pub fn format_probability(p: f64) -> String {
    format!("{:.2}%", p * 100.0)
}

/// Format a share of `count` over `total` as a percentage.
///
/// Returns `"0%"` if total is zero.
///
/// # Examples
/// ```
/// use chaos_types::formatting::format_share;
/// assert_eq!(format_share(3, 10), "30.0%");
/// assert_eq!(format_share(0, 0), "0%");
/// ```
pub fn format_share(count: u64, total: u64) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{:.1}%", count as f64 / total as f64 * 100.0)
}

/// Format a tick count as game time `M:SS`.
///
/// # Examples
/// ```
/// use chaos_types::formatting::format_ticks;
/// assert_eq!(format_ticks(300), "0:15");
/// assert_eq!(format_ticks(2_500), "2:05");
/// assert_eq!(format_ticks(0), "0:00");
/// ```
pub fn format_ticks(ticks: u64) -> String {
    let secs = ticks / u64::from(TICKS_PER_SECOND);
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_weight() {
        assert_eq!(format_weight(0.25, 2), "0.25");
        assert_eq!(format_weight(1.0, 3), "1.000");
        assert_eq!(format_weight(-0.75, 2), "-0.75");
        assert_eq!(format_weight(-0.0001, 2), "0.00");
    }

    #[test]
    fn test_format_probability() {
        assert_eq!(format_probability(1.0), "100.00%");
        assert_eq!(format_probability(0.01), "1.00%");
    }

    #[test]
    fn test_format_share() {
        assert_eq!(format_share(1, 4), "25.0%");
        assert_eq!(format_share(5, 0), "0%");
    }

    #[test]
    fn test_format_ticks() {
        assert_eq!(format_ticks(19), "0:00");
        assert_eq!(format_ticks(20), "0:01");
        assert_eq!(format_ticks(20 * 60), "1:00");
    }
}
