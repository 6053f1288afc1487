//! Duration parsing and formatting for ban lengths.

use std::time::Duration;

/// Parse a duration string (e.g., "30s", "10m", "1h", "1d", "2w").
///
/// A bare number is read as seconds, so `0` means "forever" for bans.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(secs) = input.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let unit_start = input.char_indices().last()?.0;
    let (digits, unit) = input.split_at(unit_start);
    let amount: u64 = digits.parse().ok()?;

    let seconds = match unit {
        "s" => amount,
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(3600)?,
        "d" => amount.checked_mul(86400)?,
        "w" => amount.checked_mul(604800)?,
        _ => return None,
    };

    Some(Duration::from_secs(seconds))
}

/// Format a duration with up to two units (e.g., "1 hour 30 min").
pub fn format_duration_full(secs: u64) -> String {
    if secs == 0 {
        "forever".to_string()
    } else if secs < 60 {
        format!("{} sec", secs)
    } else if secs < 3600 {
        format!("{} min", secs / 60)
    } else if secs < 86400 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{} {} {} min", hours, plural(hours, "hour"), mins)
        } else {
            format!("{} {}", hours, plural(hours, "hour"))
        }
    } else {
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        if hours > 0 {
            format!("{} {} {} {}", days, plural(days, "day"), hours, plural(hours, "hour"))
        } else {
            format!("{} {}", days, plural(days, "day"))
        }
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 { unit.to_string() } else { format!("{}s", unit) }
}
