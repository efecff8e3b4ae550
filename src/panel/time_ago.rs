//! Human readable relative time labels ("5 minutes ago", "about 2 hours ago").

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 1440;
const MINUTES_PER_MONTH: i64 = 43200;

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

fn rounded_div(value: i64, divisor: i64) -> i64 {
    (value + divisor / 2) / divisor
}

fn distance(minutes: i64) -> String {
    match minutes {
        0 => "less than a minute".to_string(),
        m if m < 45 => plural(m, "minute"),
        m if m < 90 => "about 1 hour".to_string(),
        m if m < MINUTES_PER_DAY => format!("about {}", plural(rounded_div(m, MINUTES_PER_HOUR), "hour")),
        m if m < 2520 => "1 day".to_string(),
        m if m < MINUTES_PER_MONTH => plural(rounded_div(m, MINUTES_PER_DAY), "day"),
        m if m < 2 * MINUTES_PER_MONTH => {
            format!("about {}", plural(rounded_div(m, MINUTES_PER_MONTH), "month"))
        }
        m => {
            let months = m / MINUTES_PER_MONTH;
            if months < 12 {
                return plural(months, "month");
            }
            let years = months / 12;
            match months % 12 {
                0..=2 => format!("about {}", plural(years, "year")),
                3..=8 => format!("over {}", plural(years, "year")),
                _ => format!("almost {}", plural(years + 1, "year")),
            }
        }
    }
}

/// Label for a timestamp relative to `now`, both in milliseconds.
/// Timestamps in the future read as "just now".
pub fn time_ago(timestamp: i64, now: i64) -> String {
    let elapsed_ms = now.saturating_sub(timestamp);
    if elapsed_ms < 0 {
        return "just now".to_string();
    }
    let seconds = elapsed_ms / 1000;
    let minutes = rounded_div(seconds, 60);
    format!("{} ago", distance(minutes))
}
