//! Parsing of human-written sizes, durations, and resolution labels.

use crate::error::{Error, Result};

/// Resolution label to frame height.
const RESOLUTION_HEIGHTS: [(&str, u32); 7] = [
    ("480p", 480),
    ("720p", 720),
    ("1080p", 1080),
    ("1440p", 1440),
    ("2160p", 2160),
    ("4k", 2160),
    ("8k", 4320),
];

/// Split `"1.5GB"` into `("1.5", "GB")`.
fn split_number(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    s.split_at(end)
}

fn parse_number(field: &str, input: &str, digits: &str) -> Result<f64> {
    if digits.is_empty() || digits.matches('.').count() > 1 {
        return Err(Error::invalid_value(
            field,
            format!("'{}' does not start with a number", input),
        ));
    }
    digits
        .parse::<f64>()
        .map_err(|e| Error::invalid_value(field, format!("'{}': {}", input, e)))
}

/// Parse a file size such as `500MB`, `1.5G`, `192k`, or `1024` (bytes).
///
/// Units are binary multiples and case-insensitive; `B`, `iB` suffixes are
/// optional (`1G`, `1GB`, `1GiB` are equal).
pub fn parse_file_size(input: &str) -> Result<u64> {
    let s = input.trim();
    let (digits, unit) = split_number(s);
    let value = parse_number("size", input, digits)?;

    let multiplier: u64 = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1 << 10,
        "m" | "mb" | "mib" => 1 << 20,
        "g" | "gb" | "gib" => 1 << 30,
        "t" | "tb" | "tib" => 1 << 40,
        other => {
            return Err(Error::invalid_value(
                "size",
                format!("unknown unit '{}' in '{}'", other, input),
            ))
        }
    };

    Ok((value * multiplier as f64).round() as u64)
}

/// Parse a duration in seconds from `90`, `90s`, `30m`, `45min`, `2h`, or
/// compound forms like `1h30m`.
pub fn parse_duration(input: &str) -> Result<f64> {
    let s = input.trim();
    if s.is_empty() {
        return Err(Error::invalid_value("duration", "empty duration"));
    }

    let (digits, rest) = split_number(s);
    if rest.is_empty() {
        return parse_number("duration", input, digits);
    }

    let mut total = 0.0;
    let mut remaining = s;
    while !remaining.is_empty() {
        let (digits, tail) = split_number(remaining);
        let value = parse_number("duration", input, digits)?;
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let factor = match unit.to_ascii_lowercase().as_str() {
            "h" | "hr" | "hrs" => 3600.0,
            "m" | "min" | "mins" => 60.0,
            "s" | "sec" | "secs" => 1.0,
            other => {
                return Err(Error::invalid_value(
                    "duration",
                    format!("unknown unit '{}' in '{}'", other, input),
                ))
            }
        };
        total += value * factor;
        remaining = next;
    }

    Ok(total)
}

/// Height in pixels for a resolution label (`1080p`, `4k`), case-insensitive.
pub fn resolution_height(label: &str) -> Option<u32> {
    let label = label.trim().to_ascii_lowercase();
    RESOLUTION_HEIGHTS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, height)| *height)
}

/// Resolution class of a frame height (`1000` -> `720p`).
pub fn resolution_label(height: u32) -> &'static str {
    match height {
        h if h >= 2160 => "2160p",
        h if h >= 1440 => "1440p",
        h if h >= 1080 => "1080p",
        h if h >= 720 => "720p",
        _ => "480p",
    }
}

/// Render a fraction as a whole percentage (`0.8` -> `80%`).
pub fn format_percentage(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}
