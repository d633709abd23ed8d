//! Lap-time strings.
//!
//! Riders type lap times as `m:ss.mmm`, `m:ss` or plain seconds (`ss.mmm`).
//! Times are kept as text on the session row; parsing only happens when the
//! history view needs to rank them.

/// Longest lap time accepted: anything from one hour up is a typo.
pub const MAX_LAP_MILLIS: u64 = 60 * 60_000;

/// Parse a lap time into milliseconds. Returns `None` for anything that is
/// not a positive time under [`MAX_LAP_MILLIS`].
#[must_use]
pub fn parse_millis(raw: &str) -> Option<u64> {
    let text = raw.trim().replace(',', ".");
    if text.is_empty() {
        return None;
    }

    let (minutes, seconds) = match text.split_once(':') {
        Some((m, s)) => {
            let minutes = m.trim().parse::<u64>().ok()?;
            let seconds = s.trim();
            // `1:5.2` is ambiguous, require two-digit seconds after a colon.
            if seconds.split('.').next().map_or(true, |whole| whole.len() != 2) {
                return None;
            }
            (minutes, seconds.to_owned())
        }
        None => (0, text),
    };

    let (whole, fraction) = match seconds.split_once('.') {
        Some((w, f)) => (w, f),
        None => (seconds.as_str(), ""),
    };
    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > 3 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole_secs = whole.parse::<u64>().ok()?;
    if minutes > 0 && whole_secs >= 60 {
        return None;
    }
    let millis = if fraction.is_empty() { 0 } else { format!("{fraction:0<3}").parse::<u64>().ok()? };

    let total = minutes
        .checked_mul(60_000)?
        .checked_add(whole_secs.checked_mul(1000)?)?
        .checked_add(millis)?;
    (total > 0 && total < MAX_LAP_MILLIS).then_some(total)
}

/// Format milliseconds as `m:ss.mmm`.
#[must_use]
pub fn format_millis(total: u64) -> String {
    let minutes = total / 60_000;
    let seconds = (total % 60_000) / 1000;
    let millis = total % 1000;
    format!("{minutes}:{seconds:02}.{millis:03}")
}

/// Fastest parsable time in a list of lap-time strings.
#[must_use]
pub fn fastest<'a, I>(times: I) -> Option<u64>
where
    I: IntoIterator<Item = &'a str>,
{
    times.into_iter().filter_map(parse_millis).min()
}

#[cfg(test)]
#[path = "laptime_test.rs"]
mod tests;
