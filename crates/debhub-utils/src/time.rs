use std::time::Duration;

/// Parses a compact duration string such as `30s`, `5m` or `1h30m`.
///
/// Each component is a run of digits followed by one of `s`, `m`, `h` or `d`. Returns `None`
/// for empty input, a dangling number, an unknown unit or on overflow.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use debhub_utils::time::parse_duration;
///
/// assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
/// assert_eq!(parse_duration("soon"), None);
/// ```
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut number: Option<u64> = None;

    for c in input.chars() {
        if let Some(digit) = c.to_digit(10) {
            number = Some(number.unwrap_or(0).checked_mul(10)?.checked_add(digit as u64)?);
            continue;
        }

        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return None,
        };
        total = total.checked_add(number.take()?.checked_mul(unit)?)?;
    }

    if number.is_some() {
        return None;
    }

    Some(Duration::from_secs(total))
}
