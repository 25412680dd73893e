use std::time::Duration;

/// Parse a look-back window such as `30s`, `1m` or `10m`.
///
/// Only a positive integer followed by one of `s`, `m`, `h` is accepted.
pub fn parse_rate_interval(q: &str) -> Option<Duration> {
    let q = q.trim();
    let (digits, unit_secs) = if let Some(v) = q.strip_suffix('s') {
        (v, 1)
    } else if let Some(v) = q.strip_suffix('m') {
        (v, 60)
    } else if let Some(v) = q.strip_suffix('h') {
        (v, 3600)
    } else {
        return None;
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u64 = digits.parse().ok()?;
    if n == 0 {
        return None;
    }
    let secs = n.checked_mul(unit_secs)?;
    Some(Duration::from_secs(secs))
}

/// Response codes starting with `4` or `5` are errors; anything else
/// (including gRPC status names) only counts toward totals.
pub fn is_error_code(code: &str) -> bool {
    matches!(code.as_bytes().first(), Some(b'4') | Some(b'5'))
}

/// Parse a rate sample value. Rates are never negative, so negative,
/// NaN and infinite values are rejected.
pub fn parse_sample_value(v: &str) -> Option<f64> {
    let v: f64 = v.trim().parse().ok()?;
    if v.is_finite() && v >= 0.0 {
        Some(v)
    } else {
        None
    }
}
