//! Duration and byte-size literals as they appear in query range selectors
//! and label filters.

/// Errors from duration or byte-size parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("not a valid duration string: {0:?}")]
    Invalid(String),
}

const UNITS_MS: &[(&str, u64)] = &[
    ("ms", 1),
    ("s", 1_000),
    ("m", 60 * 1_000),
    ("h", 60 * 60 * 1_000),
    ("d", 24 * 60 * 60 * 1_000),
    ("w", 7 * 24 * 60 * 60 * 1_000),
    ("y", 365 * 24 * 60 * 60 * 1_000),
];

/// Parse a compound duration literal (`5m`, `1h30m`, `8869990787ms`) into
/// milliseconds. Units must appear in the literal; a bare number is invalid.
pub fn parse_duration_ms(s: &str) -> Result<u64, DurationError> {
    let invalid = || DurationError::Invalid(s.to_string());
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let letters = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        if letters == 0 {
            return Err(invalid());
        }
        // Longest unit first so "ms" is not read as "m" + trailing "s".
        let unit = &rest[..letters];
        let (matched, factor) = UNITS_MS
            .iter()
            .find(|(u, _)| unit.starts_with(*u) && (*u != "m" || !unit.starts_with("ms")))
            .copied()
            .ok_or_else(invalid)?;
        total = total
            .checked_add(value.checked_mul(factor).ok_or_else(invalid)?)
            .ok_or_else(invalid)?;
        rest = &rest[matched.len()..];
    }
    Ok(total)
}

const BYTE_UNITS: &[&str] = &[
    "b", "B", "kb", "KB", "kib", "KiB", "mb", "MB", "mib", "MiB", "gb", "GB", "gib", "GiB", "tb",
    "TB", "tib", "TiB",
];

/// Whether a literal like `2KB` or `10MiB` is a byte-size value. Log query
/// label filters compare against these; the linter only needs to recognize
/// the shape, not the magnitude.
pub fn is_bytes_literal(s: &str) -> bool {
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }
    BYTE_UNITS.contains(&&s[digits..])
}
