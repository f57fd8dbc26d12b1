//! `messageTimestamp` handling: microsecond-precision UTC ISO-8601 strings,
//! chosen (per the teacher's `records_write.rs` descriptor) so that
//! "newest wins" ordering is a plain lexicographic string comparison.
use chrono::{DateTime, SecondsFormat, Utc};

use super::Error;

/// The current instant, formatted the way every `messageTimestamp` in this
/// crate is formatted: `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Confirms `s` parses as UTC and re-serializes to exactly the same string,
/// which rules out non-UTC offsets, missing/short fractional digits, and
/// anything else that would break lexicographic ordering against other
/// timestamps in this crate.
pub fn validate(s: &str) -> Result<(), Error> {
    let parsed: DateTime<Utc> = s
        .parse::<DateTime<Utc>>()
        .map_err(|_| Error::TimestampInvalid(s.to_string()))?;
    let canonical = parsed.to_rfc3339_opts(SecondsFormat::Micros, true);
    if canonical == s {
        Ok(())
    } else {
        Err(Error::TimestampInvalid(s.to_string()))
    }
}

/// "Newest wins" ordering is a lexicographic compare over the canonical
/// string form; no parsing is needed on the hot path.
pub fn cmp(a: &str, b: &str) -> std::cmp::Ordering {
    a.cmp(b)
}
