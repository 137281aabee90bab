//! RFC 3339 timestamp helpers. Entries keep their timestamp as the stored
//! string; the pipeline parses it at the boundary.

use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

pub fn parse_ts(ts: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339).ok()
}

/// Format as UTC RFC 3339 with whole seconds, so stored strings sort
/// lexicographically in time order.
pub fn format_ts(dt: OffsetDateTime) -> String {
    let dt = dt.to_offset(UtcOffset::UTC);
    let dt = dt.replace_nanosecond(0).unwrap_or(dt);
    dt.format(&Rfc3339).unwrap_or_default()
}

pub fn now_rfc3339() -> String {
    format_ts(OffsetDateTime::now_utc())
}

/// Normalize a caller-supplied timestamp to the stored form. Returns `None`
/// when it does not parse.
pub fn normalize_ts(ts: &str) -> Option<String> {
    parse_ts(ts).map(format_ts)
}

/// Signed hours from `earlier` to `later`.
pub fn hours_between(earlier: OffsetDateTime, later: OffsetDateTime) -> f64 {
    (later - earlier).as_seconds_f64() / 3600.0
}
