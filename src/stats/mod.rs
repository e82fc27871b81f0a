//! Pure statistical derivations.
//!
//! Everything in this module tree is side-effect free: raw match history in,
//! fully-formed snapshot out. Invalid entries are filtered, never fatal.

pub mod form;
pub mod head_to_head;

pub use form::{compute_form, RawFormEntry, TeamFormSnapshot};
pub use head_to_head::{
    aggregate_meetings, parse_form_string, summary_from_counts, to_form_string, HeadToHeadMeeting,
    HeadToHeadSummary,
};

/// Implied probability of a decimal-odds price, rounded to 3 decimals.
/// Odds at or below 1.0 are degenerate and map to certainty.
pub fn implied_probability(odds: f64) -> f64 {
    if odds <= 1.0 {
        1.0
    } else {
        round_to(1.0 / odds, 3)
    }
}

/// Parse an "X-Y" score string. Tolerates whitespace around the dash and
/// leading/trailing text, mirroring the lenient score formats seen in feeds.
/// The first number is always from the owning side's perspective.
pub(crate) fn parse_score(raw: &str) -> Option<(u32, u32)> {
    let bytes = raw.as_bytes();
    let mut i = 0;

    // first digit run
    while i < bytes.len() && !bytes[i].is_ascii_digit() {
        i += 1;
    }
    let start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == start {
        return None;
    }
    let first: u32 = raw[start..i].parse().ok()?;

    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'-' {
        return None;
    }
    i += 1;
    while i < bytes.len() && bytes[i] == b' ' {
        i += 1;
    }

    let start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == start {
        return None;
    }
    let second: u32 = raw[start..i].parse().ok()?;

    Some((first, second))
}

pub(crate) fn round_to(v: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (v * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_parsing_variants() {
        assert_eq!(parse_score("2-1"), Some((2, 1)));
        assert_eq!(parse_score("2 - 1"), Some((2, 1)));
        assert_eq!(parse_score("10-0"), Some((10, 0)));
        assert_eq!(parse_score("won 3-2 aet"), Some((3, 2)));
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("abandoned"), None);
        assert_eq!(parse_score("2:1"), None);
        assert_eq!(parse_score("3-"), None);
    }

    #[test]
    fn implied_probability_bounds() {
        assert_eq!(implied_probability(2.0), 0.5);
        assert_eq!(implied_probability(3.0), 0.333);
        assert_eq!(implied_probability(1.0), 1.0);
        assert_eq!(implied_probability(0.5), 1.0);
        assert_eq!(implied_probability(1.5), 0.667);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(0.33333, 2), 0.33);
        assert_eq!(round_to(0.66666, 4), 0.6667);
        assert_eq!(round_to(5.0, 2), 5.0);
    }
}
