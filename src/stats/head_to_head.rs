//! Head-to-head history aggregation.
//!
//! Summarizes past meetings between two specific teams into per-side win
//! counts, percentages and goal aggregates. The counts also round-trip
//! through the compact `"home-draws-away"` form string used in stored
//! records and payloads.

use serde::{Deserialize, Serialize};

use super::{parse_score, round_to};

/// At most this many meetings are consumed, most recent first
pub const H2H_WINDOW: usize = 10;

/// One past meeting between the two teams, from the home side's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHeadMeeting {
    pub date: String,
    /// "H" (home win), "A" (away win) or "D" (draw)
    pub result: String,
    /// "X-Y" score, home goals first
    pub score: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MeetingResult {
    HomeWin,
    AwayWin,
    Draw,
}

impl MeetingResult {
    fn parse(raw: &str) -> Option<MeetingResult> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "H" => Some(MeetingResult::HomeWin),
            "A" => Some(MeetingResult::AwayWin),
            "D" => Some(MeetingResult::Draw),
            _ => None,
        }
    }
}

/// Aggregated head-to-head record for a team pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHeadSummary {
    pub total_meetings: u32,
    pub home_wins: u32,
    pub away_wins: u32,
    pub draws: u32,
    pub home_win_percentage: f64,
    pub away_win_percentage: f64,
    pub draw_percentage: f64,
    pub home_goals: u32,
    pub away_goals: u32,
    pub avg_goals_per_match: f64,
    pub home_dominant: bool,
    pub away_dominant: bool,
    /// `"{home_wins}-{draws}-{away_wins}"`
    pub form_string: String,
    pub form_readable: String,
    /// Valid meetings kept for display, most-recent-first
    pub last_meetings: Vec<HeadToHeadMeeting>,
}

impl HeadToHeadSummary {
    /// The most recent valid meeting, if any.
    pub fn last_meeting(&self) -> Option<&HeadToHeadMeeting> {
        self.last_meetings.first()
    }
}

/// Aggregate a meeting history (most-recent-first) into a summary.
///
/// Meetings whose result is not H/A/D are dropped. Goals accumulate only
/// from parseable scores; an unparseable score does not invalidate the
/// meeting's result count.
pub fn aggregate_meetings(meetings: &[HeadToHeadMeeting]) -> HeadToHeadSummary {
    let mut home_wins = 0u32;
    let mut away_wins = 0u32;
    let mut draws = 0u32;
    let mut home_goals = 0u32;
    let mut away_goals = 0u32;
    let mut kept = Vec::new();

    for meeting in meetings.iter().take(H2H_WINDOW) {
        let Some(result) = MeetingResult::parse(&meeting.result) else {
            continue;
        };
        match result {
            MeetingResult::HomeWin => home_wins += 1,
            MeetingResult::AwayWin => away_wins += 1,
            MeetingResult::Draw => draws += 1,
        }
        if let Some((h, a)) = parse_score(&meeting.score) {
            home_goals += h;
            away_goals += a;
        }
        kept.push(meeting.clone());
    }

    let total = home_wins + away_wins + draws;
    summary_from_parts(home_wins, draws, away_wins, home_goals, away_goals, total, kept)
}

/// Rebuild a summary from bare counts, as stored records carry them.
pub fn summary_from_counts(home_wins: u32, draws: u32, away_wins: u32) -> HeadToHeadSummary {
    let total = home_wins + draws + away_wins;
    summary_from_parts(home_wins, draws, away_wins, 0, 0, total, Vec::new())
}

fn summary_from_parts(
    home_wins: u32,
    draws: u32,
    away_wins: u32,
    home_goals: u32,
    away_goals: u32,
    total: u32,
    last_meetings: Vec<HeadToHeadMeeting>,
) -> HeadToHeadSummary {
    let percentage = |count: u32| {
        if total == 0 {
            0.0
        } else {
            round_to(count as f64 / total as f64 * 100.0, 1)
        }
    };

    let avg_goals_per_match = if total == 0 {
        0.0
    } else {
        round_to((home_goals + away_goals) as f64 / total as f64, 2)
    };

    HeadToHeadSummary {
        total_meetings: total,
        home_wins,
        away_wins,
        draws,
        home_win_percentage: percentage(home_wins),
        away_win_percentage: percentage(away_wins),
        draw_percentage: percentage(draws),
        home_goals,
        away_goals,
        avg_goals_per_match,
        home_dominant: home_wins > away_wins,
        away_dominant: away_wins > home_wins,
        form_string: to_form_string(home_wins, draws, away_wins),
        form_readable: format!(
            "{} Home Wins, {} Draws, {} Away Wins",
            home_wins, draws, away_wins
        ),
        last_meetings,
    }
}

/// Compact `"home-draws-away"` encoding of the counts.
pub fn to_form_string(home_wins: u32, draws: u32, away_wins: u32) -> String {
    format!("{}-{}-{}", home_wins, draws, away_wins)
}

/// Strict inverse of [`to_form_string`]: exactly three dash-separated
/// unsigned integers, nothing else.
pub fn parse_form_string(s: &str) -> Option<(u32, u32, u32)> {
    let mut parts = s.split('-');
    let home_wins = parse_count(parts.next()?)?;
    let draws = parse_count(parts.next()?)?;
    let away_wins = parse_count(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((home_wins, draws, away_wins))
}

fn parse_count(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
