//! Team form statistics engine.
//!
//! Input is a team's raw result sequence, most-recent-first. Output is a
//! complete [`TeamFormSnapshot`]: counts, goal aggregates, a weighted form
//! rating on a 0-10 scale, a momentum score in [-1, 1], and outcome
//! probabilities. The computation is a full recompute every time; snapshots
//! are never patched incrementally.

use serde::{Deserialize, Serialize};

use super::{parse_score, round_to};

/// At most this many raw entries are consumed, most recent first
pub const FORM_WINDOW: usize = 10;

/// The most recent results carry extra weight in the rating
const RECENT_SPAN: usize = 3;
const RECENT_WEIGHT: f64 = 1.5;
const BASE_WEIGHT: f64 = 1.0;

/// Outcome scores on the 0-10 rating scale
const WIN_SCORE: f64 = 10.0;
const DRAW_SCORE: f64 = 5.0;
const LOSS_SCORE: f64 = 0.0;

/// Rating reported when no valid results exist
const NEUTRAL_RATING: f64 = 5.0;

/// Momentum compares the last three results against the three before them,
/// so it needs six valid entries; fewer reports zero swing.
const MOMENTUM_SPAN: usize = 3;
const MOMENTUM_MIN_MATCHES: usize = 2 * MOMENTUM_SPAN;
/// Maximum points swing across a three-match window (3 wins vs 3 losses)
const MOMENTUM_NORMALIZER: f64 = 9.0;

/// How strongly momentum tilts the win probability
const MOMENTUM_PROB_WEIGHT: f64 = 0.2;

/// Probability split reported with no history
const DEFAULT_WIN_PROB: f64 = 0.33;
const DEFAULT_DRAW_PROB: f64 = 0.33;
const DEFAULT_LOSS_PROB: f64 = 0.34;

/// One raw historical result from the team's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFormEntry {
    pub opponent: String,
    /// "X-Y" score string, goals for this team first
    pub result: String,
    /// "W", "D" or "L"
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    fn parse(raw: &str) -> Option<Outcome> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "W" => Some(Outcome::Win),
            "D" => Some(Outcome::Draw),
            "L" => Some(Outcome::Loss),
            _ => None,
        }
    }

    fn rating_score(self) -> f64 {
        match self {
            Outcome::Win => WIN_SCORE,
            Outcome::Draw => DRAW_SCORE,
            Outcome::Loss => LOSS_SCORE,
        }
    }

    /// League points: W=3, D=1, L=0
    fn points(self) -> u32 {
        match self {
            Outcome::Win => 3,
            Outcome::Draw => 1,
            Outcome::Loss => 0,
        }
    }

    fn letter(self) -> char {
        match self {
            Outcome::Win => 'W',
            Outcome::Draw => 'D',
            Outcome::Loss => 'L',
        }
    }
}

/// A raw entry that survived validation.
struct ValidResult {
    outcome: Outcome,
    goals_for: u32,
    goals_against: u32,
}

/// Derived statistics for one team, recomputed from the raw sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamFormSnapshot {
    pub matches_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_scored: u32,
    pub goals_conceded: u32,
    pub avg_goals_scored: f64,
    pub avg_goals_conceded: f64,
    pub clean_sheets: u32,
    pub failed_to_score: u32,
    /// W/D/L characters, most-recent-first
    pub form_string: String,
    pub form_rating: f64,
    pub form_momentum: f64,
    pub win_probability: f64,
    pub draw_probability: f64,
    pub loss_probability: f64,
}

/// Compute a full snapshot from a raw result sequence (most-recent-first).
///
/// Entries with an empty opponent, an unparseable score or an outcome other
/// than W/D/L are dropped before anything is counted; the remaining valid
/// entries define `matches_played`. Never fails: an all-invalid or empty
/// sequence yields the neutral snapshot.
pub fn compute_form(raw: &[RawFormEntry]) -> TeamFormSnapshot {
    let valid: Vec<ValidResult> = raw
        .iter()
        .take(FORM_WINDOW)
        .filter_map(validate_entry)
        .collect();

    let played = valid.len() as u32;
    let mut wins = 0u32;
    let mut draws = 0u32;
    let mut losses = 0u32;
    let mut goals_scored = 0u32;
    let mut goals_conceded = 0u32;
    let mut clean_sheets = 0u32;
    let mut failed_to_score = 0u32;
    let mut form_string = String::with_capacity(valid.len());

    for r in &valid {
        match r.outcome {
            Outcome::Win => wins += 1,
            Outcome::Draw => draws += 1,
            Outcome::Loss => losses += 1,
        }
        goals_scored += r.goals_for;
        goals_conceded += r.goals_against;
        if r.goals_against == 0 {
            clean_sheets += 1;
        }
        if r.goals_for == 0 {
            failed_to_score += 1;
        }
        form_string.push(r.outcome.letter());
    }

    let (avg_goals_scored, avg_goals_conceded) = if played > 0 {
        (
            round_to(goals_scored as f64 / played as f64, 2),
            round_to(goals_conceded as f64 / played as f64, 2),
        )
    } else {
        (0.0, 0.0)
    };

    let form_momentum = momentum(&valid);
    let (win_probability, draw_probability, loss_probability) =
        outcome_probabilities(wins, draws, losses, played, form_momentum);

    TeamFormSnapshot {
        matches_played: played,
        wins,
        draws,
        losses,
        goals_scored,
        goals_conceded,
        avg_goals_scored,
        avg_goals_conceded,
        clean_sheets,
        failed_to_score,
        form_string,
        form_rating: weighted_rating(&valid),
        form_momentum,
        win_probability,
        draw_probability,
        loss_probability,
    }
}

fn validate_entry(entry: &RawFormEntry) -> Option<ValidResult> {
    if entry.opponent.trim().is_empty() {
        return None;
    }
    let outcome = Outcome::parse(&entry.outcome)?;
    let (goals_for, goals_against) = parse_score(&entry.result)?;
    Some(ValidResult {
        outcome,
        goals_for,
        goals_against,
    })
}

/// Recency-weighted rating over the valid window: the three most recent
/// results weigh 1.5, the rest 1.0.
fn weighted_rating(valid: &[ValidResult]) -> f64 {
    if valid.is_empty() {
        return NEUTRAL_RATING;
    }
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    for (i, r) in valid.iter().enumerate() {
        let w = if i < RECENT_SPAN {
            RECENT_WEIGHT
        } else {
            BASE_WEIGHT
        };
        weighted += r.outcome.rating_score() * w;
        weight_sum += w;
    }
    round_to(weighted / weight_sum, 2)
}

/// Points swing of the last three results over the three before them,
/// normalized by the maximum possible swing and clamped to [-1, 1].
fn momentum(valid: &[ValidResult]) -> f64 {
    if valid.len() < MOMENTUM_MIN_MATCHES {
        return 0.0;
    }
    let recent: u32 = valid[..MOMENTUM_SPAN]
        .iter()
        .map(|r| r.outcome.points())
        .sum();
    let previous: u32 = valid[MOMENTUM_SPAN..MOMENTUM_MIN_MATCHES]
        .iter()
        .map(|r| r.outcome.points())
        .sum();
    let swing = (recent as f64 - previous as f64) / MOMENTUM_NORMALIZER;
    round_to(swing.clamp(-1.0, 1.0), 2)
}

/// Historical outcome rates with the win rate tilted by momentum, then
/// renormalized so the three probabilities sum to one.
fn outcome_probabilities(
    wins: u32,
    draws: u32,
    losses: u32,
    played: u32,
    momentum: f64,
) -> (f64, f64, f64) {
    if played == 0 {
        return (DEFAULT_WIN_PROB, DEFAULT_DRAW_PROB, DEFAULT_LOSS_PROB);
    }
    let played = played as f64;
    let base_win = wins as f64 / played;
    let base_draw = draws as f64 / played;
    let base_loss = losses as f64 / played;

    let adjusted_win = base_win * (1.0 + momentum * MOMENTUM_PROB_WEIGHT);
    let total = adjusted_win + base_draw + base_loss;
    if total <= 0.0 {
        return (DEFAULT_WIN_PROB, DEFAULT_DRAW_PROB, DEFAULT_LOSS_PROB);
    }

    // Rounding residue lands in the loss slot so the three always sum to 1.
    let win = round_to(adjusted_win / total, 4);
    let draw = round_to(base_draw / total, 4);
    let loss = round_to((1.0 - win - draw).max(0.0), 4);
    (win, draw, loss)
}
