//! Database models

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use serde::{Deserialize, Serialize};

use crate::stats::{HeadToHeadMeeting, RawFormEntry};

/// Master slip lifecycle as driven by the generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlipStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SlipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlipStatus::Pending => "pending",
            SlipStatus::Processing => "processing",
            SlipStatus::Completed => "completed",
            SlipStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SlipStatus::Pending),
            "processing" => Some(SlipStatus::Processing),
            "completed" => Some(SlipStatus::Completed),
            "failed" => Some(SlipStatus::Failed),
            _ => None,
        }
    }
}

/// Engine-facing lifecycle as observed by polling clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Idle,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl EngineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Idle => "idle",
            EngineStatus::Queued => "queued",
            EngineStatus::Processing => "processing",
            EngineStatus::Completed => "completed",
            EngineStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(EngineStatus::Idle),
            "queued" => Some(EngineStatus::Queued),
            "processing" => Some(EngineStatus::Processing),
            "completed" => Some(EngineStatus::Completed),
            "failed" => Some(EngineStatus::Failed),
            _ => None,
        }
    }
}

/// Generator job states; transitions are monotonic and never reopened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Pending and running jobs block a new trigger for the same slip
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

/// Quality grade derived from candidate confidence on completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisQuality {
    Pending,
    Low,
    Medium,
    High,
    Premium,
}

impl AnalysisQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisQuality::Pending => "pending",
            AnalysisQuality::Low => "low",
            AnalysisQuality::Medium => "medium",
            AnalysisQuality::High => "high",
            AnalysisQuality::Premium => "premium",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(AnalysisQuality::Pending),
            "low" => Some(AnalysisQuality::Low),
            "medium" => Some(AnalysisQuality::Medium),
            "high" => Some(AnalysisQuality::High),
            "premium" => Some(AnalysisQuality::Premium),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

macro_rules! text_enum_from_sql {
    ($ty:ty) => {
        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::parse(s).ok_or_else(|| {
                    FromSqlError::Other(format!("unrecognized {}: {}", stringify!($ty), s).into())
                })
            }
        }
    };
}

text_enum_from_sql!(SlipStatus);
text_enum_from_sql!(EngineStatus);
text_enum_from_sql!(JobStatus);
text_enum_from_sql!(AnalysisQuality);
text_enum_from_sql!(RiskLevel);

/// One priced market on a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOdds {
    pub market_type: String,
    pub selection: String,
    pub odds: f64,
}

/// Match record with the raw statistical context attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: i64,
    pub home_team: String,
    pub away_team: String,
    pub league: Option<String>,
    pub kickoff_at: Option<String>,
    pub home_form: Vec<RawFormEntry>,
    pub away_form: Vec<RawFormEntry>,
    pub head_to_head: Vec<HeadToHeadMeeting>,
    pub markets: Vec<MarketOdds>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields accepted when ingesting a match record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMatchRecord {
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub kickoff_at: Option<String>,
    #[serde(default)]
    pub home_form: Vec<RawFormEntry>,
    #[serde(default)]
    pub away_form: Vec<RawFormEntry>,
    #[serde(default)]
    pub head_to_head: Vec<HeadToHeadMeeting>,
    #[serde(default)]
    pub markets: Vec<MarketOdds>,
}

/// Master slip model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterSlip {
    pub id: i64,
    pub stake: f64,
    pub currency: String,
    pub status: SlipStatus,
    pub engine_status: EngineStatus,
    pub analysis_quality: AnalysisQuality,
    pub error_message: Option<String>,
    pub total_odds: f64,
    pub estimated_payout: f64,
    pub alternative_slips_count: i64,
    pub best_alternative_slip_id: Option<i64>,
    pub processing_started_at: Option<String>,
    pub processing_completed_at: Option<String>,
    pub lock_version: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// One selected match on a master slip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlipSelection {
    pub id: i64,
    pub slip_id: i64,
    pub match_id: i64,
    pub market: String,
    pub selection: String,
    pub odds: f64,
    pub analysis: Option<serde_json::Value>,
    pub position: i64,
    pub created_at: String,
}

/// Generator job model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorJob {
    pub id: i64,
    pub job_id: String,
    pub master_slip_id: i64,
    pub strategy: String,
    pub risk_profile: RiskLevel,
    pub status: JobStatus,
    pub progress: i64,
    pub total_slips: i64,
    pub generated_slips: i64,
    pub error_message: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub cancelled_at: Option<String>,
    pub cancelled_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Engine-proposed alternative slip, immutable once stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedSlip {
    pub id: i64,
    pub master_slip_id: i64,
    pub job_id: String,
    pub stake: f64,
    pub total_odds: f64,
    pub possible_return: f64,
    pub risk_level: RiskLevel,
    pub confidence_score: f64,
    pub created_at: String,
    pub legs: Vec<GeneratedSlipLeg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedSlipLeg {
    pub id: i64,
    pub generated_slip_id: i64,
    pub match_id: i64,
    pub market: String,
    pub selection: String,
    pub odds: f64,
}

/// Candidate slip ready for bulk insert after an engine response
#[derive(Debug, Clone)]
pub struct NewGeneratedSlip {
    pub stake: f64,
    pub total_odds: f64,
    pub possible_return: f64,
    pub risk_level: RiskLevel,
    pub confidence_score: f64,
    pub legs: Vec<NewGeneratedSlipLeg>,
}

#[derive(Debug, Clone)]
pub struct NewGeneratedSlipLeg {
    pub match_id: i64,
    pub market: String,
    pub selection: String,
    pub odds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(JobStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(JobStatus::parse("paused"), None);
    }

    #[test]
    fn active_vs_terminal() {
        assert!(JobStatus::Pending.is_active());
        assert!(JobStatus::Running.is_active());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn serde_uses_lowercase() {
        let s = serde_json::to_string(&SlipStatus::Processing).expect("serialize");
        assert_eq!(s, "\"processing\"");
        let q: AnalysisQuality = serde_json::from_str("\"premium\"").expect("deserialize");
        assert_eq!(q, AnalysisQuality::Premium);
    }
}
