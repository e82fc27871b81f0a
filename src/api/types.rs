//! REST API types
//!
//! Clients routinely send numeric fields as strings, so the request DTOs
//! accept both through flexible deserializers.

use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a value that can be either a number or a string number
fn deserialize_flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleFloat {
        Float(f64),
        Int(i64),
        Str(String),
    }

    match FlexibleFloat::deserialize(deserializer)? {
        FlexibleFloat::Float(f) => Ok(f),
        FlexibleFloat::Int(i) => Ok(i as f64),
        FlexibleFloat::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn deserialize_optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FlexibleOptFloat {
        Float(f64),
        Int(i64),
        Str(String),
    }

    match Option::<FlexibleOptFloat>::deserialize(deserializer)? {
        None => Ok(None),
        Some(FlexibleOptFloat::Float(f)) => Ok(Some(f)),
        Some(FlexibleOptFloat::Int(i)) => Ok(Some(i as f64)),
        Some(FlexibleOptFloat::Str(s)) if s.is_empty() => Ok(None),
        Some(FlexibleOptFloat::Str(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// ============================================================================
// Response Envelope
// ============================================================================

/// Standard success envelope for CRUD responses. Job endpoints answer with
/// flat DTOs instead, keeping their field names stable for polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success_with_message(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.to_string()),
            data: None,
        }
    }

    pub fn success_with_data(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data: Some(data),
        }
    }
}

/// Empty data marker for message-only responses
#[derive(Debug, Clone, Serialize)]
pub struct Empty {}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSlipRequest {
    #[serde(default, deserialize_with = "deserialize_optional_f64")]
    pub stake: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMatchRequest {
    pub match_id: i64,
    pub market: String,
    pub selection: String,
    #[serde(deserialize_with = "deserialize_flexible_f64")]
    pub odds: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelJobRequest {
    #[serde(default)]
    pub cancelled_by: Option<String>,
}
