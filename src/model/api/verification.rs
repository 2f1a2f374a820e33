//! Request and response bodies of the code request and verify endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::api::otp::ShortCode;

/// Ask for a code to nominate in, or vote in, the event with this slug.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeRequest {
    pub email: String,
    pub slug: String,
}

/// Answer a nomination or withdrawal code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub short_code: ShortCode,
    #[serde(default)]
    pub otp: String,
    /// Nomination only: checked against the email the code was sent to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Answer a voting code. The short code is called a token in this flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteVerifyRequest {
    pub token: ShortCode,
    #[serde(default)]
    pub otp: String,
}

/// Ask for a code to withdraw the nomination holding this withdrawal token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WithdrawalCodeRequest {
    pub token: String,
}

/// Positions to keep. An empty list withdraws the nomination completely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WithdrawalForm {
    pub positions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortCodeResponse {
    pub short_code: ShortCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: ShortCode,
}

/// Sent after a successful verify, alongside the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedResponse {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}
