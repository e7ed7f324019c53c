use serde::{Deserialize, Serialize};

/// Body for `POST /emails`.
#[derive(Debug, Clone, Serialize)]
pub struct SendEmailRequest {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

/// Resend message tag (name/value pair, used for webhook correlation).
#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

/// Response for a successful send.
#[derive(Debug, Clone, Deserialize)]
pub struct SendEmailResponse {
    pub id: String,
}

/// Error body returned on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub name: Option<String>,
    pub message: String,
}
