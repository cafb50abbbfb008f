//! Request and response types for the `generateContent` endpoint.

use crate::error::{GenerateError, GenerateResult};
use serde::{Deserialize, Serialize};

/// One piece of content in a conversation, as the API expects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// "user" or "model".
    pub role: String,
    /// Content parts; this client only produces text parts.
    pub parts: Vec<Part>,
}

impl Content {
    /// A user-authored content entry.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new("user", text)
    }

    /// A model-authored content entry.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new("model", text)
    }

    fn new(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// A text part of a content entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    /// The text payload.
    pub text: String,
}

/// System instruction attached to every request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInstruction {
    /// Instruction parts.
    pub parts: Vec<Part>,
}

impl SystemInstruction {
    /// Build a single-part instruction.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// Body of a `generateContent` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Optional persona / behavior instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    /// Full conversation so far, ending with the new user query.
    pub contents: Vec<Content>,
}

/// Body of a `generateContent` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Generated candidates, best first. Absent when the prompt was blocked.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Feedback about the prompt itself, including block decisions.
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

/// One generated candidate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Generated content; may be absent when generation was cut short.
    #[serde(default)]
    pub content: Option<CandidateContent>,
    /// Why generation stopped (e.g. "STOP", "SAFETY", "MAX_TOKENS").
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Content of a candidate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateContent {
    /// Generated parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Prompt feedback, carrying the block decision when the service refused.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Reason code when the prompt was blocked (e.g. "SAFETY").
    #[serde(default)]
    pub block_reason: Option<String>,
}

/// Error envelope the API returns on non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// The error payload.
    pub error: ApiErrorBody,
}

/// Error payload fields we care about.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
}

/// Interpreted outcome of a generation response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The model produced text.
    Text(String),
    /// The service refused for a policy reason; carries the reason code.
    Blocked(String),
}

impl GenerateContentResponse {
    /// Interpret the response: a prompt-level block wins, then the first
    /// candidate's text; a candidate stopped for "SAFETY" without text also
    /// counts as blocked.
    ///
    /// # Errors
    ///
    /// [`GenerateError::InvalidResponse`] when the payload carries neither
    /// text nor a block decision.
    pub fn into_reply(self) -> GenerateResult<Reply> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Ok(Reply::Blocked(reason));
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(GenerateError::InvalidResponse(
                "response contained no candidates".into(),
            ));
        };

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return match candidate.finish_reason.as_deref() {
                Some("SAFETY") => Ok(Reply::Blocked("SAFETY".into())),
                _ => Err(GenerateError::InvalidResponse(
                    "candidate contained no text".into(),
                )),
            };
        }
        Ok(Reply::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateContentRequest {
            system_instruction: Some(SystemInstruction::new("be helpful")),
            contents: vec![Content::user("hi"), Content::model("hello")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be helpful");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
    }

    #[test]
    fn test_request_omits_absent_system_instruction() {
        let request = GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content::user("hi")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_successful_response_yields_text() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"parts": [{"text": "Hello "}, {"text": "there"}], "role": "model"},
                    "finishReason": "STOP"
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(
            response.into_reply().unwrap(),
            Reply::Text("Hello there".into())
        );
    }

    #[test]
    fn test_prompt_block_yields_blocked() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#,
        )
        .unwrap();
        assert_eq!(response.into_reply().unwrap(), Reply::Blocked("SAFETY".into()));
    }

    #[test]
    fn test_safety_finish_without_text_yields_blocked() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"finishReason": "SAFETY"}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_reply().unwrap(), Reply::Blocked("SAFETY".into()));
    }

    #[test]
    fn test_empty_response_is_invalid() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            response.into_reply(),
            Err(GenerateError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_error_envelope_parses() {
        let parsed: ApiErrorResponse = serde_json::from_str(
            r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.error.message, "API key not valid");
    }
}
