//! Generative-model strategy over an OpenAI-compatible chat endpoint.
//!
//! The model sees the page's visible text and is asked for a fixed JSON
//! object. Replies are rarely clean: the object may be wrapped in prose or
//! code fences, and reasoning-style models may leave `content` null and put
//! everything in a separate reasoning channel. Parsing therefore tries, in
//! order:
//!
//! 1. the first balanced JSON object in `content`,
//! 2. the first balanced JSON object in the reasoning channel,
//! 3. `key: value` pairs in the reasoning channel.
//!
//! A JSON object only counts when it carries both status keys.

use super::text::visible_text;
use crate::config::ModelConfig;
use crate::error::{ModelError, ScoutResult};
use crate::types::{PartialRecord, ReputationStatus, RobokillerStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

/// Client for the model endpoint.
pub struct ModelClient {
    client: reqwest::Client,
    config: ModelConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// The two output channels of one model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub content: Option<String>,
    pub reasoning: Option<String>,
}

impl ModelClient {
    pub fn new(config: ModelConfig) -> ScoutResult<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }

    /// Ask the model about `html` and parse its answer.
    pub async fn extract(
        &self,
        identifier: Option<&str>,
        html: &str,
    ) -> Result<PartialRecord, ModelError> {
        let text = visible_text(html, self.config.max_text_chars);
        let prompt = build_prompt(identifier, &text);
        let reply = self.complete(&prompt).await?;
        interpret_reply(&reply).ok_or(ModelError::InvalidPayload)
    }

    /// Send one prompt and return both output channels.
    pub async fn complete(&self, prompt: &str) -> Result<ModelReply, ModelError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelError::Unreachable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ModelError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|_| ModelError::InvalidPayload)?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .ok_or(ModelError::InvalidPayload)?
            .message;

        Ok(ModelReply {
            content: message.content.filter(|c| !c.trim().is_empty()),
            reasoning: message
                .reasoning_content
                .or(message.reasoning)
                .filter(|r| !r.trim().is_empty()),
        })
    }
}

fn build_prompt(identifier: Option<&str>, text: &str) -> String {
    let subject = identifier
        .map(|id| format!(" for {id}"))
        .unwrap_or_default();
    format!(
        r#"Extract reputation data from the phone lookup page text{subject}.

TEXT:
{text}

Return ONLY this JSON object, no other text:
{{
    "userReports": <number or null>,
    "reputationStatus": "Positive|Negative|Neutral|Unknown",
    "totalCalls": <number or null>,
    "lastCallDate": "date or null",
    "robokillerStatus": "Allowed|Blocked|Unknown",
    "spamScore": <0-100 or null>,
    "callerName": "string or null",
    "location": "string or null",
    "carrier": "string or null",
    "commentsCount": <number or null>
}}

Find: user reputation (Positive/Negative/Neutral), robokiller status (Allowed/Blocked), total calls, user reports, last call date."#
    )
}

/// Parse a reply, preferring `content` over the reasoning channel.
pub fn interpret_reply(reply: &ModelReply) -> Option<PartialRecord> {
    if let Some(record) = reply.content.as_deref().and_then(parse_json_answer) {
        return Some(record);
    }
    let reasoning = reply.reasoning.as_deref()?;
    parse_json_answer(reasoning).or_else(|| parse_reasoning_fields(reasoning))
}

// ── JSON answers ────────────────────────────────────────────────────────────

/// First balanced JSON object in `text` that carries both status keys.
pub fn parse_json_answer(text: &str) -> Option<PartialRecord> {
    let mut from = 0;
    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        if let Some(end) = balanced_object_end(&text[start..]) {
            if let Ok(Value::Object(map)) = serde_json::from_str(&text[start..start + end]) {
                if map.contains_key("reputationStatus") && map.contains_key("robokillerStatus") {
                    return Some(record_from_json(&map));
                }
            }
        }
        from = start + 1;
    }
    None
}

/// Byte length of the object starting at `text[0] == '{'`, if it closes.
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn record_from_json(map: &serde_json::Map<String, Value>) -> PartialRecord {
    let text = |key: &str| {
        map.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
            .map(str::to_string)
    };
    let count = |key: &str| map.get(key).and_then(json_count);

    PartialRecord {
        reputation_status: map
            .get("reputationStatus")
            .and_then(Value::as_str)
            .and_then(ReputationStatus::parse_loose),
        robokiller_status: map
            .get("robokillerStatus")
            .and_then(Value::as_str)
            .and_then(RobokillerStatus::parse_loose),
        user_reports: count("userReports"),
        total_calls: count("totalCalls"),
        last_call_date: text("lastCallDate"),
        spam_score: count("spamScore").map(|s| s.min(100) as u8),
        caller_name: text("callerName"),
        location: text("location"),
        carrier: text("carrier"),
        comments_count: count("commentsCount"),
    }
}

/// Non-negative integer from a JSON number or numeric string.
fn json_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map(|n| n.min(u64::from(u32::MAX)) as u32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ── Reasoning-channel fields ────────────────────────────────────────────────

static REASONING_REPUTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)reputationStatus["']?[:\s]+["']?(Positive|Negative|Neutral|Unknown)"#)
        .expect("valid regex")
});
static REASONING_ROBOKILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)robokillerStatus["']?[:\s]+["']?(Allowed|Blocked|Unknown)"#)
        .expect("valid regex")
});
static REASONING_TOTAL_CALLS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)totalCalls["']?[:\s]+(\d+)"#).expect("valid regex")
});
static REASONING_USER_REPORTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)userReports["']?[:\s]+(\d+)"#).expect("valid regex")
});
static REASONING_COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)commentsCount["']?[:\s]+(\d+)"#).expect("valid regex")
});
static REASONING_LAST_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)lastCallDate["']?[:\s]+(?:["']([^"']+)["']|((?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4}))"#,
    )
    .expect("valid regex")
});

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn capture_count(re: &Regex, text: &str) -> Option<u32> {
    capture(re, text).and_then(|s| s.parse().ok())
}

/// `key: value` pairs in free text. `None` when nothing was found.
pub fn parse_reasoning_fields(text: &str) -> Option<PartialRecord> {
    let record = PartialRecord {
        reputation_status: capture(&REASONING_REPUTATION, text)
            .and_then(|s| ReputationStatus::parse_loose(&s)),
        robokiller_status: capture(&REASONING_ROBOKILLER, text)
            .and_then(|s| RobokillerStatus::parse_loose(&s)),
        total_calls: capture_count(&REASONING_TOTAL_CALLS, text),
        user_reports: capture_count(&REASONING_USER_REPORTS, text),
        comments_count: capture_count(&REASONING_COMMENTS, text),
        last_call_date: REASONING_LAST_CALL.captures(text).and_then(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .map(|m| m.as_str().trim().to_string())
        }),
        ..Default::default()
    };

    (!record.is_empty()).then_some(record)
}
