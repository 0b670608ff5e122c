//! Fee estimation through an OpenAI-compatible chat completion API.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::config::FeeConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::ingest::parse_amount;

/// System prompt describing how exam-duty fees are computed.
pub const DEFAULT_FEE_PROMPT: &str = r#"You compute exam-duty fees.
Each input item is a pair [sessions, standard]:
- sessions describes how much work was done, e.g. "8场（1.5*8）" means 8 sessions of 1.5 hours, "4场（2+2+2+2）" means 4 sessions of 2 hours, "0.5天" means half a day.
- standard is the fee rule, e.g. "2小时以内150，每增加半小时25元，考务每场另加50" means 150 per session of up to 2 hours, 25 more per extra half hour, plus 50 per session for exam affairs.
Apply the standard to every session and return the total amount in yuan.

Examples:
["8场（1.5*8）","2小时以内150，每增加半小时25元，考务每场另加50"] -> 1600
["4场（2+2+2+2）","2小时以内50，每增加半小时10元"] -> 200
["4场（2+2+2+2）","2小时以内150，每增加半小时25元，考务每场另加50"] -> 800
["4场（2+2+2+2）","2小时以内50，每增加半小时10元,考务每场另加20"] -> 280
["0.5天","650元/天、350元/半天"] -> 350
["2.5天","650元/天、350元/半天"] -> 1650

The input is a JSON array of such pairs. Reply with only a JSON array of numbers, one per pair and in the same order, with no explanation. Use null for a pair you cannot compute."#;

/// One distinct fee question: a sessions description under a fee standard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeeQuery {
    /// Sessions or hours worked.
    pub sessions: String,
    /// Fee standard.
    pub standard: String,
}

/// Errors raised while estimating a batch.
#[derive(Debug, Error)]
pub enum FeeError {
    /// The request did not complete.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The API answered with a non-success status.
    #[error("API error: {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
    /// The reply could not be understood.
    #[error("failed to parse reply: {0}")]
    Parse(String),
    /// The reply had a different number of amounts than queries.
    #[error("expected {expected} amounts, got {actual}")]
    LengthMismatch {
        /// Queries sent.
        expected: usize,
        /// Amounts received.
        actual: usize,
    },
}

impl From<FeeError> for ServiceError {
    fn from(error: FeeError) -> Self {
        ServiceError::ServiceUnavailable {
            service: "fee estimator",
            message: error.to_string(),
        }
    }
}

/// Computes fees for a batch of queries.
#[async_trait]
pub trait FeeEstimator: Send + Sync {
    /// Returns one amount per query, in order; `None` where no amount could be computed.
    async fn estimate_batch(&self, queries: &[FeeQuery]) -> Result<Vec<Option<Decimal>>, FeeError>;
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line, e.g. ```json
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().trim_end_matches("```").trim()
}

fn amount_from(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_amount(&n.to_string()).ok(),
        Value::String(s) => parse_amount(s).ok(),
        _ => None,
    }
}

/// Parses the assistant's reply into one amount per query.
///
/// Accepts a JSON array (optionally inside a Markdown code fence), or a lone
/// number when exactly one query was sent. Entries that are not numbers
/// become `None`.
///
/// # Examples
///
/// ```
/// use exam_data_manager::fee::parse_fee_reply;
/// use rust_decimal::Decimal;
///
/// let amounts = parse_fee_reply("```json\n[1600, null]\n```", 2).unwrap();
/// assert_eq!(amounts, vec![Some(Decimal::from(1600)), None]);
/// assert!(parse_fee_reply("[1, 2, 3]", 2).is_err());
/// ```
pub fn parse_fee_reply(reply: &str, expected: usize) -> Result<Vec<Option<Decimal>>, FeeError> {
    let body = strip_code_fence(reply);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FeeError::Parse(format!("{}: {}", e, body)))?;

    let amounts: Vec<Option<Decimal>> = match &value {
        Value::Array(items) => items.iter().map(amount_from).collect(),
        Value::Number(_) => vec![amount_from(&value)],
        _ => return Err(FeeError::Parse(format!("expected a JSON array, got: {}", body))),
    };
    if amounts.len() != expected {
        return Err(FeeError::LengthMismatch {
            expected,
            actual: amounts.len(),
        });
    }
    Ok(amounts)
}

/// [`FeeEstimator`] backed by `POST {base_url}/chat/completions`.
pub struct ChatFeeEstimator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    prompt: String,
}

impl ChatFeeEstimator {
    /// Creates an estimator.
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        model: String,
        base_url: String,
        prompt: String,
    ) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            prompt,
        }
    }

    /// Builds an estimator from configuration, or `None` without an API key.
    pub fn from_config(config: &FeeConfig) -> ServiceResult<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Some(Self::new(
            client,
            api_key,
            config.model.clone(),
            config.base_url.clone(),
            config
                .prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_FEE_PROMPT.to_string()),
        )))
    }
}

#[async_trait]
impl FeeEstimator for ChatFeeEstimator {
    async fn estimate_batch(&self, queries: &[FeeQuery]) -> Result<Vec<Option<Decimal>>, FeeError> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/chat/completions", self.base_url);
        let pairs: Vec<[&str; 2]> = queries
            .iter()
            .map(|q| [q.sessions.as_str(), q.standard.as_str()])
            .collect();
        let user_content =
            serde_json::to_string(&pairs).map_err(|e| FeeError::Parse(e.to_string()))?;

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.prompt },
                { "role": "user", "content": user_content },
            ],
            "temperature": 0,
            "stream": false,
        });

        debug!(url = %url, queries = queries.len(), "Fee estimation request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let reply: Value = response.json().await?;
        let content = reply["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| FeeError::Parse("missing choices[0].message.content".into()))?;

        parse_fee_reply(content, queries.len())
    }
}
