// AskBend query API client

use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to send query request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("query request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Clone)]
pub struct QaClient {
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub query: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub result: Value,
}

impl QueryResponse {
    /// Answer text; tolerates servers that send a list of snippets or omit the field.
    pub fn into_answer(self) -> String {
        match self.result {
            Value::String(text) => text,
            Value::Array(items) if items.iter().all(Value::is_string) => {
                warn!(parts = items.len(), "query result is a list, joining");
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("\n\n")
            }
            Value::Null => {
                warn!("query response has no result");
                String::new()
            }
            other => {
                warn!("query result is not a string");
                other.to_string()
            }
        }
    }
}

/// Accepted bodies always yield an answer; one that is not the expected JSON
/// is shown verbatim.
pub fn decode_answer(body: String) -> String {
    match serde_json::from_str::<QueryResponse>(&body) {
        Ok(payload) => payload.into_answer(),
        Err(err) => {
            warn!(error = %err, "query response is not JSON, showing raw body");
            body
        }
    }
}

/// Only these two statuses count as an answer.
pub fn is_accepted(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::CREATED
}

impl QaClient {
    /// A `request_timeout` of 0 keeps the transport default.
    pub fn new(base_url: String, request_timeout: u64) -> Result<Self> {
        let mut builder = Client::builder();
        if request_timeout > 0 {
            builder = builder.timeout(Duration::from_secs(request_timeout));
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { base_url, client })
    }

    pub fn query_url(&self) -> String {
        format!("{}/query", self.base_url)
    }

    pub async fn query(&self, question: &str) -> Result<String, ApiError> {
        let url = self.query_url();
        debug!(%url, chars = question.chars().count(), "sending query");

        let response = self
            .client
            .post(&url)
            .json(&QueryRequest { query: question })
            .send()
            .await?;

        let status = response.status();
        if !is_accepted(status) {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let body = response.text().await?;
        debug!(%status, "query answered");
        Ok(decode_answer(body))
    }
}

/// Anything that can answer a question; the submission flow only sees this.
#[cfg_attr(test, mockall::automock)]
pub trait AnswerSource {
    fn ask(&self, question: String) -> BoxFuture<'static, Result<String, ApiError>>;
}

impl AnswerSource for QaClient {
    fn ask(&self, question: String) -> BoxFuture<'static, Result<String, ApiError>> {
        let client = self.clone();
        async move { client.query(&question).await }.boxed()
    }
}
