//! Serper (google.serper.dev) web search client.

use crate::corpus::WebSearchProvider;
use crate::types::WebResult;
use comply_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const SERPER_URL: &str = "https://google.serper.dev/search";

/// Serper caps `num` at 10 per request.
const MAX_RESULTS: usize = 10;

const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
    #[serde(default)]
    answer_box: Option<SerperAnswerBox>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerperAnswerBox {
    title: Option<String>,
    link: Option<String>,
    answer: Option<String>,
    snippet: Option<String>,
    date: Option<String>,
}

pub struct SerperClient {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl SerperClient {
    pub fn new(api_key: impl Into<String>, endpoint: Option<&str>) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::WebSearch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.unwrap_or(SERPER_URL).to_string(),
            api_key: api_key.into(),
            client,
        })
    }
}

/// Organic results with a title and link; the answer box only when there
/// are none.
fn process_results(response: SerperResponse, k: usize) -> Vec<WebResult> {
    let mut results: Vec<WebResult> = response
        .organic
        .into_iter()
        .filter_map(|r| {
            Some(WebResult {
                title: r.title?,
                url: r.link?,
                snippet: r.snippet.unwrap_or_default(),
                published_date: r.date,
            })
        })
        .filter(|r| !r.snippet.trim().is_empty())
        .take(k)
        .collect();

    if results.is_empty() {
        if let Some(answer) = response.answer_box {
            let snippet = answer.answer.or(answer.snippet).unwrap_or_default();
            if !snippet.trim().is_empty() {
                results.push(WebResult {
                    title: answer.title.unwrap_or_else(|| "Answer".to_string()),
                    url: answer.link.unwrap_or_default(),
                    snippet,
                    published_date: answer.date,
                });
            }
        }
    }

    results
}

#[async_trait::async_trait]
impl WebSearchProvider for SerperClient {
    fn provider_name(&self) -> &str {
        "serper"
    }

    async fn search(&self, query: &str, k: usize) -> AppResult<Vec<WebResult>> {
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let num = k.min(MAX_RESULTS);
        tracing::debug!(num, "Sending web search request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&SerperRequest { q: query, num })
            .send()
            .await
            .map_err(|e| AppError::WebSearch(format!("Error performing web search: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::WebSearch(format!(
                "Serper API error ({}): {}",
                status, error_text
            )));
        }

        let body: SerperResponse = response
            .json()
            .await
            .map_err(|e| AppError::WebSearch(format!("Failed to parse Serper response: {}", e)))?;

        let results = process_results(body, num);
        tracing::debug!(count = results.len(), "Web search returned results");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organic_results() {
        let raw: SerperResponse = serde_json::from_str(
            r#"{
                "organic": [
                    {"title": "RBI raises CGTMSE cover", "link": "https://rbi.org.in/a", "snippet": "Limit raised to Rs 10 crore", "date": "Mar 12, 2025"},
                    {"title": "No link"},
                    {"title": "Second", "link": "https://pib.gov.in/b", "snippet": "Budget 2025 announcement"}
                ],
                "answerBox": {"answer": "ignored"}
            }"#,
        )
        .unwrap();

        let results = process_results(raw, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].published_date.as_deref(), Some("Mar 12, 2025"));
        assert_eq!(results[1].url, "https://pib.gov.in/b");
    }

    #[test]
    fn test_answer_box_fallback() {
        let raw: SerperResponse = serde_json::from_str(
            r#"{"organic": [], "answerBox": {"title": "GST", "link": "https://gst.gov.in", "snippet": "Threshold is Rs 40 lakh"}}"#,
        )
        .unwrap();

        let results = process_results(raw, 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].snippet, "Threshold is Rs 40 lakh");
    }

    #[test]
    fn test_respects_k() {
        let raw: SerperResponse = serde_json::from_str(
            r#"{"organic": [
                {"title": "a", "link": "https://a", "snippet": "1"},
                {"title": "b", "link": "https://b", "snippet": "2"},
                {"title": "c", "link": "https://c", "snippet": "3"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(process_results(raw, 2).len(), 2);
    }

    #[test]
    fn test_empty_response() {
        assert!(process_results(SerperResponse::default(), 3).is_empty());
    }
}
