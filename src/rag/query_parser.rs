use anyhow::{Context, Result};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::QueryParserConfig;
use crate::rag::types::{Intent, QueryFilters};

/// Best-effort structured extraction from a free-text question.
///
/// Delegates to an external classifier prompted to emit one JSON object.
/// The contract is fail-soft: any failure (disabled, missing key, HTTP
/// error, malformed output) yields the default empty filters, never an
/// error. Retrieval must still work with zero structured filters.
pub struct QueryParser {
    client: Option<reqwest::Client>,
    endpoint: String,
    model: String,
}

impl QueryParser {
    pub fn new(config: &QueryParserConfig) -> Self {
        if !config.enabled {
            return Self::disabled(config);
        }

        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => {
                tracing::warn!(
                    "{} is not set, query parsing disabled",
                    config.api_key_env
                );
                return Self::disabled(config);
            }
        };

        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        let client = HeaderValue::from_str(&auth)
            .ok()
            .and_then(|auth_value| {
                headers.insert(AUTHORIZATION, auth_value);
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.request_timeout_secs))
                    .default_headers(headers)
                    .build()
                    .ok()
            });

        if client.is_none() {
            tracing::warn!("failed to build query parser HTTP client, query parsing disabled");
        }

        Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.endpoint.trim_end_matches('/')
            ),
            model: config.model.clone(),
        }
    }

    fn disabled(config: &QueryParserConfig) -> Self {
        Self {
            client: None,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        }
    }

    /// Parse a user question into structured filters. Never fails; every
    /// internal error degrades to `QueryFilters::default()`.
    pub async fn parse(&self, text: &str) -> QueryFilters {
        let message = text.trim();
        if message.is_empty() {
            return QueryFilters::default();
        }

        let Some(client) = &self.client else {
            return QueryFilters::default();
        };

        match self.extract(client, message).await {
            Ok(filters) => filters,
            Err(e) => {
                tracing::warn!("query parsing failed, using empty filters: {:#}", e);
                QueryFilters::default()
            }
        }
    }

    async fn extract(&self, client: &reqwest::Client, message: &str) -> Result<QueryFilters> {
        let prompt = build_prompt(message);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": 0.0,
            "max_tokens": 256,
            "response_format": {"type": "json_object"},
        });

        let response = client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("classifier request failed")?;

        let status = response.status();
        anyhow::ensure!(status.is_success(), "classifier returned {}", status);

        let parsed: ChatResponse = response
            .json()
            .await
            .context("failed to parse classifier response")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        filters_from_response_text(&content)
    }
}

fn build_prompt(message: &str) -> String {
    format!(
        r#"You are the query-analysis module of a job-search assistant. Read the user question and return EXACTLY ONE JSON object with these fields:

- intent: one of "search_jobs" (the user wants to find or be recommended new jobs), "ask_detail" (the user asks about one specific job), "compare_jobs" (the user compares jobs), "other".
- job_keywords: list of role, industry, or field keywords (e.g. ["IT", "developer"]).
- locations: list of locations, preferring province or city names (e.g. ["Hà Nội"]).
- min_salary_vnd: estimated minimum salary in absolute VND when the question says "from 10tr", "above 15 million", etc.
- max_salary_vnd: estimated maximum salary in absolute VND.
- skills: list of skills or requirements (e.g. ["presentation", "English"]).

Use null for unknown numbers and [] for unknown lists. Convert every salary amount to absolute VND ("10 triệu" -> 10000000). Return ONLY the JSON object, no explanations.

User question:
"{}""#,
        message
    )
}

/// Turn raw classifier output into filters. Tolerates leading or trailing
/// noise around the JSON object and salary values emitted as strings.
pub(crate) fn filters_from_response_text(text: &str) -> Result<QueryFilters> {
    let start = text.find('{');
    let end = text.rfind('}');
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => anyhow::bail!(
            "no JSON object in classifier output: {:?}",
            text.chars().take(200).collect::<String>()
        ),
    };

    let raw: RawFilters = serde_json::from_str(&text[start..=end])
        .context("classifier output is not a filters object")?;

    Ok(QueryFilters {
        intent: raw
            .intent
            .as_deref()
            .map(parse_intent)
            .unwrap_or_default(),
        job_keywords: raw.job_keywords,
        locations: raw.locations,
        min_salary: raw.min_salary.as_ref().and_then(normalize_salary_value),
        max_salary: raw.max_salary.as_ref().and_then(normalize_salary_value),
        skills: raw.skills,
    })
}

fn parse_intent(value: &str) -> Intent {
    match value {
        "search_jobs" => Intent::SearchJobs,
        "ask_detail" => Intent::AskDetail,
        "compare_jobs" => Intent::CompareJobs,
        _ => Intent::Other,
    }
}

/// Normalize a salary value from the classifier to absolute VND. Numbers
/// below 1000 are read as millions ("15" means 15 million); strings go
/// through the free-text parser.
pub(crate) fn normalize_salary_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_f64().and_then(scale_vnd),
        Value::String(text) => parse_salary_text(text),
        _ => None,
    }
}

/// Parse salary free text such as "10tr", "10 triệu", "10m", "10,000,000"
/// into absolute VND.
pub(crate) fn parse_salary_text(text: &str) -> Option<i64> {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    let numeric: String = lowered
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == ' ')
        .collect();
    let suffix = lowered[numeric.len()..].trim().to_string();

    let mut numeric = numeric.trim().replace([',', ' '], "");
    // "10.000.000" uses dots as thousands separators, "10.5" does not
    if numeric.matches('.').count() > 1 {
        numeric = numeric.replace('.', "");
    }
    let amount: f64 = numeric.parse().ok()?;

    let millions = suffix.starts_with("tr")
        || suffix.starts_with("triệu")
        || suffix.starts_with("trieu")
        || suffix.starts_with("m");

    if millions {
        Some((amount * 1_000_000.0) as i64)
    } else {
        scale_vnd(amount)
    }
}

fn scale_vnd(amount: f64) -> Option<i64> {
    if amount <= 0.0 {
        return None;
    }
    if amount < 1000.0 {
        Some((amount * 1_000_000.0) as i64)
    } else {
        Some(amount as i64)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFilters {
    intent: Option<String>,
    job_keywords: Vec<String>,
    locations: Vec<String>,
    #[serde(alias = "min_salary_vnd")]
    min_salary: Option<Value>,
    #[serde(alias = "max_salary_vnd")]
    max_salary: Option<Value>,
    skills: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_salary_text_million_suffixes() {
        assert_eq!(parse_salary_text("10tr"), Some(10_000_000));
        assert_eq!(parse_salary_text("10 triệu"), Some(10_000_000));
        assert_eq!(parse_salary_text("10 trieu"), Some(10_000_000));
        assert_eq!(parse_salary_text("10m"), Some(10_000_000));
        assert_eq!(parse_salary_text("10.5tr"), Some(10_500_000));
    }

    #[test]
    fn test_parse_salary_text_absolute_amounts() {
        assert_eq!(parse_salary_text("10,000,000"), Some(10_000_000));
        assert_eq!(parse_salary_text("10.000.000"), Some(10_000_000));
        assert_eq!(parse_salary_text("18000000"), Some(18_000_000));
    }

    #[test]
    fn test_parse_salary_text_bare_small_number_means_millions() {
        assert_eq!(parse_salary_text("15"), Some(15_000_000));
    }

    #[test]
    fn test_parse_salary_text_garbage() {
        assert_eq!(parse_salary_text(""), None);
        assert_eq!(parse_salary_text("negotiable"), None);
        assert_eq!(parse_salary_text("-5"), None);
    }

    #[test]
    fn test_normalize_salary_value_number_scaling() {
        assert_eq!(
            normalize_salary_value(&serde_json::json!(15)),
            Some(15_000_000)
        );
        assert_eq!(
            normalize_salary_value(&serde_json::json!(15_000_000)),
            Some(15_000_000)
        );
        assert_eq!(normalize_salary_value(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_filters_from_response_text() {
        let text = r#"{"intent": "search_jobs", "job_keywords": ["IT"], "locations": ["Hà Nội"], "min_salary_vnd": 18000000, "max_salary_vnd": null, "skills": ["Python"]}"#;
        let filters = filters_from_response_text(text).unwrap();

        assert_eq!(filters.intent, Intent::SearchJobs);
        assert_eq!(filters.job_keywords, vec!["IT".to_string()]);
        assert_eq!(filters.locations, vec!["Hà Nội".to_string()]);
        assert_eq!(filters.min_salary, Some(18_000_000));
        assert_eq!(filters.max_salary, None);
        assert_eq!(filters.skills, vec!["Python".to_string()]);
    }

    #[test]
    fn test_filters_from_response_text_tolerates_noise() {
        let text = "Here you go:\n```json\n{\"intent\": \"ask_detail\", \"skills\": []}\n```";
        let filters = filters_from_response_text(text).unwrap();
        assert_eq!(filters.intent, Intent::AskDetail);
        assert!(filters.is_empty());
    }

    #[test]
    fn test_filters_from_response_text_missing_keys_default() {
        let filters = filters_from_response_text("{}").unwrap();
        assert_eq!(filters.intent, Intent::Other);
        assert!(filters.is_empty());
    }

    #[test]
    fn test_filters_from_response_text_no_json_is_error() {
        assert!(filters_from_response_text("sorry, I can't").is_err());
    }

    #[test]
    fn test_unknown_intent_falls_back_to_other() {
        let filters =
            filters_from_response_text(r#"{"intent": "buy_groceries"}"#).unwrap();
        assert_eq!(filters.intent, Intent::Other);
    }
}
