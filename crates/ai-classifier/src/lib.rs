pub mod prompt;

pub use prompt::{build_prompt, MAX_PROMPT_STOCKS};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use theme_core::{is_noise, ClassifierError, NewsHeadline, StockSnapshot, ThemeCandidate, ThemeClassifier};

/// Configuration for the LLM completion endpoint
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl ClassifierConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            model: "gemini-2.0-flash".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

#[derive(Clone)]
pub struct LlmThemeClassifier {
    client: reqwest::Client,
    config: ClassifierConfig,
}

impl LlmThemeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    async fn complete(&self, prompt: String) -> Result<String, ClassifierError> {
        let request = CompletionRequest {
            model: &self.config.model,
            prompt,
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::from_message(
                Some(status.as_u16()),
                format!("Status {}: {}", status, body),
            ));
        }

        let completion = response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;
        Ok(completion.text)
    }
}

#[async_trait]
impl ThemeClassifier for LlmThemeClassifier {
    async fn classify(
        &self,
        headlines: &[NewsHeadline],
        hot_pool: &[StockSnapshot],
    ) -> Result<Vec<ThemeCandidate>, ClassifierError> {
        let prompt = build_prompt(headlines, hot_pool);
        tracing::debug!(
            "Sending classification request ({} headlines, {} stocks)",
            headlines.len(),
            hot_pool.len().min(MAX_PROMPT_STOCKS)
        );

        let text = self.complete(prompt).await?;
        let candidates = parse_candidates(&text)?;
        tracing::info!("AI analysis complete: {} themes", candidates.len());
        Ok(candidates)
    }
}

/// Drop markdown code fences around a JSON payload.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Parse the model's JSON array, cleaning names and dropping noise and
/// repeated stocks. A stock keeps its first theme only.
pub fn parse_candidates(text: &str) -> Result<Vec<ThemeCandidate>, ClassifierError> {
    let json = strip_code_fences(text);
    let raw: Vec<ThemeCandidate> = serde_json::from_str(json).or_else(|first_err| {
        // Tolerate prose around the array
        match (json.find('['), json.rfind(']')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&json[start..=end])
                .map_err(|e| ClassifierError::InvalidResponse(e.to_string())),
            _ => Err(ClassifierError::InvalidResponse(first_err.to_string())),
        }
    })?;

    let mut used: Vec<String> = Vec::new();
    let candidates = raw
        .into_iter()
        .filter_map(|c| {
            let name = c.name.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let stocks: Vec<String> = c
                .stocks
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !is_noise(s) && !used.contains(s))
                .collect();
            used.extend(stocks.iter().cloned());
            Some(ThemeCandidate {
                name,
                headline: c.headline.map(|h| h.trim().to_string()).filter(|h| !h.is_empty()),
                stocks,
            })
        })
        .collect();

    Ok(candidates)
}
