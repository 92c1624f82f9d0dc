use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use solguard::config::ExternalConfig;
use solguard::external::{
    parse_response, ExternalAnalysis, ExternalAnalyzer, ExternalError, ExternalRequest,
};

const SYSTEM_PROMPT: &str = "You are a world-class smart contract security auditor with \
expertise in finding critical vulnerabilities that have caused millions in losses. Provide \
detailed, actionable security analysis. Respond with a single JSON object only.";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Client for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiAnalyzer {
    /// Build from config, reading the API key from the configured environment variable.
    pub fn from_config(config: &ExternalConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn build_prompt(request: &ExternalRequest) -> String {
        format!(
            r#"Analyze this Solidity contract for vulnerabilities, security issues and fixes.

CONTRACT FILE: {file}
CONTRACT NAME: {name}
FUNCTIONS: {functions}

```solidity
{source}
```

Respond with JSON in this shape:
{{
  "vulnerabilities": [
    {{
      "title": "Vulnerability Title",
      "severity": "CRITICAL|HIGH|MEDIUM|LOW|INFO",
      "type": "Reentrancy|Access Control|Integer Overflow|Unchecked External Call|Price Manipulation|Logic Error|Gas Issues",
      "description": "Detailed description",
      "location": {{"startLine": 10, "endLine": 15, "function": "function_name"}},
      "impact": "What could happen if exploited",
      "likelihood": "How likely is exploitation",
      "riskScore": 8.5,
      "recommendation": "How to fix this issue",
      "potentialLoss": "Estimated financial impact"
    }}
  ],
  "insights": [
    {{"category": "Security|Performance|Best Practice", "insight": "...", "confidence": 0.9, "actionable": true}}
  ],
  "fixes": [
    {{"description": "...", "originalCode": "...", "fixedCode": "...", "explanation": "...", "riskReduction": "..."}}
  ]
}}

Give exact line numbers. Focus on exploitable issues that could cause financial loss."#,
            file = request.file_name,
            name = request.topology.name,
            functions = request
                .topology
                .functions
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            source = request.source,
        )
    }
}

#[async_trait]
impl ExternalAnalyzer for OpenAiAnalyzer {
    fn name(&self) -> &str {
        "openai"
    }

    async fn analyze(&self, request: &ExternalRequest) -> Result<ExternalAnalysis, ExternalError> {
        let prompt = Self::build_prompt(request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, endpoint = %self.endpoint, "sending chat completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExternalError::Unavailable(format!("request timed out: {}", e))
                } else {
                    ExternalError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ExternalError::Http(format!("{}: {}", status, text)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExternalError::InvalidResponse(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExternalError::InvalidResponse("empty completion".to_string()))?;

        parse_response(&content, &request.file_name, &self.model)
    }
}
