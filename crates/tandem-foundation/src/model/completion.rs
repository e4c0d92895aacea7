//! OpenAI-compatible completion client.
//!
//! One [`CompletionClient`] fronts a single upstream model behind any
//! OpenAI-compatible chat-completions API (OpenAI, Groq, Ollama, vLLM,
//! etc.). The client builds a single-prompt request, applies the provider
//! default temperature when the caller passes `0`, and surfaces failures
//! verbatim with the model name attached. It never retries.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use tandem_kernel::{Error, ModelBackend, ModelDescriptor, Result};

/// Temperature used when the caller supplies `0.0`.
const DEFAULT_TEMPERATURE: f32 = 0.7;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// HTTP adapter for one upstream model.
pub struct CompletionClient {
    name: String,
    endpoint: String,
    credential: String,
    client: Client,
}

impl CompletionClient {
    /// Build a client from a descriptor. Fails with a descriptive error
    /// when `name`, `endpoint`, or `credential` is missing.
    pub fn new(descriptor: &ModelDescriptor) -> Result<Self> {
        descriptor.validate()?;

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            name: descriptor.name.clone(),
            endpoint: descriptor.endpoint.trim_end_matches('/').to_string(),
            credential: descriptor.credential.clone(),
            client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    fn request_body(&self, prompt: &str, temperature: f32, max_tokens: u32, stream: bool) -> Value {
        let temperature = if temperature == 0.0 {
            DEFAULT_TEMPERATURE
        } else {
            temperature
        };

        let mut body = json!({
            "model": self.name,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": temperature,
        });
        if max_tokens > 0 {
            body["max_tokens"] = json!(max_tokens);
        }
        if stream {
            body["stream"] = json!(true);
        }
        body
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.credential)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream(&self.name, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                &self.name,
                format!("HTTP {status}: {detail}"),
            ));
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ModelBackend for CompletionClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        let body = self.request_body(prompt, temperature, max_tokens, false);
        let response = self.post(&body).await?;

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| Error::upstream(&self.name, e))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::upstream(&self.name, "no completion content in response"))
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) -> Result<()> + Send),
    ) -> Result<()> {
        let body = self.request_body(prompt, temperature, max_tokens, true);
        let response = self.post(&body).await?;

        // Server-sent events: one `data: {json}` line per delta, terminated
        // by `data: [DONE]`.
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::upstream(&self.name, e))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim().to_string();
                buffer.drain(..=newline);

                let Some(payload) = line.strip_prefix("data:") else {
                    continue;
                };
                let payload = payload.trim();
                if payload == "[DONE]" {
                    return Ok(());
                }

                if let Ok(parsed) = serde_json::from_str::<StreamChunk>(payload) {
                    if let Some(delta) = parsed
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta.content)
                    {
                        if !delta.is_empty() {
                            on_chunk(&delta)?;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ModelDescriptor {
        ModelDescriptor {
            name: "llama-3.1-8b-instant".into(),
            endpoint: "https://api.groq.com/openai/v1/".into(),
            credential: "gsk-test".into(),
            weight: 1.0,
        }
    }

    #[test]
    fn construction_rejects_missing_fields() {
        let mut bad = descriptor();
        bad.endpoint.clear();
        assert!(CompletionClient::new(&bad).is_err());

        let mut bad = descriptor();
        bad.credential.clear();
        assert!(CompletionClient::new(&bad).is_err());
    }

    #[test]
    fn endpoint_trailing_slash_is_normalized() {
        let client = CompletionClient::new(&descriptor()).unwrap();
        assert_eq!(
            client.completions_url(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn zero_temperature_becomes_provider_default() {
        let client = CompletionClient::new(&descriptor()).unwrap();
        let body = client.request_body("hi", 0.0, 256, false);
        let temperature = body["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
        assert_eq!(body["max_tokens"], json!(256));
    }

    #[test]
    fn explicit_temperature_is_kept() {
        let client = CompletionClient::new(&descriptor()).unwrap();
        let body = client.request_body("hi", 1.2, 0, false);
        let temperature = body["temperature"].as_f64().unwrap();
        assert!((temperature - 1.2).abs() < 1e-6);
        // Zero budget means provider default: the field is omitted.
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn stream_flag_is_only_set_when_streaming() {
        let client = CompletionClient::new(&descriptor()).unwrap();
        assert!(client.request_body("hi", 0.0, 0, false).get("stream").is_none());
        assert_eq!(client.request_body("hi", 0.0, 0, true)["stream"], json!(true));
    }
}
