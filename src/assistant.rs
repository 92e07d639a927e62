//! Query assistant collaborator
//!
//! Sends the document outline, a sample of the XML and the current buffers to
//! an OpenAI-compatible chat-completions endpoint and turns the answer into an
//! [`AssistantReply`]. Requests are made once; failures are returned as-is.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::{AssistantConfig, ConfigManager, EnvProvider};
use crate::error::AssistantError;

/// Everything the assistant is told about the current session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssistantRequest {
    pub prompt: String,
    /// Outline produced by [`crate::summary::summarize`]
    pub structure: String,
    /// Leading part of the serialized document
    pub sample: Option<String>,
    pub expression: String,
    pub script: String,
    /// Prefix bound to the default namespace, if any
    pub prefix: Option<String>,
}

impl AssistantRequest {
    pub fn system_message(&self) -> String {
        let mut message = String::from(
            "You help users explore XML documents with XPath 1.0 and small scripts. \
             The user message contains an outline of the document structure, a sample \
             of the XML, the current XPath expression, the current script and the \
             user's request. Answer with a single JSON object and no markdown. It may \
             contain the keys \"xpath\" (a replacement XPath expression), \"code\" (a \
             replacement script) and \"text\" (advice for the user). Leave out \"text\" \
             when applying the expression or script is all the user needs to do. \
             Scripts read the serialized document from standard input; the last \
             expression is in $XPATHFINDER_EXPRESSION, its rendered results as a JSON \
             array in $XPATHFINDER_RESULTS and the namespace bindings as a JSON object \
             in $XPATHFINDER_NAMESPACES. Scripts should print their findings instead of \
             writing files unless asked to.",
        );
        if let Some(prefix) = &self.prefix {
            message.push_str(&format!(
                " Elements in the document's default namespace must be addressed with \
                 the prefix `{}` in XPath expressions.",
                prefix
            ));
        }
        message
    }

    pub fn user_message(&self) -> String {
        format!(
            "Document structure:\n```\n{}\n```\nXML sample:\n```xml\n{}\n```\n\
             Current XPath:\n```xpath\n{}\n```\nCurrent script:\n```\n{}\n```\n\
             Request:\n{}",
            self.structure.trim_end(),
            self.sample.as_deref().unwrap_or_default(),
            self.expression,
            self.script,
            self.prompt
        )
    }
}

/// Suggestions returned by the assistant; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssistantReply {
    pub xpath: Option<String>,
    pub code: Option<String>,
    pub text: Option<String>,
}

impl AssistantReply {
    /// Interpret raw model output
    ///
    /// A JSON object (optionally inside a fenced code block) supplies any of
    /// `xpath`, `code` and `text`; anything else becomes advisory text.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        let candidate = strip_code_fence(trimmed);

        if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(candidate) {
            let field = |key: &str| {
                object.get(key).and_then(|value| match value {
                    Value::String(text) => Some(text.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
            };
            let reply = Self {
                xpath: field("xpath"),
                code: field("code"),
                text: field("text"),
            };
            if !reply.is_empty() {
                return reply;
            }
        }

        Self {
            text: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.xpath.is_none() && self.code.is_none() && self.text.is_none()
    }
}

/// Longest prefix of `xml` within `max_bytes`, cut on a character boundary
pub fn truncate_sample(xml: &str, max_bytes: usize) -> &str {
    if xml.len() <= max_bytes {
        return xml;
    }
    let mut end = max_bytes;
    while !xml.is_char_boundary(end) {
        end -= 1;
    }
    &xml[..end]
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    match body.split_once('\n') {
        Some((_language, content)) => content.trim(),
        None => body.trim(),
    }
}

/// OpenAI-compatible chat-completions client
pub struct AssistantClient {
    client: Client,
    config: AssistantConfig,
    api_key: String,
}

impl AssistantClient {
    /// Create a client with an explicit API key
    pub fn new(config: AssistantConfig, api_key: impl Into<String>) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .timeout(ConfigManager::get_timeout_duration(&config))
            .user_agent(format!("xpathfinder/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    /// Create a client whose key is read from `config.api_key_env`
    pub fn from_env(config: AssistantConfig, env: &impl EnvProvider) -> Result<Self, AssistantError> {
        let api_key = env
            .get(&config.api_key_env)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AssistantError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            })?;
        Self::new(config, api_key)
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Send one request; no retries
    pub async fn ask(&self, request: &AssistantRequest) -> Result<AssistantReply, AssistantError> {
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system_message() },
                { "role": "user", "content": request.user_message() },
            ],
        });

        info!(model = %self.config.model, "sending assistant request");
        let raw = timeout(
            ConfigManager::get_timeout_duration(&self.config),
            self.complete(&body),
        )
        .await
        .map_err(|_| AssistantError::Timeout {
            timeout_seconds: self.config.timeout_seconds,
        })??;

        debug!(bytes = raw.len(), "assistant replied");
        Ok(AssistantReply::from_raw(&raw))
    }

    async fn complete(&self, body: &Value) -> Result<String, AssistantError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AssistantError::HttpStatus {
                status: status.as_u16(),
                message: if message.is_empty() {
                    status.canonical_reason().unwrap_or("Unknown").to_string()
                } else {
                    message
                },
            });
        }

        let data: Value = response.json().await?;
        data["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AssistantError::InvalidResponse {
                details: "missing choices[0].message.content".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct MapEnv(HashMap<String, String>);

    impl EnvProvider for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }
    }

    /// Serve exactly one HTTP response and return the request that was received
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let read = socket.read(&mut chunk).await.unwrap();
                if read == 0 {
                    break;
                }
                received.extend_from_slice(&chunk[..read]);
                let text = String::from_utf8_lossy(&received);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if received.len() >= header_end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&received).into_owned()
        });
        (format!("http://{}/v1", address), handle)
    }

    fn config_for(base_url: String) -> AssistantConfig {
        AssistantConfig {
            base_url,
            timeout_seconds: 5,
            ..AssistantConfig::default()
        }
    }

    #[test]
    fn test_reply_from_json_object() {
        let reply = AssistantReply::from_raw(r#"{"xpath": "//ns:a", "text": "Try this"}"#);
        assert_eq!(reply.xpath.as_deref(), Some("//ns:a"));
        assert_eq!(reply.code, None);
        assert_eq!(reply.text.as_deref(), Some("Try this"));
    }

    #[test]
    fn test_reply_from_fenced_json() {
        let reply = AssistantReply::from_raw("```json\n{\"code\": \"print(1)\"}\n```");
        assert_eq!(reply.code.as_deref(), Some("print(1)"));
    }

    #[test]
    fn test_reply_from_plain_text() {
        let reply = AssistantReply::from_raw("  Use count() instead.\n");
        assert_eq!(reply.text.as_deref(), Some("Use count() instead."));
        assert_eq!(reply.xpath, None);

        let reply = AssistantReply::from_raw("[1, 2]");
        assert_eq!(reply.text.as_deref(), Some("[1, 2]"));

        assert!(AssistantReply::from_raw("   ").is_empty());
    }

    #[test]
    fn test_truncate_sample() {
        assert_eq!(truncate_sample("<r/>", 100), "<r/>");
        assert_eq!(truncate_sample("<root/>", 3), "<ro");
        assert_eq!(truncate_sample("<é/>", 2), "<");
        assert_eq!(truncate_sample("abc", 0), "");
    }

    #[test]
    fn test_request_messages() {
        let request = AssistantRequest {
            prompt: "find all a".to_string(),
            structure: "r\n  a\n".to_string(),
            sample: Some("<r><a/></r>".to_string()),
            expression: "//a".to_string(),
            script: String::new(),
            prefix: Some("ns".to_string()),
        };
        assert!(request.system_message().contains("`ns`"));
        let user = request.user_message();
        assert!(user.contains("r\n  a\n```"));
        assert!(user.contains("<r><a/></r>"));
        assert!(user.ends_with("Request:\nfind all a"));

        let without_prefix = AssistantRequest::default();
        assert!(!without_prefix.system_message().contains("default namespace must"));
    }

    #[test]
    fn test_missing_api_key() {
        let env = MapEnv(HashMap::new());
        match AssistantClient::from_env(AssistantConfig::default(), &env) {
            Err(AssistantError::MissingApiKey { env_var }) => assert_eq!(env_var, "OPENAI_API_KEY"),
            Err(other) => panic!("Expected MissingApiKey, got {:?}", other),
            Ok(_) => panic!("Expected MissingApiKey"),
        }
    }

    #[tokio::test]
    async fn test_ask_parses_completion() {
        let content = r#"{"xpath": "count(//ns:a)"}"#;
        let body = json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
            .to_string();
        let (base_url, server) = serve_once("200 OK", body).await;

        let env = MapEnv(HashMap::from([(
            "OPENAI_API_KEY".to_string(),
            "secret".to_string(),
        )]));
        let client = AssistantClient::from_env(config_for(base_url), &env).unwrap();
        let reply = client.ask(&AssistantRequest::default()).await.unwrap();
        assert_eq!(reply.xpath.as_deref(), Some("count(//ns:a)"));

        let received = server.await.unwrap();
        assert!(received.starts_with("POST /v1/chat/completions"));
        assert!(received.to_ascii_lowercase().contains("authorization: bearer secret"));
        assert!(received.contains("\"model\":\"gpt-4o-mini\""));
    }

    #[tokio::test]
    async fn test_ask_reports_http_status() {
        let (base_url, server) = serve_once("401 Unauthorized", r#"{"error":"bad key"}"#.to_string()).await;
        let client = AssistantClient::new(config_for(base_url), "wrong").unwrap();
        match client.ask(&AssistantRequest::default()).await {
            Err(AssistantError::HttpStatus { status, message }) => {
                assert_eq!(status, 401);
                assert!(message.contains("bad key"));
            }
            other => panic!("Expected HttpStatus, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_ask_rejects_unexpected_payload() {
        let (base_url, server) = serve_once("200 OK", r#"{"choices": []}"#.to_string()).await;
        let client = AssistantClient::new(config_for(base_url), "key").unwrap();
        assert!(matches!(
            client.ask(&AssistantRequest::default()).await,
            Err(AssistantError::InvalidResponse { .. })
        ));
        server.await.unwrap();
    }
}
