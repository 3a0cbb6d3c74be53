//! Model routing across heterogeneous providers.
//!
//! One entry point, `chat_completion`, takes a `<provider>/<model_name>`
//! identifier and dispatches: `sharp_boe` speaks its own completions
//! endpoint with a shared secret; everything else goes through the unified
//! adapter. Base URLs are overridable per provider through
//! `PERSONALVIBE_<PROVIDER>_BASE_URL`, which is also the test seam.

use crate::config::validate_model;
use crate::error::{Result, VibeError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::env;
use std::time::Duration;

/// Used when the configuration leaves `model` empty.
pub const DEFAULT_MODEL: &str = "openai/o3";

/// Shared secret for the `sharp_boe` provider.
pub const SHARP_SECRET_ENV: &str = "SHARP_USER_SECRET";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Canonical chat message; content is normalised to plain text at the
/// boundary so downstream code never handles provider-specific part lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Caller-supplied request options, forwarded verbatim in the JSON body.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub timeout: Option<Duration>,
}

impl ChatOptions {
    fn apply(&self, body: &mut Map<String, Value>) {
        if let Some(max_tokens) = self.max_tokens {
            body.insert("max_tokens".to_string(), json!(max_tokens));
        }
        if let Some(temperature) = self.temperature {
            body.insert("temperature".to_string(), json!(temperature));
        }
    }
}

/// Route one chat completion. Empty or absent model selects the default.
pub fn chat_completion(
    model: Option<&str>,
    messages: &[Message],
    options: &ChatOptions,
) -> Result<Value> {
    let model = match model {
        None | Some("") => DEFAULT_MODEL,
        Some(value) => value,
    };
    validate_model(model)?;
    let (provider, name) = model
        .split_once('/')
        .ok_or_else(|| VibeError::InvalidModel(model.to_string()))?;

    tracing::debug!(%provider, model = %name, messages = messages.len(), "dispatching chat completion");
    match provider {
        "sharp_boe" => sharp_boe_completion(name, messages, options),
        _ => adapter_completion(provider, name, messages, options),
    }
}

fn transport(err: ureq::Error) -> VibeError {
    match err {
        ureq::Error::StatusCode(code) => VibeError::Transport(format!("HTTP status {code}")),
        other => VibeError::Transport(other.to_string()),
    }
}

fn agent(options: &ChatOptions) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(options.timeout)
        .build()
        .into()
}

/// Base URL for a provider, honouring `PERSONALVIBE_<PROVIDER>_BASE_URL`.
fn base_url(provider: &str, default: &str) -> String {
    let var = format!("PERSONALVIBE_{}_BASE_URL", provider.to_uppercase());
    env::var(var).unwrap_or_else(|_| default.to_string())
}

fn credential(var: &'static str) -> Result<String> {
    env::var(var)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or(VibeError::MissingCredential(var))
}

/// `POST {base}/<model_name>/completions` with a bearer shared secret.
fn sharp_boe_completion(name: &str, messages: &[Message], options: &ChatOptions) -> Result<Value> {
    let secret = credential(SHARP_SECRET_ENV)?;
    let url = format!(
        "{}/{name}/completions",
        base_url("sharp_boe", "https://api.sharpboe.com")
    );

    let mut body = Map::new();
    body.insert("messages".to_string(), serde_json::to_value(messages).map_err(to_internal)?);
    options.apply(&mut body);

    let mut response = agent(options)
        .post(url.as_str())
        .header("Authorization", format!("Bearer {secret}"))
        .send_json(Value::Object(body))
        .map_err(transport)?;
    response.body_mut().read_json::<Value>().map_err(transport)
}

fn to_internal(err: serde_json::Error) -> VibeError {
    VibeError::Internal(format!("serialize request body: {err}"))
}

struct ProviderSpec {
    default_base: &'static str,
    key_env: &'static str,
}

fn provider_spec(provider: &str) -> Result<ProviderSpec> {
    let spec = match provider {
        "openai" => ProviderSpec {
            default_base: "https://api.openai.com/v1",
            key_env: "OPENAI_API_KEY",
        },
        "anthropic" => ProviderSpec {
            default_base: "https://api.anthropic.com",
            key_env: "ANTHROPIC_API_KEY",
        },
        "google" => ProviderSpec {
            default_base: "https://generativelanguage.googleapis.com/v1beta/openai",
            key_env: "GEMINI_API_KEY",
        },
        "mistral" => ProviderSpec {
            default_base: "https://api.mistral.ai/v1",
            key_env: "MISTRAL_API_KEY",
        },
        "openrouter" => ProviderSpec {
            default_base: "https://openrouter.ai/api/v1",
            key_env: "OPENROUTER_API_KEY",
        },
        other => return Err(VibeError::UnknownProvider(other.to_string())),
    };
    Ok(spec)
}

/// Unified multi-provider adapter.
///
/// openai, google, mistral and openrouter all accept the OpenAI
/// chat-completions shape; anthropic needs its messages endpoint with an
/// `x-api-key` header and a mandatory `max_tokens`.
fn adapter_completion(
    provider: &str,
    name: &str,
    messages: &[Message],
    options: &ChatOptions,
) -> Result<Value> {
    let spec = provider_spec(provider)?;
    let key = credential(spec.key_env)?;
    let base = base_url(provider, spec.default_base);

    let mut body = Map::new();
    body.insert("model".to_string(), json!(name));
    body.insert("messages".to_string(), serde_json::to_value(messages).map_err(to_internal)?);
    options.apply(&mut body);

    let mut response = if provider == "anthropic" {
        body.entry("max_tokens".to_string()).or_insert(json!(1024));
        let url = format!("{base}/v1/messages");
        agent(options)
            .post(url.as_str())
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .send_json(Value::Object(body))
            .map_err(transport)?
    } else {
        let url = format!("{base}/chat/completions");
        agent(options)
            .post(url.as_str())
            .header("Authorization", format!("Bearer {key}"))
            .send_json(Value::Object(body))
            .map_err(transport)?
    };
    response.body_mut().read_json::<Value>().map_err(transport)
}

/// Assistant text from a provider response, tolerating both the OpenAI and
/// Anthropic shapes; anything else passes through pretty-printed.
pub fn assistant_text(response: &Value) -> String {
    if let Some(text) = response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        return text.to_string();
    }
    if let Some(text) = response.pointer("/content/0/text").and_then(Value::as_str) {
        return text.to_string();
    }
    serde_json::to_string_pretty(response).unwrap_or_else(|_| response.to_string())
}
